//! Worker-side client of the naming coordinator.

use crate::error::{BuildError, Result};
use crate::naming::{Assignments, Namespace};
use reqwest::StatusCode;
use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone)]
pub struct NamingClient {
    http: reqwest::Client,
    base: Url,
}

impl NamingClient {
    pub fn new(endpoint: SocketAddr) -> Result<Self> {
        let base = Url::parse(&format!("http://{}/", endpoint))
            .map_err(|e| BuildError::Config(format!("invalid coordinator endpoint {}: {}", endpoint, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn route_url(&self, namespace: Namespace, symbols: &[String]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BuildError::Config(format!("coordinator endpoint {} cannot carry a path", self.base)))?
            .push(namespace.route())
            .push(&symbols.join(","));
        Ok(url)
    }

    /// Ask the coordinator for the short names of `symbols`. An empty symbol
    /// list never leaves the process.
    pub async fn assign(&self, namespace: Namespace, symbols: &[String]) -> Result<Assignments> {
        if symbols.is_empty() {
            return Ok(Assignments::new());
        }
        let url = self.route_url(namespace, symbols)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BuildError::CoordinatorUnreachable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<Assignments>()
                .await
                .map_err(|e| BuildError::CoordinatorUnreachable(format!("malformed response: {}", e))),
            StatusCode::NOT_FOUND => Err(BuildError::CoordinatorRouteNotFound(url.path().to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BuildError::CoordinatorRejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
