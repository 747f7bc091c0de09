//! Naming Coordinator service.
//!
//! A loopback HTTP endpoint owning the build's [`NamingTable`]. Connections are
//! served concurrently, but every assignment is forwarded over a channel to a
//! single task that owns the table, so exactly one request body mutates the
//! counters at a time.
//!
//! Routes:
//! - `/classes/<a,b,c>` assigns in the class namespace
//! - `/props/<a,b,c>` assigns in the prop namespace
//! - anything else answers `404 Not found`
//!
//! The service lives for one driving task: [`NamingCoordinator::run`] binds,
//! runs the task, then closes the listener whether the task succeeded or not.

use crate::error::{BuildError, Result};
use crate::naming::{Assignments, Namespace, NamingTable};
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Request, Response, Server, StatusCode};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const REQUEST_QUEUE: usize = 256;

struct AssignRequest {
    namespace: Namespace,
    symbols: Vec<String>,
    reply: oneshot::Sender<Assignments>,
}

/// Totals reported when the coordinator shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub classes: usize,
    pub props: usize,
}

pub struct NamingCoordinator;

impl NamingCoordinator {
    /// Bind the listener and start serving.
    pub async fn start(addr: SocketAddr, prefix: &str) -> Result<RunningCoordinator> {
        let (tx, rx) = mpsc::channel::<AssignRequest>(REQUEST_QUEUE);
        let table = tokio::spawn(own_table(NamingTable::new(prefix), rx));

        let make_svc = make_service_fn(move |_conn| {
            let tx = tx.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle_request(req, tx.clone())))
            }
        });

        let builder = Server::try_bind(&addr).map_err(|e| BuildError::Bind(format!("{}: {}", addr, e)))?;
        let server = builder.serve(make_svc);
        let local_addr = server.local_addr();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let server = tokio::spawn(graceful);

        tracing::info!(address = %local_addr, "Naming coordinator listening");

        Ok(RunningCoordinator {
            local_addr,
            shutdown: shutdown_tx,
            server,
            table,
        })
    }

    /// Serve for exactly the duration of `task`, handing it the bound address.
    /// The listener is closed once the task resolves or fails, and the task's
    /// own result is returned.
    pub async fn run<F, Fut, T>(addr: SocketAddr, prefix: &str, task: F) -> Result<T>
    where
        F: FnOnce(SocketAddr) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let running = Self::start(addr, prefix).await?;
        let outcome = task(running.local_addr()).await;
        let stats = running.shutdown().await;
        match (&outcome, stats) {
            (Ok(_), Ok(stats)) => {
                tracing::info!(
                    classes = stats.classes,
                    props = stats.props,
                    "Naming coordinator closed"
                );
            }
            (Err(e), _) => {
                tracing::warn!(error = %e, "Naming coordinator closed after failed task");
            }
            (Ok(_), Err(e)) => return Err(e),
        }
        outcome
    }
}

/// Handle to a coordinator that is accepting connections.
pub struct RunningCoordinator {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::result::Result<(), hyper::Error>>,
    table: JoinHandle<NamingTable>,
}

impl RunningCoordinator {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listener and wait for in-flight requests to drain.
    pub async fn shutdown(self) -> Result<CoordinatorStats> {
        let _ = self.shutdown.send(());
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BuildError::CoordinatorUnreachable(e.to_string())),
            Err(e) => return Err(BuildError::CoordinatorUnreachable(e.to_string())),
        }
        let table = self
            .table
            .await
            .map_err(|e| BuildError::CoordinatorUnreachable(e.to_string()))?;
        Ok(CoordinatorStats {
            classes: table.assigned(Namespace::Class),
            props: table.assigned(Namespace::Prop),
        })
    }
}

/// Single writer of the naming table. Ends once every sender is gone, which
/// happens after the server has shut down.
async fn own_table(mut table: NamingTable, mut rx: mpsc::Receiver<AssignRequest>) -> NamingTable {
    while let Some(request) = rx.recv().await {
        let assigned = table.assign_batch(request.namespace, &request.symbols);
        let _ = request.reply.send(assigned);
    }
    table
}

/// Split `/classes/a,b` into its namespace and raw symbol list.
fn parse_route(path: &str) -> Option<(Namespace, &str)> {
    let rest = path.strip_prefix('/')?;
    let (segment, symbols) = rest.split_once('/')?;
    Namespace::from_route(segment).map(|ns| (ns, symbols))
}

fn decode_symbols(raw: &str) -> Option<Vec<String>> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    Some(
        decoded
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<Body>,
    tx: mpsc::Sender<AssignRequest>,
) -> std::result::Result<Response<Body>, Infallible> {
    let path = req.uri().path();
    let Some((namespace, raw)) = parse_route(path) else {
        tracing::debug!(path, "Unroutable naming request");
        return Ok(plain(StatusCode::NOT_FOUND, "Not found"));
    };
    let Some(symbols) = decode_symbols(raw) else {
        return Ok(plain(StatusCode::BAD_REQUEST, "Malformed symbol list"));
    };

    let (reply, response) = oneshot::channel();
    let request = AssignRequest {
        namespace,
        symbols,
        reply,
    };
    if tx.send(request).await.is_err() {
        return Ok(plain(StatusCode::SERVICE_UNAVAILABLE, "Naming table closed"));
    }
    let Ok(assigned) = response.await else {
        return Ok(plain(StatusCode::SERVICE_UNAVAILABLE, "Naming table closed"));
    };

    tracing::debug!(
        namespace = namespace.route(),
        count = assigned.len(),
        "Assigned short names"
    );

    let body = match serde_json::to_string(&assigned) {
        Ok(body) => body,
        Err(_) => return Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "Encoding failed")),
    };
    let mut ok = Response::new(Body::from(body));
    ok.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Ok(ok)
}
