//! Build configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment,
//! then validated. Every field has a default, so an empty file (or none) is
//! a complete configuration.

use crate::error::{BuildError, Result};
use crate::module_host::{HostKind, HostSpec};
use crate::resolver::{ExportResolver, DEFAULT_RUNTIME_LOOKUP};
use oxc_syntax::identifier::is_identifier_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "mango.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub naming: NamingConfig,
    pub resolver: ResolverConfig,
    pub build: BuildSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub host: IpAddr,
    /// 0 binds an ephemeral port.
    pub port: u16,
    pub prefix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            prefix: "a".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub runtime_lookup: String,
    pub host: HostKind,
    pub node_binary: String,
    pub timeout_secs: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            runtime_lookup: DEFAULT_RUNTIME_LOOKUP.to_string(),
            host: HostKind::Static,
            node_binary: "node".to_string(),
            timeout_secs: None,
        }
    }
}

impl ResolverConfig {
    pub fn to_resolver(&self) -> ExportResolver {
        let host = HostSpec {
            kind: self.host,
            node_binary: self.node_binary.clone(),
        };
        ExportResolver::new(host, self.runtime_lookup.clone())
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Minify class and prop names through the naming coordinator.
    pub optimize: bool,
    pub workers: usize,
    /// Opt-in comment for plain script units.
    pub marker: String,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("dist"),
            optimize: true,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            marker: "@mango".to_string(),
        }
    }
}

impl BuildConfig {
    /// Load `path` if given (it must exist), else `mango.toml` in the working
    /// directory if present, else defaults. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BuildError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| BuildError::Config(format!("failed to parse TOML: {}", e)))
    }

    /// Apply `MINIFIER_PORT`, `MANGO_RUNTIME_LOOKUP`,
    /// `MANGO_RESOLVER_TIMEOUT_SECS` and `MANGO_RESOLVER_HOST`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MINIFIER_PORT") {
            self.naming.port = val
                .trim()
                .parse()
                .map_err(|_| BuildError::Config(format!("MINIFIER_PORT is not a port: {}", val)))?;
        }
        if let Some(val) = lookup("MANGO_RUNTIME_LOOKUP") {
            self.resolver.runtime_lookup = val;
        }
        if let Some(val) = lookup("MANGO_RESOLVER_TIMEOUT_SECS") {
            let secs = val.trim().parse().map_err(|_| {
                BuildError::Config(format!("MANGO_RESOLVER_TIMEOUT_SECS is not a number: {}", val))
            })?;
            self.resolver.timeout_secs = Some(secs);
        }
        if let Some(val) = lookup("MANGO_RESOLVER_HOST") {
            self.resolver.host = val.trim().parse().map_err(BuildError::Config)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !is_identifier_name(&self.naming.prefix) {
            return Err(BuildError::Config(format!(
                "naming.prefix must be an identifier, got `{}`",
                self.naming.prefix
            )));
        }
        if !self.resolver.runtime_lookup.split('.').all(is_identifier_name) {
            return Err(BuildError::Config(format!(
                "resolver.runtime_lookup must be a dotted identifier path, got `{}`",
                self.resolver.runtime_lookup
            )));
        }
        if self.resolver.node_binary.trim().is_empty() {
            return Err(BuildError::Config("resolver.node_binary is empty".to_string()));
        }
        if self.build.workers == 0 {
            return Err(BuildError::Config("build.workers must be at least 1".to_string()));
        }
        if self.build.marker.trim().is_empty() {
            return Err(BuildError::Config("build.marker is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = BuildConfig::from_toml("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.naming.prefix, "a");
        assert_eq!(config.resolver.runtime_lookup, "Mango.n");
        assert_eq!(config.resolver.timeout_secs, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_sections_parse() {
        let config = BuildConfig::from_toml(
            r#"
            [naming]
            port = 4100
            prefix = "m"

            [resolver]
            host = "node"
            node_binary = "/usr/bin/node"
            timeout_secs = 30

            [build]
            src_dir = "app"
            workers = 2
            optimize = false
            "#,
        )
        .unwrap();
        assert_eq!(config.naming.addr().port(), 4100);
        assert_eq!(config.resolver.host, HostKind::Node);
        assert_eq!(config.resolver.timeout_secs, Some(30));
        assert_eq!(config.build.src_dir, PathBuf::from("app"));
        assert_eq!(config.build.out_dir, PathBuf::from("dist"));
        assert!(!config.build.optimize);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = BuildConfig::from_toml("[naming]\nprot = 1\n").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BuildConfig::default();
        config
            .apply_env_overrides(env(&[
                ("MINIFIER_PORT", "5050"),
                ("MANGO_RUNTIME_LOOKUP", "Rt.load"),
                ("MANGO_RESOLVER_TIMEOUT_SECS", "9"),
                ("MANGO_RESOLVER_HOST", "node"),
            ]))
            .unwrap();
        assert_eq!(config.naming.port, 5050);
        assert_eq!(config.resolver.runtime_lookup, "Rt.load");
        assert_eq!(config.resolver.timeout_secs, Some(9));
        assert_eq!(config.resolver.host, HostKind::Node);

        let mut config = BuildConfig::default();
        assert!(config
            .apply_env_overrides(env(&[("MINIFIER_PORT", "http")]))
            .is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = BuildConfig::default();
        config.naming.prefix = "1x".to_string();
        assert!(config.validate().is_err());

        let mut config = BuildConfig::default();
        config.resolver.runtime_lookup = "Mango..n".to_string();
        assert!(config.validate().is_err());

        let mut config = BuildConfig::default();
        config.build.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_named_file_is_config_error() {
        let err = BuildConfig::load(Some(Path::new("/nonexistent/mango.toml"))).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_resolver_from_config() {
        let mut config = ResolverConfig::default();
        config.runtime_lookup = "Rt.load".to_string();
        assert_eq!(config.to_resolver().runtime_lookup(), "Rt.load");
    }
}
