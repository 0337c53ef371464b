//! # Configuration
//!
//! `AppConfig` is layered: built-in defaults, then an optional TOML file,
//! then `TXGRAPH_*` environment variables. CLI flags are applied last by
//! the `cli` module.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! backend = "redb"        # memory | file | redb
//! path = "txgraph.db"
//!
//! [engine]
//! inference = "indexed"   # indexed | scan
//! inference_timeout_ms = 5000
//! query_timeout_ms = 10000
//! default_list_limit = 200
//!
//! [http]
//! rate_limit = 100        # requests per second, 0 disables
//! cors_origins = "http://localhost:3000"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use txgraph_core::{EngineConfig, GraphError, InferenceStrategy, primitives::DEFAULT_LIST_LIMIT};

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Where the engine keeps its data between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Nothing survives the process.
    Memory,
    /// Binary snapshot file, rewritten after every mutating command.
    File,
    /// redb database, written through on every upsert.
    #[default]
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "redb" => Ok(Self::Redb),
            other => Err(GraphError::Validation(format!(
                "unknown backend '{}'. Use: memory, file, redb",
                other
            ))),
        }
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: PathBuf::from("txgraph.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub inference: InferenceStrategy,
    pub inference_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
    pub default_list_limit: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            inference: InferenceStrategy::default(),
            inference_timeout_ms: None,
            query_timeout_ms: None,
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Requests per second across all clients. `0` disables limiting.
    pub rate_limit: u32,
    /// Comma-separated origins, or `*`. `None` allows localhost only.
    pub cors_origins: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            rate_limit: 100,
            cors_origins: None,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub engine: EngineSection,
    pub http: HttpConfig,
}

impl AppConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, GraphError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            GraphError::Validation(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::Validation(format!(
                "config file is {} bytes, maximum is {}",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Validation(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, GraphError> {
        toml::from_str(text).map_err(|e| GraphError::Validation(format!("invalid config: {}", e)))
    }

    /// Apply `TXGRAPH_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), GraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TXGRAPH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TXGRAPH_PORT") {
            self.server.port = parse_env("TXGRAPH_PORT", &port)?;
        }
        if let Some(backend) = lookup("TXGRAPH_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("TXGRAPH_DB") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(rate) = lookup("TXGRAPH_RATE_LIMIT") {
            self.http.rate_limit = parse_env("TXGRAPH_RATE_LIMIT", &rate)?;
        }
        if let Some(origins) = lookup("TXGRAPH_CORS_ORIGINS") {
            self.http.cors_origins = Some(origins);
        }
        Ok(())
    }

    /// The core engine settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            inference: self.engine.inference,
            inference_timeout: self.engine.inference_timeout_ms.map(Duration::from_millis),
            default_list_limit: self.engine.default_list_limit,
        }
    }

    #[must_use]
    pub fn query_timeout(&self) -> Option<Duration> {
        self.engine.query_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, GraphError> {
    value
        .trim()
        .parse()
        .map_err(|_| GraphError::Validation(format!("{} has an invalid value '{}'", key, value)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
        assert_eq!(config.storage.backend, Backend::Redb);
        assert_eq!(config.engine.default_list_limit, 200);
        assert_eq!(config.http.rate_limit, 100);
        assert_eq!(config.engine_config().inference_timeout, None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [engine]
            inference = "scan"
            inference_timeout_ms = 250
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.inference, InferenceStrategy::FullScan);
        assert_eq!(
            config.engine_config().inference_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn invalid_toml_is_validation_error() {
        assert!(matches!(
            AppConfig::from_toml("[storage]\nbackend = \"postgres\""),
            Err(GraphError::Validation(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::from_toml("[server]\nhost = \"0.0.0.0\"").expect("parse");
        config
            .apply_overrides(env(&[
                ("TXGRAPH_PORT", "7000"),
                ("TXGRAPH_BACKEND", "file"),
                ("TXGRAPH_DB", "/tmp/graph.bin"),
                ("TXGRAPH_RATE_LIMIT", "0"),
            ]))
            .expect("overrides");

        assert_eq!(config.server.addr(), "0.0.0.0:7000");
        assert_eq!(config.storage.backend, Backend::File);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/graph.bin"));
        assert_eq!(config.http.rate_limit, 0);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_overrides(env(&[("TXGRAPH_PORT", "eighty")]))
            .is_err());
    }

    #[test]
    fn backend_parsing() {
        assert_eq!("Memory".parse::<Backend>().expect("parse"), Backend::Memory);
        assert!("sqlite".parse::<Backend>().is_err());
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("txgraph.toml");
        std::fs::write(&path, "[http]\ncors_origins = \"*\"\n").expect("write");

        let config = AppConfig::from_file(&path).expect("load");
        assert_eq!(config.http.cors_origins.as_deref(), Some("*"));
        assert!(AppConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
