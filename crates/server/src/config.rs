// Daemon configuration: `~/.folio/config.toml`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use folio_core::config::JobConfig;
use serde::{Deserialize, Serialize};

/// Root directory for Folio state: `~/.folio/`.
pub fn folio_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".folio"))
}

/// Path to the config file: `~/.folio/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    folio_dir().map(|dir| dir.join("config.toml"))
}

/// Path to the daemon socket: `~/.folio/daemon.sock`.
pub fn default_socket_path() -> PathBuf {
    folio_dir()
        .map(|dir| dir.join("daemon.sock"))
        .unwrap_or_else(|| std::env::temp_dir().join("folio-daemon.sock"))
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:7431".parse().expect("default http addr is valid")
}

/// Daemon configuration at `~/.folio/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    pub http_addr: SocketAddr,
    /// Unix socket the command channel binds to. `None` uses
    /// `~/.folio/daemon.sock`.
    pub socket_path: Option<PathBuf>,
    /// Token accepted as a full-scope administrator. Intended for
    /// first-boot key issuance; unset disables it.
    pub bootstrap_token: Option<String>,
    /// Job-manager tunables.
    pub jobs: JobConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            socket_path: None,
            bootstrap_token: None,
            jobs: JobConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `~/.folio/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        config_path().and_then(|path| Self::load_from(&path).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }
}

/// Config file IO/parse failures.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "config io error: {error}"),
            Self::Parse(error) => write!(f, "config parse error: {error}"),
            Self::Serialize(error) => write!(f, "config serialize error: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::ServerConfig;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ServerConfig = toml::from_str("").expect("empty config should parse");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: ServerConfig = toml::from_str(
            r#"
http_addr = "127.0.0.1:9999"

[jobs]
workers = 2
max_pending = 8
"#,
        )
        .expect("partial config should parse");

        assert_eq!(config.http_addr.port(), 9999);
        assert_eq!(config.jobs.workers, 2);
        assert_eq!(config.jobs.max_pending, 8);
        assert_eq!(config.jobs.retention_secs, 900, "unnamed fields keep defaults");
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("config.toml");

        let mut config = ServerConfig::default();
        config.bootstrap_token = Some("bootstrap-secret".to_string());
        config.save_to(&path).expect("config should save");

        let loaded = ServerConfig::load_from(&path).expect("config should load");
        assert_eq!(loaded, config);
    }
}
