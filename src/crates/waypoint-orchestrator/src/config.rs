//! Server configuration
//!
//! Defaults cover local development; a YAML file (path from
//! `WAYPOINT_CONFIG`, falling back to `waypoint.yaml`) overrides the
//! defaults, and a handful of environment variables override the file.

use serde::Deserialize;
use thiserror::Error;
use std::path::Path;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Which checkpoint backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Embedded,
    SharedCache,
}

/// Which intent classifier to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    Rules,
    Llm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HilSection {
    /// Transfers at or above this amount pause for approval
    pub threshold: f64,
    /// Disable the gate entirely (development only)
    pub auto_approve: bool,
    /// Advisory timeout stored on approval records
    pub timeout_seconds: i64,
}

impl Default for HilSection {
    fn default() -> Self {
        Self {
            threshold: 5000.0,
            auto_approve: false,
            timeout_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceSection {
    /// Classifications below this confidence are held for review
    pub threshold: f64,
}

impl Default for ConfidenceSection {
    fn default() -> Self {
        Self { threshold: 0.80 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownstreamSection {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for DownstreamSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// SQLite path for `embedded`, Redis URL for `shared-cache`
    pub path_or_url: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Embedded,
            path_or_url: "sqlite:checkpoints.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Session and approval store
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:waypoint.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub mode: ClassifierMode,
    pub llm_url: String,
    pub llm_model: String,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Rules,
            llm_url: "http://localhost:11434".to_string(),
            llm_model: "llama3".to_string(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub hil: HilSection,
    pub confidence: ConfidenceSection,
    pub downstream: DownstreamSection,
    pub storage: StorageSection,
    pub database: DatabaseSection,
    pub classifier: ClassifierSection,
}

impl ServerConfig {
    /// Load configuration: defaults, then the YAML file when present,
    /// then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("WAYPOINT_CONFIG").unwrap_or_else(|_| "waypoint.yaml".to_string());

        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)?
        } else {
            tracing::info!(%path, "no config file found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("WAYPOINT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("WAYPOINT_DOWNSTREAM_URL") {
            self.downstream.base_url = url;
        }
        if let Ok(backend) = std::env::var("WAYPOINT_CHECKPOINT_BACKEND") {
            match backend.as_str() {
                "embedded" => self.storage.backend = StorageBackend::Embedded,
                "shared-cache" => self.storage.backend = StorageBackend::SharedCache,
                other => tracing::warn!(backend = other, "unknown checkpoint backend, ignoring"),
            }
        }
        if let Ok(url) = std::env::var("WAYPOINT_CHECKPOINT_URL") {
            self.storage.path_or_url = url;
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
