use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::profile::ProfilePolicy;
use crate::ticket::{ProcedureType, QueuePolicy};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub faults: FaultsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Accepted keys when `method = "api_key"`.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// One API key and the professional it identifies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub function_label: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    /// SQLite file, used when `backend = "sqlite"`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("codenews.db")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    /// Volatile, lost on restart.
    #[default]
    Memory,
    Sqlite,
}

/// Queue behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_true")]
    pub enforce_unique_codes: bool,
    /// Load the sample tickets into an empty store at startup.
    #[serde(default)]
    pub seed_demo_data: bool,
    /// Replaces the built-in profile -> procedure table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<HashMap<String, Vec<ProcedureType>>>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enforce_unique_codes: true,
            seed_demo_data: false,
            profiles: None,
        }
    }
}

impl QueueConfig {
    pub fn policy(&self) -> QueuePolicy {
        QueuePolicy {
            enforce_unique_codes: self.enforce_unique_codes,
        }
    }

    pub fn profile_policy(&self) -> ProfilePolicy {
        match &self.profiles {
            Some(table) => ProfilePolicy::from_table(table.clone()),
            None => ProfilePolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Simulated store failures
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FaultsConfig {
    /// Chance in `[0, 1]` that any queue operation fails.
    #[serde(default)]
    pub probability: f64,
    /// Fixed seed for a reproducible failure sequence.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FaultsConfig {
    pub fn enabled(&self) -> bool {
        self.probability > 0.0
    }
}

/// Logging output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub faults: FaultsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_keys: Vec<SanitizedApiKey>,
}

/// API key entry with the key itself hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedApiKey {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_label: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_keys: config
                    .auth
                    .api_keys
                    .iter()
                    .map(|k| SanitizedApiKey {
                        user_id: k.user_id.clone(),
                        role: k.role.clone(),
                        function_label: k.function_label.clone(),
                    })
                    .collect(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            queue: config.queue.clone(),
            faults: config.faults.clone(),
            logging: config.logging.clone(),
        }
    }
}
