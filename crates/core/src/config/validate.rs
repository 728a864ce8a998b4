use std::collections::HashSet;

use super::{
    types::{AuthMethod, Config, DatabaseBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Fault probability is within [0, 1]
/// - api_key auth has at least one key, keys are non-empty and unique
/// - sqlite backend has a path
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let probability = config.faults.probability;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ConfigError::ValidationError(format!(
            "faults.probability must be between 0 and 1, got {}",
            probability
        )));
    }

    if config.auth.method == AuthMethod::ApiKey {
        if config.auth.api_keys.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.api_keys must contain at least one key when method = \"api_key\""
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &config.auth.api_keys {
            if entry.key.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "empty API key for user '{}'",
                    entry.user_id
                )));
            }
            if !seen.insert(entry.key.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate API key (user '{}')",
                    entry.user_id
                )));
            }
        }
    }

    if config.database.backend == DatabaseBackend::Sqlite
        && config.database.path.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "database.path is required for the sqlite backend".to_string(),
        ));
    }

    Ok(())
}
