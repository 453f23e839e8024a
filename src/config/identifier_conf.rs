use serde::{Deserialize, Serialize};
use std::env;
use tracing::{error, info, warn};

use crate::config::ConfigError;

/// Prefixes and padding for allocated client/project identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierConfig {
    pub client_prefix: String,
    pub project_prefix: String,
    /// Minimum number of digits in the sequence part
    pub sequence_width: usize,
}

impl IdentifierConfig {
    /// Expected environment variables:
    /// - CLIENT_ID_PREFIX (defaults to "CL")
    /// - PROJECT_ID_PREFIX (defaults to "P")
    /// - ID_SEQUENCE_WIDTH (defaults to 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading identifier configuration from environment variables");
        let client_prefix = env::var("CLIENT_ID_PREFIX").unwrap_or_else(|_| "CL".to_string());
        let project_prefix = env::var("PROJECT_ID_PREFIX").unwrap_or_else(|_| "P".to_string());
        let sequence_width = env::var("ID_SEQUENCE_WIDTH")
            .unwrap_or_else(|_| {
                warn!("ID_SEQUENCE_WIDTH not set, using default: 3");
                "3".to_string()
            })
            .parse::<usize>()
            .map_err(|e| {
                error!("Invalid ID_SEQUENCE_WIDTH value: {}", e);
                ConfigError::ParseError(format!("Invalid ID_SEQUENCE_WIDTH: {}", e))
            })?;

        let config = IdentifierConfig {
            client_prefix,
            project_prefix,
            sequence_width,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for prefix in [&self.client_prefix, &self.project_prefix] {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::ValidationError(format!(
                    "Identifier prefix '{}' must be non-empty and alphanumeric",
                    prefix
                )));
            }
        }
        if self.client_prefix == self.project_prefix {
            return Err(ConfigError::ValidationError("Client and project prefixes must differ".to_string()));
        }
        if !(1..=9).contains(&self.sequence_width) {
            return Err(ConfigError::ValidationError("ID_SEQUENCE_WIDTH must be between 1 and 9".to_string()));
        }
        Ok(())
    }
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        IdentifierConfig {
            client_prefix: "CL".to_string(),
            project_prefix: "P".to_string(),
            sequence_width: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(IdentifierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_same_prefix() {
        let config = IdentifierConfig {
            project_prefix: "CL".to_string(),
            ..IdentifierConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_width() {
        let config = IdentifierConfig {
            sequence_width: 0,
            ..IdentifierConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_punctuation_in_prefix() {
        let config = IdentifierConfig {
            client_prefix: "C-L".to_string(),
            ..IdentifierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
