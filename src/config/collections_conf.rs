use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

use crate::config::ConfigError;

/// Collection names, overridable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub inquiries: String,
    pub client_requests: String,
    pub project_requests: String,
    pub clients: String,
    pub projects: String,
    pub quotation_threads: String,
    pub activity_logs: String,
    pub counters: String,
}

fn collection_var(var: &str, default: &str) -> String {
    match env::var(var) {
        Ok(name) => {
            debug!("{} overridden: {}", var, name);
            name
        }
        Err(_) => default.to_string(),
    }
}

impl CollectionConfig {
    /// Load collection names from `MONGO_COLLECTION_*` variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading collection configuration from environment variables");
        let defaults = CollectionConfig::default();
        let config = CollectionConfig {
            inquiries: collection_var("MONGO_COLLECTION_INQUIRIES", &defaults.inquiries),
            client_requests: collection_var("MONGO_COLLECTION_CLIENT_REQUESTS", &defaults.client_requests),
            project_requests: collection_var("MONGO_COLLECTION_PROJECT_REQUESTS", &defaults.project_requests),
            clients: collection_var("MONGO_COLLECTION_CLIENTS", &defaults.clients),
            projects: collection_var("MONGO_COLLECTION_PROJECTS", &defaults.projects),
            quotation_threads: collection_var("MONGO_COLLECTION_QUOTATION_THREADS", &defaults.quotation_threads),
            activity_logs: collection_var("MONGO_COLLECTION_ACTIVITY_LOGS", &defaults.activity_logs),
            counters: collection_var("MONGO_COLLECTION_COUNTERS", &defaults.counters),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            &self.inquiries,
            &self.client_requests,
            &self.project_requests,
            &self.clients,
            &self.projects,
            &self.quotation_threads,
            &self.activity_logs,
            &self.counters,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError("Collection names cannot be empty".to_string()));
        }
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].contains(a) {
                return Err(ConfigError::ValidationError(format!("Collection '{}' is configured twice", a)));
            }
        }
        Ok(())
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            inquiries: "inquiries".to_string(),
            client_requests: "client_requests".to_string(),
            project_requests: "project_requests".to_string(),
            clients: "clients".to_string(),
            projects: "projects".to_string(),
            quotation_threads: "quotation_threads".to_string(),
            activity_logs: "activity_logs".to_string(),
            counters: "counters".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CollectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = CollectionConfig::default();
        config.projects = "clients".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut config = CollectionConfig::default();
        config.counters = " ".to_string();
        assert!(config.validate().is_err());
    }
}
