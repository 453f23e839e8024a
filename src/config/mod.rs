pub mod mongo_conf;
pub mod app_conf;
pub mod collections_conf;
pub mod identifier_conf;


pub use mongo_conf::MongoConfig;
pub use app_conf::{AppConfig, StorageBackend};
pub use collections_conf::CollectionConfig;
pub use identifier_conf::IdentifierConfig;

/// Common configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
