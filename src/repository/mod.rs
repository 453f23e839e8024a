pub mod activity_log_repo;
pub mod client_repo;
pub mod counter_repo;
pub mod draft_request_repo;
pub mod inquiry_repo;
pub mod project_repo;
pub mod quotation_thread_repo;
pub mod repository_error;

use bson::{Document, DeserializerOptions, SerializerOptions};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::mongo_conf::MongoConfig;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

/// Open a database handle using MongoConfig
pub async fn connect(config: &MongoConfig) -> Result<mongodb::Database, mongodb::error::Error> {
    use mongodb::{options::{ClientOptions, Credential, ResolverConfig}, Client};

    // Parse client options from URI
    let mut client_options = ClientOptions::parse_with_resolver_config(&config.uri, ResolverConfig::cloudflare()).await?;
    client_options.app_name = Some("LabPortalBackend".to_string());
    client_options.max_pool_size = Some(config.pool_size);
    client_options.connect_timeout = Some(std::time::Duration::from_secs(config.connection_timeout_secs));

    // Set credentials if username and password are provided
    if let (Some(ref username), Some(ref password)) = (&config.username, &config.password) {
        client_options.credential = Some(Credential::builder()
            .username(username.clone())
            .password(password.clone())
            .build());
    }

    let client = Client::with_options(client_options)?;
    Ok(client.database(&config.database))
}

/// Serialize a model for storage. Timestamps become BSON datetimes.
pub fn to_store_document<T: Serialize>(value: &T) -> RepositoryResult<Document> {
    let options = SerializerOptions::builder().human_readable(false).build();
    bson::to_document_with_options(value, options)
        .map_err(|e| RepositoryError::serialization(format!("Failed to serialize document: {}", e)))
}

pub fn from_store_document<T: DeserializeOwned>(document: Document) -> RepositoryResult<T> {
    let options = DeserializerOptions::builder().human_readable(false).build();
    bson::from_document_with_options(document, options)
        .map_err(|e| RepositoryError::serialization(format!("Failed to deserialize document: {}", e)))
}

/// Drain a cursor of raw documents into models
pub(crate) async fn collect_documents<T: DeserializeOwned>(
    mut cursor: mongodb::Cursor<Document>,
) -> RepositoryResult<Vec<T>> {
    use futures::stream::StreamExt;

    let mut items = Vec::new();
    while let Some(document) = cursor.next().await {
        let document = document.map_err(|e| RepositoryError::database(format!("Cursor error: {}", e)))?;
        items.push(from_store_document(document)?);
    }
    Ok(items)
}
