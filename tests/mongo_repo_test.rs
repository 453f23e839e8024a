use chrono::{Datelike, Utc};
use labportal_backend::app::app::Repositories;
use labportal_backend::config::collections_conf::CollectionConfig;
use labportal_backend::config::mongo_conf::MongoConfig;
use labportal_backend::model::counter::IdKind;
use labportal_backend::model::inquiry::Inquiry;
use labportal_backend::model::quotation::QuotationThread;
use labportal_backend::repository::repository_error::RepositoryError;
use tracing::info;

/// Runs against a live database only when MONGO_URI is configured
async fn setup_repositories() -> Option<Repositories> {
    let _ = dotenv::dotenv();
    if std::env::var("MONGO_URI").is_err() {
        info!("MONGO_URI not set, skipping MongoDB tests");
        return None;
    }
    let mut config = MongoConfig::from_env().ok()?;
    config.database = format!("labportal_test_{}", uuid::Uuid::new_v4().simple());
    Some(
        Repositories::mongo(&config, &CollectionConfig::default())
            .await
            .expect("Failed to setup MongoDB repositories"),
    )
}

#[tokio::test]
async fn test_mongo_counter_and_thread_workflow() {
    let Some(repos) = setup_repositories().await else {
        return;
    };
    let year = Utc::now().year();

    let first = repos.counters.increment(IdKind::Client, year).await.unwrap();
    let second = repos.counters.increment(IdKind::Client, year).await.unwrap();
    assert_eq!(second, first + 1);
    assert_eq!(repos.counters.current(IdKind::Client, year).await.unwrap(), second);

    let inquiry = repos
        .inquiries
        .insert(Inquiry::new("INQ-MONGO-1", "Ana Reyes", "ana@example.edu", Utc::now()))
        .await
        .unwrap();
    let mut thread = repos
        .threads
        .insert(QuotationThread::new(&inquiry, Utc::now()))
        .await
        .unwrap();

    thread.revision = 1;
    repos.threads.replace(&thread, 0).await.unwrap();
    let err = repos.threads.replace(&thread, 0).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    let stored = repos.threads.find_by_id(&inquiry.id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 1);
    assert_eq!(stored.created_at.timestamp_millis(), thread.created_at.timestamp_millis());
}
