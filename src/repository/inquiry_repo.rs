use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::model::inquiry::{Inquiry, InquiryStatus};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::{from_store_document, to_store_document};

#[async_trait]
pub trait InquiryRepository: Send + Sync {
    async fn insert(&self, inquiry: Inquiry) -> RepositoryResult<Inquiry>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Inquiry>>;
    /// Set the approval flag and move a pre-approval status to `Approved`.
    /// Safe to repeat.
    async fn mark_approved(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<()>;
    /// Mirror a quotation status onto the inquiry. Returns `false` when the
    /// current status may not move to `status` and was left unchanged.
    async fn set_status(
        &self,
        id: &str,
        status: InquiryStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
}

pub struct MongoInquiryRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoInquiryRepository {
    pub fn new(db: &mongodb::Database, collection_name: &str) -> Self {
        MongoInquiryRepository {
            collection: db.collection::<Document>(collection_name),
        }
    }
}

#[async_trait]
impl InquiryRepository for MongoInquiryRepository {
    #[tracing::instrument(skip(self, inquiry), fields(id = %inquiry.id))]
    async fn insert(&self, inquiry: Inquiry) -> RepositoryResult<Inquiry> {
        let document = to_store_document(&inquiry)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => {
                info!("Inquiry created");
                Ok(inquiry)
            }
            Err(e) => {
                error!("Failed to create inquiry: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Inquiry>> {
        let result = self.collection.find_one(doc! { "_id": id }, None).await;
        match result {
            Ok(Some(document)) => Ok(Some(from_store_document(document)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to fetch inquiry {}: {}", id, e);
                Err(RepositoryError::database(format!("Failed to fetch inquiry: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn mark_approved(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        let updated_at = bson::DateTime::from_chrono(now);
        let flagged = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "isApproved": true, "updatedAt": updated_at } },
                None,
            )
            .await
            .map_err(|e| {
                error!("Failed to flag inquiry {} approved: {}", id, e);
                RepositoryError::database(format!("Failed to approve inquiry: {}", e))
            })?;
        if flagged.matched_count == 0 {
            return Err(RepositoryError::not_found(format!("Inquiry not found: {}", id)));
        }

        let before: Vec<&str> = InquiryStatus::before_approval().iter().map(|s| s.as_str()).collect();
        self.collection
            .update_one(
                doc! { "_id": id, "status": { "$in": before } },
                doc! { "$set": { "status": InquiryStatus::Approved.as_str() } },
                None,
            )
            .await
            .map_err(|e| {
                error!("Failed to advance inquiry {} status: {}", id, e);
                RepositoryError::database(format!("Failed to approve inquiry: {}", e))
            })?;
        info!("Inquiry marked approved");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn set_status(
        &self,
        id: &str,
        status: InquiryStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let sources: Vec<&str> = InquiryStatus::mirror_sources(status).iter().map(|s| s.as_str()).collect();
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "status": { "$in": sources } },
                doc! { "$set": { "status": status.as_str(), "updatedAt": bson::DateTime::from_chrono(now) } },
                None,
            )
            .await;
        match result {
            Ok(r) if r.matched_count > 0 => Ok(true),
            Ok(_) => match self.find_by_id(id).await? {
                Some(current) => {
                    info!(current = %current.status, requested = %status, "Inquiry status left unchanged");
                    Ok(false)
                }
                None => Err(RepositoryError::not_found(format!("Inquiry not found: {}", id))),
            },
            Err(e) => {
                error!("Failed to update inquiry status: {}", e);
                Err(RepositoryError::database(format!("Failed to update inquiry status: {}", e)))
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryInquiryRepository {
    inquiries: Arc<RwLock<HashMap<String, Inquiry>>>,
}

impl InMemoryInquiryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InquiryRepository for InMemoryInquiryRepository {
    async fn insert(&self, inquiry: Inquiry) -> RepositoryResult<Inquiry> {
        let mut inquiries = self.inquiries.write().await;
        if inquiries.contains_key(&inquiry.id) {
            return Err(RepositoryError::already_exists(format!("Inquiry already exists: {}", inquiry.id)));
        }
        inquiries.insert(inquiry.id.clone(), inquiry.clone());
        Ok(inquiry)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Inquiry>> {
        Ok(self.inquiries.read().await.get(id).cloned())
    }

    async fn mark_approved(&self, id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        let mut inquiries = self.inquiries.write().await;
        let inquiry = inquiries
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found(format!("Inquiry not found: {}", id)))?;
        inquiry.is_approved = true;
        if inquiry.status.is_before_approval() {
            inquiry.status = InquiryStatus::Approved;
        }
        inquiry.updated_at = now;
        Ok(())
    }

    async fn set_status(
        &self,
        id: &str,
        status: InquiryStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut inquiries = self.inquiries.write().await;
        let inquiry = inquiries
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found(format!("Inquiry not found: {}", id)))?;
        if !inquiry.status.accepts_mirror(status) {
            return Ok(false);
        }
        inquiry.status = status;
        inquiry.updated_at = now;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_approved_keeps_later_status() {
        let repo = InMemoryInquiryRepository::new();
        let now = Utc::now();
        let mut inquiry = Inquiry::new("INQ-1", "Ana Cruz", "ana@lab.org", now);
        inquiry.status = InquiryStatus::Converted;
        repo.insert(inquiry).await.unwrap();

        repo.mark_approved("INQ-1", now).await.unwrap();
        let stored = repo.find_by_id("INQ-1").await.unwrap().unwrap();
        assert!(stored.is_approved);
        assert_eq!(stored.status, InquiryStatus::Converted);
    }

    #[tokio::test]
    async fn test_set_status_does_not_reopen_approved_inquiry() {
        let repo = InMemoryInquiryRepository::new();
        let now = Utc::now();
        repo.insert(Inquiry::new("INQ-1", "Ana Cruz", "ana@lab.org", now)).await.unwrap();
        repo.mark_approved("INQ-1", now).await.unwrap();

        assert!(!repo.set_status("INQ-1", InquiryStatus::UnderReview, now).await.unwrap());
        let stored = repo.find_by_id("INQ-1").await.unwrap().unwrap();
        assert_eq!(stored.status, InquiryStatus::Approved);

        assert!(repo.set_status("INQ-1", InquiryStatus::Converted, now).await.unwrap());
        let stored = repo.find_by_id("INQ-1").await.unwrap().unwrap();
        assert_eq!(stored.status, InquiryStatus::Converted);
    }

    #[tokio::test]
    async fn test_mark_approved_missing_inquiry() {
        let repo = InMemoryInquiryRepository::new();
        let err = repo.mark_approved("nope", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
