use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable client written once per approved member. `id` is the allocated
/// client identifier and never changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// `<draft key>:clients:<member index>`, unique per collection
    pub idempotency_key: String,
    pub inquiry_id: String,
    pub project_id: Option<String>,
    pub name: String,
    pub email: String,
    pub affiliation: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub is_contact_person: bool,
    pub has_submitted: bool,
    pub created_by: String,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
}

pub fn client_idempotency_key(draft_id: &str, member_index: usize) -> String {
    format!("{}:clients:{}", draft_id, member_index)
}
