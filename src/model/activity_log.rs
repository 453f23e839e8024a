use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Submit,
    Approve,
    Reject,
    StatusChange,
    Send,
    Message,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "CREATE",
            ActivityAction::Update => "UPDATE",
            ActivityAction::Delete => "DELETE",
            ActivityAction::Submit => "SUBMIT",
            ActivityAction::Approve => "APPROVE",
            ActivityAction::Reject => "REJECT",
            ActivityAction::StatusChange => "STATUS_CHANGE",
            ActivityAction::Send => "SEND",
            ActivityAction::Message => "MESSAGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Inquiry,
    ClientRequest,
    ProjectRequest,
    Client,
    Project,
    QuotationThread,
    Quotation,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Inquiry => "inquiry",
            EntityType::ClientRequest => "client_request",
            EntityType::ProjectRequest => "project_request",
            EntityType::Client => "client",
            EntityType::Project => "project",
            EntityType::QuotationThread => "quotation_thread",
            EntityType::Quotation => "quotation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    #[serde(rename = "_id")]
    pub id: String,
    pub actor: String,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub description: String,
    /// Optional before/after snapshot for the audit view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
    #[serde(with = "crate::util::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        actor: &str,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: &str,
        description: impl Into<String>,
    ) -> Self {
        ActivityLog {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            description: description.into(),
            changes: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogFilter {
    pub actor: Option<String>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<ActivityAction>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ActivityLogFilter {
    pub fn matches(&self, log: &ActivityLog) -> bool {
        if let Some(actor) = &self.actor {
            if &log.actor != actor {
                return false;
            }
        }
        if let Some(entity_type) = self.entity_type {
            if log.entity_type != entity_type {
                return false;
            }
        }
        if let Some(entity_id) = &self.entity_id {
            if &log.entity_id != entity_id {
                return false;
            }
        }
        if let Some(action) = self.action {
            if log.action != action {
                return false;
            }
        }
        if let Some(from) = self.from {
            if log.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if log.timestamp > to {
                return false;
            }
        }
        true
    }
}
