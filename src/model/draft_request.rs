use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which draft collection a request lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Project,
    Client,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Project => "project",
            RequestKind::Client => "client",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Project => "project request",
            RequestKind::Client => "client request",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One person proposed for a client identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersonPayload {
    #[validate(length(min = 2, max = 120))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 200))]
    pub affiliation: Option<String>,

    #[validate(length(max = 120))]
    pub designation: Option<String>,

    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    /// The inquiry's contact person already holds a client record
    #[serde(default)]
    pub is_contact_person: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemberPayload {
    #[validate(length(min = 1, max = 50), nested)]
    pub members: Vec<PersonPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPayload {
    #[validate(length(min = 3, max = 200))]
    pub title: String,

    #[validate(length(min = 2, max = 120))]
    pub project_lead: String,

    pub lab_name: Option<String>,

    #[serde(default)]
    pub services: Vec<String>,

    #[validate(range(min = 1))]
    pub sample_count: Option<u32>,

    pub funding_source: Option<String>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DraftPayload {
    Project(ProjectPayload),
    Members(MemberPayload),
}

impl DraftPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            DraftPayload::Project(_) => RequestKind::Project,
            DraftPayload::Members(_) => RequestKind::Client,
        }
    }

    pub fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            DraftPayload::Project(p) => p.validate(),
            DraftPayload::Members(m) => m.validate(),
        }
    }
}

/// Composite identity of a draft: inquiry + submitter (+ project request scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub inquiry_id: String,
    pub submitter_email: String,
    pub scope: Option<String>,
}

impl DraftKey {
    pub fn new(inquiry_id: &str, submitter_email: &str, scope: Option<&str>) -> Self {
        DraftKey {
            inquiry_id: inquiry_id.trim().to_string(),
            submitter_email: submitter_email.trim().to_lowercase(),
            scope: scope.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        }
    }

    pub fn as_id(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}_{}_{}", self.inquiry_id, self.submitter_email, scope),
            None => format!("{}_{}", self.inquiry_id, self.submitter_email),
        }
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: RequestKind,
    pub inquiry_id: String,
    pub submitted_by: String,
    /// Parent project request for member drafts
    pub project_request_id: Option<String>,
    /// Durable project the members join, when already known
    pub project_id: Option<String>,
    pub payload: DraftPayload,
    pub status: RequestStatus,
    #[serde(default)]
    pub assigned_ids: Vec<String>,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::util::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
}

impl DraftRequest {
    pub fn key(&self) -> DraftKey {
        DraftKey::new(&self.inquiry_id, &self.submitted_by, self.project_request_id.as_deref())
    }

    pub fn members(&self) -> &[PersonPayload] {
        match &self.payload {
            DraftPayload::Members(m) => &m.members,
            DraftPayload::Project(_) => &[],
        }
    }
}
