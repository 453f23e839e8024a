use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::draft_request::{DraftKey, DraftPayload, RequestStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDraftRequest {
    #[validate(length(min = 1, max = 128))]
    pub inquiry_id: String,

    #[validate(email)]
    pub submitter_email: String,

    /// Parent project request, for member drafts
    #[validate(length(min = 1, max = 256))]
    pub project_request_id: Option<String>,

    /// Durable project the members join, when already known
    #[validate(length(min = 1, max = 64))]
    pub project_id: Option<String>,

    pub payload: DraftPayload,
}

impl UpsertDraftRequest {
    pub fn key(&self) -> DraftKey {
        DraftKey::new(&self.inquiry_id, &self.submitter_email, self.project_request_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDraftsRequest {
    /// Limit the batch to one project request
    #[validate(length(min = 1, max = 256))]
    pub project_request_id: Option<String>,

    #[validate(length(min = 1, max = 120))]
    pub actor: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftListQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDraftQuery {
    pub email: String,
    pub scope: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// Drafts moved to `pending` by this call
    pub submitted: Vec<String>,
    /// Drafts already past `draft`, left untouched
    pub already_submitted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeOutcome {
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurgeDraftsRequest {
    #[validate(length(min = 1, max = 120))]
    pub actor: String,
}
