use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::draft_request::DraftRequest;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[validate(length(min = 1, max = 120))]
    pub reviewer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 120))]
    pub reviewer: String,

    /// Checked by the service so a missing reason is a validation failure
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub request: DraftRequest,
    /// Identifiers produced by this approval, in member order
    pub assigned_ids: Vec<String>,
    pub project_id: Option<String>,
    /// Member names newly merged into the project
    pub added_names: Vec<String>,
}
