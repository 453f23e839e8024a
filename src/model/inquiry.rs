use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Pending,
    UnderReview,
    Quoted,
    Negotiating,
    Approved,
    Rejected,
    Converted,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::Pending => "pending",
            InquiryStatus::UnderReview => "under_review",
            InquiryStatus::Quoted => "quoted",
            InquiryStatus::Negotiating => "negotiating",
            InquiryStatus::Approved => "approved",
            InquiryStatus::Rejected => "rejected",
            InquiryStatus::Converted => "converted",
        }
    }

    /// Statuses that an approval may still advance to `Approved`
    pub fn is_before_approval(&self) -> bool {
        matches!(
            self,
            InquiryStatus::Pending
                | InquiryStatus::UnderReview
                | InquiryStatus::Quoted
                | InquiryStatus::Negotiating
        )
    }

    pub fn before_approval() -> [InquiryStatus; 4] {
        [
            InquiryStatus::Pending,
            InquiryStatus::UnderReview,
            InquiryStatus::Quoted,
            InquiryStatus::Negotiating,
        ]
    }

    /// Whether a mirrored quotation status may replace this one. Pre-approval
    /// statuses move freely; `Approved` only advances to `Converted`;
    /// `Rejected` and `Converted` are final.
    pub fn accepts_mirror(&self, next: InquiryStatus) -> bool {
        match self {
            s if s.is_before_approval() => true,
            InquiryStatus::Approved => matches!(next, InquiryStatus::Approved | InquiryStatus::Converted),
            s => *s == next,
        }
    }

    /// Current statuses from which `next` may be mirrored
    pub fn mirror_sources(next: InquiryStatus) -> Vec<InquiryStatus> {
        InquiryStatus::all()
            .into_iter()
            .filter(|s| s.accepts_mirror(next))
            .collect()
    }

    pub fn all() -> [InquiryStatus; 7] {
        [
            InquiryStatus::Pending,
            InquiryStatus::UnderReview,
            InquiryStatus::Quoted,
            InquiryStatus::Negotiating,
            InquiryStatus::Approved,
            InquiryStatus::Rejected,
            InquiryStatus::Converted,
        ]
    }
}

impl std::fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root service request. Written by the intake form; this crate only
/// promotes its status and approval flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub affiliation: Option<String>,
    pub service_type: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub status: InquiryStatus,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::util::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    pub fn new(id: &str, name: &str, email: &str, now: DateTime<Utc>) -> Self {
        Inquiry {
            id: id.to_string(),
            name: name.to_string(),
            email: email.trim().to_lowercase(),
            affiliation: None,
            service_type: None,
            is_approved: false,
            status: InquiryStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&InquiryStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        assert_eq!(InquiryStatus::UnderReview.to_string(), "under_review");
    }

    #[test]
    fn test_before_approval() {
        assert!(InquiryStatus::Negotiating.is_before_approval());
        assert!(!InquiryStatus::Approved.is_before_approval());
        assert!(!InquiryStatus::Converted.is_before_approval());
        assert!(!InquiryStatus::Rejected.is_before_approval());
    }

    #[test]
    fn test_mirror_never_moves_past_approval_backwards() {
        assert!(InquiryStatus::Pending.accepts_mirror(InquiryStatus::Quoted));
        assert!(InquiryStatus::Quoted.accepts_mirror(InquiryStatus::Rejected));
        assert!(!InquiryStatus::Approved.accepts_mirror(InquiryStatus::UnderReview));
        assert!(!InquiryStatus::Approved.accepts_mirror(InquiryStatus::Negotiating));
        assert!(InquiryStatus::Approved.accepts_mirror(InquiryStatus::Converted));
        assert!(!InquiryStatus::Converted.accepts_mirror(InquiryStatus::Quoted));
        assert!(!InquiryStatus::Rejected.accepts_mirror(InquiryStatus::Approved));

        let sources = InquiryStatus::mirror_sources(InquiryStatus::Quoted);
        assert_eq!(sources, InquiryStatus::before_approval().to_vec());
    }
}
