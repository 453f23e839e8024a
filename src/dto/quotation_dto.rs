use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::quotation::{
    Adjustments, QuotationLine, QuotationThread, QuotationVersion, SenderRole, ThreadMessage,
    ThreadStatus, UnreadCount, VersionStatus,
};

pub const DEFAULT_CURRENCY: &str = "PHP";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationRequest {
    #[validate(length(min = 1, max = 200))]
    pub items: Vec<QuotationLine>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount_percentage: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax_percentage: Option<Decimal>,

    #[validate(length(equal = 3))]
    pub currency: Option<String>,

    #[validate(length(max = 4000))]
    pub notes: Option<String>,

    #[validate(length(max = 4000))]
    pub terms: Option<String>,

    #[serde(default, with = "crate::util::timestamp::option")]
    pub valid_until: Option<DateTime<Utc>>,

    #[validate(length(min = 1, max = 120))]
    pub created_by: String,
}

impl CreateQuotationRequest {
    pub fn adjustments(&self) -> Adjustments {
        Adjustments {
            discount_amount: self.discount_amount,
            discount_percentage: self.discount_percentage,
            tax_amount: self.tax_amount,
            tax_percentage: self.tax_percentage,
        }
    }

    pub fn currency(&self) -> String {
        self.currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }
}

/// Body for admin actions that only need to know who acted
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    #[validate(length(min = 1, max = 120))]
    pub actor: String,
}

/// Client answer to a sent quotation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponseRequest {
    #[validate(length(min = 1, max = 120))]
    pub client: String,

    /// Optional for approval, required for revision requests and rejections
    #[validate(length(max = 4000))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub role: SenderRole,

    #[validate(length(min = 1, max = 120))]
    pub sender: String,

    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub role: SenderRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub marked: u32,
    pub unread_count: UnreadCount,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadListQuery {
    pub status: Option<ThreadStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationVersionResponse {
    #[serde(flatten)]
    pub quotation: QuotationVersion,
    /// Stored status, or `superseded` once a newer version was sent
    pub effective_status: VersionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub id: String,
    pub inquiry_id: String,
    pub client_name: String,
    pub client_email: String,
    pub status: ThreadStatus,
    pub current_quotation_version: u32,
    pub active_quotation_version: Option<u32>,
    pub quotations: Vec<QuotationVersionResponse>,
    pub messages: Vec<ThreadMessage>,
    pub unread_count: UnreadCount,
    #[serde(with = "crate::util::timestamp::option")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::util::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl From<QuotationThread> for ThreadResponse {
    fn from(thread: QuotationThread) -> Self {
        let quotations = thread
            .quotations
            .iter()
            .map(|q| QuotationVersionResponse {
                quotation: q.clone(),
                effective_status: thread.effective_status(q.version).unwrap_or(q.status),
            })
            .collect();
        ThreadResponse {
            id: thread.id,
            inquiry_id: thread.inquiry_id,
            client_name: thread.client_name,
            client_email: thread.client_email,
            status: thread.status,
            current_quotation_version: thread.current_quotation_version,
            active_quotation_version: thread.active_quotation_version,
            quotations,
            messages: thread.messages,
            unread_count: thread.unread_count,
            last_message_at: thread.last_message_at,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}
