//! Quotation thread aggregate.
//!
//! A thread is keyed by its inquiry and owns every quotation version and
//! message for that inquiry. All transitions mutate the aggregate in memory;
//! the service persists the whole document in one revision-checked write, so
//! a status change and the message that narrates it are never observed apart.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::model::inquiry::{Inquiry, InquiryStatus};
use crate::util::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Pending,
    UnderReview,
    Quoted,
    Negotiating,
    Approved,
    Rejected,
    Converted,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Pending => "pending",
            ThreadStatus::UnderReview => "under_review",
            ThreadStatus::Quoted => "quoted",
            ThreadStatus::Negotiating => "negotiating",
            ThreadStatus::Approved => "approved",
            ThreadStatus::Rejected => "rejected",
            ThreadStatus::Converted => "converted",
        }
    }

    /// No further quotations can be created or answered
    pub fn is_closed(&self) -> bool {
        matches!(self, ThreadStatus::Approved | ThreadStatus::Rejected | ThreadStatus::Converted)
    }

    pub fn awaits_client(&self) -> bool {
        matches!(self, ThreadStatus::Quoted | ThreadStatus::Negotiating)
    }

    pub fn as_inquiry_status(&self) -> InquiryStatus {
        match self {
            ThreadStatus::Pending => InquiryStatus::Pending,
            ThreadStatus::UnderReview => InquiryStatus::UnderReview,
            ThreadStatus::Quoted => InquiryStatus::Quoted,
            ThreadStatus::Negotiating => InquiryStatus::Negotiating,
            ThreadStatus::Approved => InquiryStatus::Approved,
            ThreadStatus::Rejected => InquiryStatus::Rejected,
            ThreadStatus::Converted => InquiryStatus::Converted,
        }
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Sent,
    Revised,
    Approved,
    Rejected,
    /// Never stored; reported by `QuotationThread::effective_status`
    Superseded,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Sent => "sent",
            VersionStatus::Revised => "revised",
            VersionStatus::Approved => "approved",
            VersionStatus::Rejected => "rejected",
            VersionStatus::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Quotation,
    RevisionRequest,
    Approval,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Admin,
    Client,
    System,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Admin => "admin",
            SenderRole::Client => "client",
            SenderRole::System => "system",
        }
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Priced line as entered by the admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationLine {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustments {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount_percentage: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub unit: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotationTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub taxable: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl QuotationTotals {
    /// Prices `lines` and applies discount then tax. Every derived figure is
    /// rounded half-up to 2 places before it feeds the next one. A percentage
    /// wins over an explicit amount when both are given.
    pub fn compute(
        lines: &[QuotationLine],
        adjustments: &Adjustments,
    ) -> Result<(Vec<QuotationItem>, QuotationTotals), ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::validation("A quotation needs at least one item"));
        }

        let mut items = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if line.description.trim().is_empty() {
                return Err(ServiceError::validation(format!("Item {} has no description", i + 1)));
            }
            if line.quantity <= Decimal::ZERO {
                return Err(ServiceError::validation(format!("Item {} quantity must be positive", i + 1)));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::validation(format!("Item {} unit price cannot be negative", i + 1)));
            }
            items.push(QuotationItem {
                description: line.description.trim().to_string(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit: line.unit.clone(),
                subtotal: round_money(checked(line.quantity.checked_mul(line.unit_price))?),
            });
        }

        for (name, pct) in [
            ("discount", adjustments.discount_percentage),
            ("tax", adjustments.tax_percentage),
        ] {
            if let Some(p) = pct {
                if p < Decimal::ZERO || p > Decimal::ONE_HUNDRED {
                    return Err(ServiceError::validation(format!(
                        "{} percentage must be between 0 and 100",
                        name
                    )));
                }
            }
        }
        for (name, amount) in [
            ("discount", adjustments.discount_amount),
            ("tax", adjustments.tax_amount),
        ] {
            if matches!(amount, Some(a) if a < Decimal::ZERO) {
                return Err(ServiceError::validation(format!("{} amount cannot be negative", name)));
            }
        }

        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| checked(acc.checked_add(i.subtotal)))
            .map(round_money)?;
        let discount = match adjustments.discount_percentage {
            Some(pct) => round_money(percent_of(subtotal, pct)?),
            None => round_money(adjustments.discount_amount.unwrap_or(Decimal::ZERO)),
        };
        if discount > subtotal {
            return Err(ServiceError::validation("Discount cannot exceed the subtotal"));
        }
        let taxable = round_money(subtotal - discount);
        let tax = match adjustments.tax_percentage {
            Some(pct) => round_money(percent_of(taxable, pct)?),
            None => round_money(adjustments.tax_amount.unwrap_or(Decimal::ZERO)),
        };
        let total = round_money(checked(taxable.checked_add(tax))?);

        Ok((items, QuotationTotals { subtotal, discount, taxable, tax, total }))
    }
}

fn checked(value: Option<Decimal>) -> Result<Decimal, ServiceError> {
    value.ok_or_else(|| ServiceError::validation("Quotation amount too large"))
}

fn percent_of(amount: Decimal, pct: Decimal) -> Result<Decimal, ServiceError> {
    checked(amount.checked_mul(pct).and_then(|v| v.checked_div(Decimal::ONE_HUNDRED)))
}

/// `QUO-<YYYY><MM>-<8-char inquiry token>-V<version>`
pub fn quotation_number(inquiry_id: &str, version: u32, at: DateTime<Utc>) -> String {
    let mut token: String = inquiry_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(8)
        .collect();
    while token.len() < 8 {
        token.push('0');
    }
    format!("QUO-{}-{}-V{}", at.format("%Y%m"), token, version)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationVersion {
    pub version: u32,
    pub quotation_number: String,
    pub items: Vec<QuotationItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount_percentage: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub taxable_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax_percentage: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub currency: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub valid_until: Option<DateTime<Utc>>,
    pub status: VersionStatus,
    pub created_by: String,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub responded_at: Option<DateTime<Utc>>,
    pub client_feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub id: String,
    pub sender_role: SenderRole,
    pub sender: String,
    pub message_type: MessageType,
    pub content: String,
    pub quotation_version: Option<u32>,
    pub read_by_admin: bool,
    pub read_by_client: bool,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl ThreadMessage {
    pub fn is_read_by(&self, role: SenderRole) -> bool {
        match role {
            SenderRole::Admin => self.read_by_admin,
            SenderRole::Client => self.read_by_client,
            SenderRole::System => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub admin: u32,
    pub client: u32,
}

/// Non-pricing fields of a new version
#[derive(Debug, Clone, Default)]
pub struct VersionMeta {
    pub currency: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationThread {
    /// Same key as the inquiry
    #[serde(rename = "_id")]
    pub id: String,
    pub inquiry_id: String,
    pub client_name: String,
    pub client_email: String,
    pub status: ThreadStatus,
    pub current_quotation_version: u32,
    /// Last version sent to the client; older versions read as superseded
    pub active_quotation_version: Option<u32>,
    #[serde(default)]
    pub quotations: Vec<QuotationVersion>,
    #[serde(default)]
    pub messages: Vec<ThreadMessage>,
    #[serde(default)]
    pub unread_count: UnreadCount,
    /// Optimistic concurrency token, bumped on every write
    #[serde(default)]
    pub revision: i64,
    #[serde(with = "crate::util::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::util::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "crate::util::timestamp::option")]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl QuotationThread {
    pub fn new(inquiry: &Inquiry, now: DateTime<Utc>) -> Self {
        QuotationThread {
            id: inquiry.id.clone(),
            inquiry_id: inquiry.id.clone(),
            client_name: inquiry.name.clone(),
            client_email: inquiry.email.clone(),
            status: ThreadStatus::Pending,
            current_quotation_version: 0,
            active_quotation_version: None,
            quotations: Vec::new(),
            messages: Vec::new(),
            unread_count: UnreadCount::default(),
            revision: 0,
            created_at: now,
            updated_at: now,
            last_message_at: None,
        }
    }

    pub fn version(&self, version: u32) -> Option<&QuotationVersion> {
        self.quotations.iter().find(|q| q.version == version)
    }

    fn version_index(&self, version: u32) -> Result<usize, ServiceError> {
        self.quotations
            .iter()
            .position(|q| q.version == version)
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "Quotation version {} not found in thread {}",
                    version, self.id
                ))
            })
    }

    pub fn highest_version(&self) -> u32 {
        self.quotations.iter().map(|q| q.version).max().unwrap_or(0)
    }

    pub fn unread_for(&self, role: SenderRole) -> u32 {
        match role {
            SenderRole::Admin => self.unread_count.admin,
            SenderRole::Client => self.unread_count.client,
            SenderRole::System => 0,
        }
    }

    /// Stored status, or `Superseded` for an unanswered version older than the
    /// one most recently sent.
    pub fn effective_status(&self, version: u32) -> Option<VersionStatus> {
        let q = self.version(version)?;
        let superseded = matches!(
            q.status,
            VersionStatus::Draft | VersionStatus::Sent | VersionStatus::Revised
        ) && matches!(self.active_quotation_version, Some(active) if version < active);
        if superseded {
            Some(VersionStatus::Superseded)
        } else {
            Some(q.status)
        }
    }

    fn ensure_open(&self, attempted: &str) -> Result<(), ServiceError> {
        if self.status.is_closed() {
            return Err(ServiceError::invalid_transition(
                "quotation thread",
                &self.id,
                self.status,
                attempted,
            ));
        }
        Ok(())
    }

    fn ensure_answerable(&self, version: u32, attempted: &str) -> Result<usize, ServiceError> {
        if !self.status.awaits_client() {
            return Err(ServiceError::invalid_transition(
                "quotation thread",
                &self.id,
                self.status,
                attempted,
            ));
        }
        let idx = self.version_index(version)?;
        let q = &self.quotations[idx];
        if q.status != VersionStatus::Sent {
            return Err(ServiceError::invalid_transition(
                "quotation",
                &q.quotation_number,
                q.status,
                attempted,
            ));
        }
        if self.active_quotation_version != Some(version) {
            return Err(ServiceError::invalid_transition(
                "quotation",
                &q.quotation_number,
                VersionStatus::Superseded,
                attempted,
            ));
        }
        Ok(idx)
    }

    fn push_message(
        &mut self,
        role: SenderRole,
        sender: &str,
        message_type: MessageType,
        content: String,
        quotation_version: Option<u32>,
        now: DateTime<Utc>,
    ) {
        // every party other than the sender gets one more unread message
        if role != SenderRole::Admin {
            self.unread_count.admin += 1;
        }
        if role != SenderRole::Client {
            self.unread_count.client += 1;
        }
        self.messages.push(ThreadMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender_role: role,
            sender: sender.to_string(),
            message_type,
            content,
            quotation_version,
            read_by_admin: role == SenderRole::Admin,
            read_by_client: role == SenderRole::Client,
            created_at: now,
        });
        self.last_message_at = Some(now);
        self.updated_at = now;
    }

    pub fn start_review(&mut self, actor: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.status != ThreadStatus::Pending {
            return Err(ServiceError::invalid_transition(
                "quotation thread",
                &self.id,
                self.status,
                "start review of",
            ));
        }
        self.status = ThreadStatus::UnderReview;
        self.push_message(
            SenderRole::System,
            actor,
            MessageType::System,
            "Your inquiry is now under review.".to_string(),
            None,
            now,
        );
        Ok(())
    }

    /// Appends version `current_quotation_version + 1` and returns its number
    pub fn add_version(
        &mut self,
        lines: &[QuotationLine],
        adjustments: &Adjustments,
        meta: VersionMeta,
        now: DateTime<Utc>,
    ) -> Result<u32, ServiceError> {
        self.ensure_open("create a quotation in")?;
        let (items, totals) = QuotationTotals::compute(lines, adjustments)?;
        let version = self.current_quotation_version + 1;
        self.quotations.push(QuotationVersion {
            version,
            quotation_number: quotation_number(&self.inquiry_id, version, now),
            items,
            subtotal: totals.subtotal,
            discount_amount: totals.discount,
            discount_percentage: adjustments.discount_percentage,
            taxable_amount: totals.taxable,
            tax_amount: totals.tax,
            tax_percentage: adjustments.tax_percentage,
            total_amount: totals.total,
            currency: meta.currency,
            notes: meta.notes,
            terms: meta.terms,
            valid_until: meta.valid_until,
            status: VersionStatus::Draft,
            created_by: meta.created_by,
            created_at: now,
            sent_at: None,
            responded_at: None,
            client_feedback: None,
        });
        self.current_quotation_version = version;
        self.updated_at = now;
        Ok(version)
    }

    pub fn send_version(
        &mut self,
        version: u32,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_open("send a quotation in")?;
        let idx = self.version_index(version)?;
        // the active version may be sent again as a reminder
        let resend = self.quotations[idx].status == VersionStatus::Sent
            && self.active_quotation_version == Some(version);
        let q = &mut self.quotations[idx];
        if !resend && !matches!(q.status, VersionStatus::Draft | VersionStatus::Revised) {
            return Err(ServiceError::invalid_transition(
                "quotation",
                &q.quotation_number,
                q.status,
                "send",
            ));
        }
        q.status = VersionStatus::Sent;
        q.sent_at = Some(now);
        let content = format!(
            "Quotation {} sent: total {} {}",
            q.quotation_number, q.currency, q.total_amount
        );

        if !resend {
            self.status = match self.status {
                ThreadStatus::Pending | ThreadStatus::UnderReview => ThreadStatus::Quoted,
                _ => ThreadStatus::Negotiating,
            };
        }
        self.active_quotation_version = Some(version);
        self.push_message(SenderRole::Admin, actor, MessageType::Quotation, content, Some(version), now);
        Ok(())
    }

    pub fn approve_version(
        &mut self,
        version: u32,
        client: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let idx = self.ensure_answerable(version, "approve")?;
        let q = &mut self.quotations[idx];
        q.status = VersionStatus::Approved;
        q.responded_at = Some(now);
        q.client_feedback = comment.clone();
        let mut content = format!("Quotation {} approved.", q.quotation_number);
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            content.push(' ');
            content.push_str(comment.trim());
        }
        self.status = ThreadStatus::Approved;
        self.push_message(SenderRole::Client, client, MessageType::Approval, content, Some(version), now);
        Ok(())
    }

    pub fn request_revision(
        &mut self,
        version: u32,
        client: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("A revision request needs a reason"));
        }
        let idx = self.ensure_answerable(version, "request a revision of")?;
        let q = &mut self.quotations[idx];
        q.status = VersionStatus::Revised;
        q.responded_at = Some(now);
        q.client_feedback = Some(reason.to_string());
        let content = format!("Revision requested for {}: {}", q.quotation_number, reason);
        self.status = ThreadStatus::Negotiating;
        self.push_message(
            SenderRole::Client,
            client,
            MessageType::RevisionRequest,
            content,
            Some(version),
            now,
        );
        Ok(())
    }

    pub fn reject_version(
        &mut self,
        version: u32,
        client: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("Rejecting a quotation needs a reason"));
        }
        let idx = self.ensure_answerable(version, "reject")?;
        let q = &mut self.quotations[idx];
        q.status = VersionStatus::Rejected;
        q.responded_at = Some(now);
        q.client_feedback = Some(reason.to_string());
        let content = format!("Quotation {} rejected: {}", q.quotation_number, reason);
        self.status = ThreadStatus::Rejected;
        self.push_message(SenderRole::Client, client, MessageType::System, content, Some(version), now);
        Ok(())
    }

    pub fn convert(&mut self, actor: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.status != ThreadStatus::Approved {
            return Err(ServiceError::invalid_transition(
                "quotation thread",
                &self.id,
                self.status,
                "convert",
            ));
        }
        self.status = ThreadStatus::Converted;
        self.push_message(
            SenderRole::System,
            actor,
            MessageType::System,
            "Approved quotation converted into a project.".to_string(),
            self.active_quotation_version,
            now,
        );
        Ok(())
    }

    pub fn post_message(
        &mut self,
        role: SenderRole,
        sender: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if role == SenderRole::System {
            return Err(ServiceError::validation("System messages cannot be posted directly"));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Message cannot be empty"));
        }
        self.push_message(role, sender, MessageType::Text, content.to_string(), None, now);
        Ok(())
    }

    /// Marks every message unread by `role` as read and zeroes that counter.
    /// Returns how many messages flipped.
    pub fn mark_read(&mut self, role: SenderRole, now: DateTime<Utc>) -> Result<u32, ServiceError> {
        if role == SenderRole::System {
            return Err(ServiceError::validation("Only admin or client can mark messages read"));
        }
        let mut flipped = 0;
        for message in self.messages.iter_mut() {
            let flag = if role == SenderRole::Admin {
                &mut message.read_by_admin
            } else {
                &mut message.read_by_client
            };
            if !*flag {
                *flag = true;
                flipped += 1;
            }
        }
        if role == SenderRole::Admin {
            self.unread_count.admin = 0;
        } else {
            self.unread_count.client = 0;
        }
        if flipped > 0 {
            self.updated_at = now;
        }
        Ok(flipped)
    }
}
