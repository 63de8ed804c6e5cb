//! Message record data model — lifecycle statuses and lead form payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Lifecycle status of a message record.
///
/// Transitions are monotonic: `pending` may move to `approved` or
/// `rejected`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Awaiting human approval; draft text is still editable.
    Pending,
    /// Approved — the reply email was sent.
    Approved,
    /// Rejected without sending.
    Rejected,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown record status: {s}")),
        }
    }
}

/// Structured contact-form payload, validated once at the HTTP boundary.
///
/// Unknown form fields are preserved in `extra` rather than re-parsed
/// downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FormDetails {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.company.is_none() && self.phone.is_none() && self.extra.is_empty()
    }
}

/// A lead reply awaiting (or past) approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique record ID.
    pub id: Uuid,
    /// Recipient address. Immutable; transition requests must match it.
    pub email: String,
    /// Current draft text (markdown-flavored). Frozen once terminal.
    pub message_text: String,
    /// The lead's inbound message, captured at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_message: Option<String>,
    /// Structured form payload captured at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_details: Option<FormDetails>,
    /// Current lifecycle status.
    pub status: RecordStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Set when the record transitions to approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Set when the record transitions to rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl MessageRecord {
    /// Create a new pending record.
    pub fn new(
        email: impl Into<String>,
        message_text: impl Into<String>,
        original_message: Option<String>,
        form_details: Option<FormDetails>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            message_text: message_text.into(),
            original_message,
            form_details: form_details.filter(|d| !d.is_empty()),
            status: RecordStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }
}

/// Check a recipient address: non-empty local part and domain around a
/// single `@`, no whitespace.
pub fn validate_email(email: &str) -> Result<(), Error> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::Validation("email is required".into()));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!(
            "email {email:?} must not contain whitespace"
        )));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(Error::Validation(format!("invalid email address {email:?}"))),
    }
}
