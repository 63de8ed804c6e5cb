//! Approval workflow — the single owner of record lifecycle transitions.
//!
//! The workflow is the only writer of `status` and transition timestamps.
//! It takes no locks of its own; the store's compare-and-set claims make
//! pending→terminal transitions race-safe, so N concurrent approvals of
//! one record yield exactly one sent email.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SessionGate;
use crate::crm::CrmSink;
use crate::error::{Error, Result, UpstreamError};
use crate::llm::{LeadContext, ReplyDrafter};
use crate::mail::MailSender;
use crate::notify::Notifier;
use crate::records::model::{self, FormDetails, MessageRecord};
use crate::store::RecordStore;

/// Orchestrates the pending-message lifecycle and its collaborators.
pub struct ApprovalWorkflow {
    store: Arc<dyn RecordStore>,
    mail: Arc<dyn MailSender>,
    drafter: Arc<ReplyDrafter>,
    gate: Arc<SessionGate>,
    crm: Option<Arc<dyn CrmSink>>,
    notifier: Option<Arc<dyn Notifier>>,
    /// Public base URL the action links are built against.
    base_url: String,
}

impl ApprovalWorkflow {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mail: Arc<dyn MailSender>,
        drafter: Arc<ReplyDrafter>,
        gate: Arc<SessionGate>,
        crm: Option<Arc<dyn CrmSink>>,
        notifier: Option<Arc<dyn Notifier>>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            mail,
            drafter,
            gate,
            crm,
            notifier,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Draft a reply for an inbound submission and persist it as a pending
    /// record. The full intake path: drafting happens before creation so a
    /// record never exists without text.
    pub async fn submit(
        &self,
        email: &str,
        message: Option<String>,
        original_message: Option<String>,
        form_details: Option<FormDetails>,
    ) -> Result<MessageRecord> {
        model::validate_email(email)?;

        let lead = LeadContext {
            email,
            message: message.as_deref(),
            form_details: form_details.as_ref(),
        };
        let draft = self
            .drafter
            .draft_reply(&lead)
            .await
            .map_err(UpstreamError::from)?;

        self.create_pending(email, draft, original_message.or(message), form_details)
            .await
    }

    /// Persist a new pending record and notify the review channel.
    ///
    /// Notification failure is non-fatal: the record already exists and
    /// stays reachable from the admin listing.
    pub async fn create_pending(
        &self,
        email: &str,
        draft_text: String,
        original_message: Option<String>,
        form_details: Option<FormDetails>,
    ) -> Result<MessageRecord> {
        model::validate_email(email)?;

        let record = MessageRecord::new(email.trim(), draft_text, original_message, form_details);
        self.store.insert_record(&record).await?;

        info!(record_id = %record.id, email = %record.email, "Pending record created");

        if let Some(notifier) = &self.notifier {
            match self.action_urls(&record) {
                Ok((edit_url, approve_url)) => {
                    if let Err(e) = notifier.post_draft(&record, &edit_url, &approve_url).await {
                        warn!(record_id = %record.id, error = %e, "Draft notification failed");
                    }
                }
                Err(e) => warn!(record_id = %record.id, error = %e, "Could not build action links"),
            }
        }

        Ok(record)
    }

    /// Overwrite the draft text of a pending record.
    pub async fn edit_pending(&self, id: Uuid, new_text: String) -> Result<MessageRecord> {
        let record = self.fetch(id).await?;
        if !record.is_pending() {
            return Err(already_terminal(&record));
        }

        if !self.store.update_draft(id, &new_text).await? {
            // Lost a race with a terminal transition between fetch and update.
            return Err(Error::Conflict(format!("record {id} is no longer pending")));
        }

        info!(record_id = %id, "Draft text updated");
        self.fetch(id).await
    }

    /// Approve a pending record: claim the transition, send the mail, then
    /// run the best-effort CRM and confirmation side effects.
    ///
    /// Mail is the fatal step: on failure the claim is released so the
    /// record can be approved again, and no status transition survives.
    pub async fn approve(
        &self,
        id: Uuid,
        email: &str,
        final_text: Option<String>,
    ) -> Result<MessageRecord> {
        let record = self.fetch(id).await?;
        if !record.is_pending() {
            return Err(already_terminal(&record));
        }
        if record.email != email.trim() {
            return Err(Error::Validation(format!(
                "email does not match record {id}"
            )));
        }

        let final_text = final_text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| record.message_text.clone());

        if !self
            .store
            .claim_approval(id, &final_text, Utc::now())
            .await?
        {
            return Err(Error::Conflict(format!("record {id} is no longer pending")));
        }

        if let Err(e) = self.mail.send_reply(&record.email, &final_text).await {
            // Release the claim so the approval can be retried; the mail
            // never went out, so this cannot cause a duplicate send.
            if let Err(revert_err) = self.store.revert_approval(id).await {
                tracing::error!(
                    record_id = %id,
                    error = %revert_err,
                    "Failed to release approval claim after mail failure"
                );
            }
            return Err(UpstreamError::from(e).into());
        }

        info!(record_id = %id, email = %record.email, "Reply approved and sent");

        if let Some(crm) = &self.crm {
            self.log_to_crm(crm, &record.email, &final_text).await;
        }

        if let Some(notifier) = &self.notifier {
            let approved = MessageRecord {
                message_text: final_text.clone(),
                ..record.clone()
            };
            if let Err(e) = notifier.post_confirmation(&approved).await {
                warn!(record_id = %id, error = %e, "Confirmation notification failed");
            }
        }

        self.fetch(id).await
    }

    /// Reject a pending record. Terminal; no external side effects.
    pub async fn reject(&self, id: Uuid) -> Result<MessageRecord> {
        let record = self.fetch(id).await?;
        if !record.is_pending() {
            return Err(already_terminal(&record));
        }

        if !self.store.claim_rejection(id, Utc::now()).await? {
            return Err(Error::Conflict(format!("record {id} is no longer pending")));
        }

        info!(record_id = %id, "Record rejected");
        self.fetch(id).await
    }

    /// Re-run the drafter against the stored lead context, replacing the
    /// draft text of a pending record.
    pub async fn regenerate(&self, id: Uuid) -> Result<MessageRecord> {
        let record = self.fetch(id).await?;
        if !record.is_pending() {
            return Err(already_terminal(&record));
        }

        let lead = LeadContext {
            email: &record.email,
            message: record.original_message.as_deref(),
            form_details: record.form_details.as_ref(),
        };
        let draft = self
            .drafter
            .draft_reply(&lead)
            .await
            .map_err(UpstreamError::from)?;

        if !self.store.update_draft(id, &draft).await? {
            return Err(Error::Conflict(format!("record {id} is no longer pending")));
        }

        info!(record_id = %id, "Draft regenerated");
        self.fetch(id).await
    }

    /// Read-only fetch of a record.
    pub async fn get_record(&self, id: Uuid) -> Result<MessageRecord> {
        self.fetch(id).await
    }

    /// All records, newest first — the admin listing.
    pub async fn list_records(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.store.list_records().await?)
    }

    /// Build the signed edit/approve links for a record.
    pub fn action_urls(&self, record: &MessageRecord) -> Result<(String, String)> {
        let token = self.gate.issue_action_token(record.id)?;
        let base = format!("{}/approve", self.base_url);

        let edit = reqwest::Url::parse_with_params(
            &base,
            &[
                ("id", record.id.to_string()),
                ("email", record.email.clone()),
                ("token", token.clone()),
            ],
        )
        .map_err(|e| Error::Validation(format!("invalid base URL: {e}")))?;

        let approve = reqwest::Url::parse_with_params(
            &base,
            &[
                ("id", record.id.to_string()),
                ("email", record.email.clone()),
                ("skipHubspot", "false".to_string()),
                ("token", token),
            ],
        )
        .map_err(|e| Error::Validation(format!("invalid base URL: {e}")))?;

        Ok((edit.to_string(), approve.to_string()))
    }

    async fn fetch(&self, id: Uuid) -> Result<MessageRecord> {
        self.store
            .get_record(id)
            .await?
            .ok_or(Error::NotFound {
                entity: "record",
                id,
            })
    }

    /// Best-effort CRM logging: engagement first, note as fallback, total
    /// failure only logged. Approval already succeeded by the time this
    /// runs.
    async fn log_to_crm(&self, crm: &Arc<dyn CrmSink>, email: &str, body: &str) {
        match crm.log_engagement(email, body).await {
            Ok(()) => {}
            Err(engagement_err) => {
                warn!(email, error = %engagement_err, "CRM engagement failed, falling back to note");
                if let Err(note_err) = crm.log_note(email, body).await {
                    warn!(email, error = %note_err, "CRM note fallback also failed");
                }
            }
        }
    }
}

fn already_terminal(record: &MessageRecord) -> Error {
    Error::Conflict(format!(
        "record {} is already {}",
        record.id, record.status
    ))
}
