//! `RecordStore` trait — the async persistence interface for message records.
//!
//! The approval workflow is the only writer of `status` and transition
//! timestamps; it relies on the store's compare-and-set updates (the
//! `claim_*` methods) to make pending→terminal transitions race-safe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::records::model::MessageRecord;

/// Backend-agnostic store for message records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert a new record.
    async fn insert_record(&self, record: &MessageRecord) -> Result<(), DatabaseError>;

    /// Fetch a record by ID.
    async fn get_record(&self, id: Uuid) -> Result<Option<MessageRecord>, DatabaseError>;

    /// Overwrite the draft text of a record that is still pending.
    /// Returns `false` if the record is missing or no longer pending.
    async fn update_draft(&self, id: Uuid, new_text: &str) -> Result<bool, DatabaseError>;

    /// Atomically transition a pending record to approved, freezing the
    /// final text and stamping `approved_at`. Returns `false` if the record
    /// is missing or no longer pending — under concurrent calls exactly one
    /// caller observes `true`.
    async fn claim_approval(
        &self,
        id: Uuid,
        final_text: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Atomically transition a pending record to rejected, stamping
    /// `rejected_at`. Same exactly-one-winner contract as
    /// [`claim_approval`](Self::claim_approval).
    async fn claim_rejection(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError>;

    /// Put an approved record back to pending. Compensation for a failed
    /// mail send after the approval claim; never called once mail has
    /// been delivered.
    async fn revert_approval(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// All records, newest first.
    async fn list_records(&self) -> Result<Vec<MessageRecord>, DatabaseError>;
}
