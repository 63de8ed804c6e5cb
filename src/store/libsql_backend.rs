//! libSQL backend — async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Status transitions are
//! single `UPDATE … WHERE status = 'pending'` statements; the affected
//! row count decides the winner under concurrent claims.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::records::model::{FormDetails, MessageRecord, RecordStatus};
use crate::store::migrations;
use crate::store::traits::RecordStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn status_to_str(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Pending => "pending",
        RecordStatus::Approved => "approved",
        RecordStatus::Rejected => "rejected",
    }
}

fn str_to_status(s: &str) -> RecordStatus {
    match s {
        "approved" => RecordStatus::Approved,
        "rejected" => RecordStatus::Rejected,
        _ => RecordStatus::Pending,
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a MessageRecord.
///
/// Column order matches RECORD_COLUMNS:
/// 0:id, 1:email, 2:message_text, 3:original_message, 4:form_details,
/// 5:status, 6:created_at, 7:approved_at, 8:rejected_at
fn row_to_record(row: &libsql::Row) -> Result<MessageRecord, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("id column: {e}")))?;
    let email: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("email column: {e}")))?;
    let message_text: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("message_text column: {e}")))?;
    let original_message: Option<String> = row.get(3).ok();
    let form_details_str: Option<String> = row.get(4).ok();
    let status_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("status column: {e}")))?;
    let created_str: String = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("created_at column: {e}")))?;
    let approved_str: Option<String> = row.get(7).ok();
    let rejected_str: Option<String> = row.get(8).ok();

    let form_details: Option<FormDetails> = match form_details_str {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| DatabaseError::Serialization(format!("form_details: {e}")))?,
        ),
        None => None,
    };

    Ok(MessageRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Query(format!("invalid record id {id_str:?}: {e}")))?,
        email,
        message_text,
        original_message,
        form_details,
        status: str_to_status(&status_str),
        created_at: parse_datetime(&created_str),
        approved_at: parse_optional_datetime(&approved_str),
        rejected_at: parse_optional_datetime(&rejected_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const RECORD_COLUMNS: &str =
    "id, email, message_text, original_message, form_details, status, created_at, approved_at, rejected_at";

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn insert_record(&self, record: &MessageRecord) -> Result<(), DatabaseError> {
        let form_details = match &record.form_details {
            Some(details) => Some(
                serde_json::to_string(details)
                    .map_err(|e| DatabaseError::Serialization(format!("form_details: {e}")))?,
            ),
            None => None,
        };

        self.conn()
            .execute(
                "INSERT INTO records (id, email, message_text, original_message, form_details, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.email.clone(),
                    record.message_text.clone(),
                    opt_text(record.original_message.as_deref()),
                    opt_text(form_details.as_deref()),
                    status_to_str(record.status),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_record: {e}")))?;

        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<MessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_draft(&self, id: Uuid, new_text: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE records SET message_text = ?2 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), new_text],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_draft: {e}")))?;

        Ok(affected == 1)
    }

    async fn claim_approval(
        &self,
        id: Uuid,
        final_text: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE records SET status = 'approved', message_text = ?2, approved_at = ?3
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), final_text, at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_approval: {e}")))?;

        Ok(affected == 1)
    }

    async fn claim_rejection(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE records SET status = 'rejected', rejected_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_rejection: {e}")))?;

        Ok(affected == 1)
    }

    async fn revert_approval(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE records SET status = 'pending', approved_at = NULL
                 WHERE id = ?1 AND status = 'approved'",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("revert_approval: {e}")))?;

        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<MessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM records ORDER BY created_at DESC, id DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_records: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_records row: {e}")))?
        {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::model::FormDetails;

    async fn test_store() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_record(email: &str, text: &str) -> MessageRecord {
        MessageRecord::new(email, text, Some("original inquiry".into()), None)
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = test_store().await;
        let record = make_record("lead@x.com", "Hi there");
        store.insert_record(&record).await.unwrap();

        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.email, "lead@x.com");
        assert_eq!(fetched.message_text, "Hi there");
        assert_eq!(fetched.original_message.as_deref(), Some("original inquiry"));
        assert_eq!(fetched.status, RecordStatus::Pending);
        assert!(fetched.approved_at.is_none());
    }

    #[tokio::test]
    async fn get_unknown_record_is_none() {
        let store = test_store().await;
        assert!(store.get_record(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn form_details_roundtrip() {
        let store = test_store().await;
        let details = FormDetails {
            name: Some("Ada".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let record = MessageRecord::new("lead@x.com", "Hi", None, Some(details));
        store.insert_record(&record).await.unwrap();

        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        let details = fetched.form_details.unwrap();
        assert_eq!(details.name.as_deref(), Some("Ada"));
        assert_eq!(details.company.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn update_draft_only_while_pending() {
        let store = test_store().await;
        let record = make_record("lead@x.com", "Hi");
        store.insert_record(&record).await.unwrap();

        assert!(store.update_draft(record.id, "Hello there").await.unwrap());
        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.message_text, "Hello there");

        assert!(
            store
                .claim_approval(record.id, "Hello there", Utc::now())
                .await
                .unwrap()
        );
        assert!(!store.update_draft(record.id, "too late").await.unwrap());
        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.message_text, "Hello there");
    }

    #[tokio::test]
    async fn claim_approval_wins_once() {
        let store = test_store().await;
        let record = make_record("lead@x.com", "Hi");
        store.insert_record(&record).await.unwrap();

        assert!(
            store
                .claim_approval(record.id, "final", Utc::now())
                .await
                .unwrap()
        );
        assert!(
            !store
                .claim_approval(record.id, "again", Utc::now())
                .await
                .unwrap()
        );

        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordStatus::Approved);
        assert_eq!(fetched.message_text, "final");
        assert!(fetched.approved_at.is_some());
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let store = test_store().await;
        let record = make_record("lead@x.com", "Hi");
        store.insert_record(&record).await.unwrap();

        assert!(store.claim_rejection(record.id, Utc::now()).await.unwrap());
        assert!(
            !store
                .claim_approval(record.id, "final", Utc::now())
                .await
                .unwrap()
        );

        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordStatus::Rejected);
        assert!(fetched.rejected_at.is_some());
    }

    #[tokio::test]
    async fn revert_approval_reopens_record() {
        let store = test_store().await;
        let record = make_record("lead@x.com", "Hi");
        store.insert_record(&record).await.unwrap();

        assert!(
            store
                .claim_approval(record.id, "final", Utc::now())
                .await
                .unwrap()
        );
        store.revert_approval(record.id).await.unwrap();

        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RecordStatus::Pending);
        assert!(fetched.approved_at.is_none());
        assert!(
            store
                .claim_approval(record.id, "final", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn list_records_newest_first() {
        let store = test_store().await;

        let mut first = make_record("a@x.com", "one");
        first.created_at = Utc::now() - chrono::Duration::hours(2);
        let mut second = make_record("b@x.com", "two");
        second.created_at = Utc::now() - chrono::Duration::hours(1);
        let third = make_record("c@x.com", "three");

        store.insert_record(&first).await.unwrap();
        store.insert_record(&second).await.unwrap();
        store.insert_record(&third).await.unwrap();

        let records = store.list_records().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].email, "c@x.com");
        assert_eq!(records[1].email, "b@x.com");
        assert_eq!(records[2].email, "a@x.com");
    }

    #[tokio::test]
    async fn local_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let record = make_record("lead@x.com", "Hi");
        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            store.insert_record(&record).await.unwrap();
        }

        let store = LibSqlBackend::new_local(&path).await.unwrap();
        let fetched = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "lead@x.com");
    }
}
