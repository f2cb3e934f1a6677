//! Sync Coordinator — best-effort reconciliation with the remote copy.
//!
//! Pushes pending rows (every version, tombstones included), then
//! pulls remote-only rows into the local store. Per-record failures
//! are aggregated into a single [`SyncOutcome`] instead of thrown, so
//! a partial sync never corrupts local state and callers (e.g. the
//! logout flow) can block on `!is_success` while keeping local data
//! intact.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::StorageError;
use crate::models::{EventRecord, Intensity, RecordKind, SyncState};
use crate::store;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Wire representation of one record version. Chain links and
/// timestamps travel verbatim; `sync_state` is local bookkeeping and
/// stays home.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: Uuid,
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
    pub parent_record_id: Option<Uuid>,
    pub root_id: Uuid,
    pub is_deleted: bool,
    pub deletion_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            intensity: record.intensity,
            notes: record.notes.clone(),
            parent_record_id: record.parent_record_id,
            root_id: record.root_id,
            is_deleted: record.is_deleted,
            deletion_reason: record.deletion_reason.clone(),
            created_at: record.created_at,
        }
    }

    /// Local row for a pulled record — already on the remote, so it
    /// materializes as `Synced`.
    pub fn into_record(self) -> EventRecord {
        EventRecord {
            id: self.id,
            kind: self.kind,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            intensity: self.intensity,
            notes: self.notes,
            parent_record_id: self.parent_record_id,
            root_id: self.root_id,
            is_deleted: self.is_deleted,
            deletion_reason: self.deletion_reason,
            sync_state: SyncState::Synced,
            created_at: self.created_at,
        }
    }
}

/// Aggregate result of one sync pass. Never an `Err`: per-record
/// failures land in `failures` and flip `is_success`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub is_success: bool,
    pub error_message: Option<String>,
    pub pushed: usize,
    pub pulled: usize,
    pub failures: Vec<String>,
}

/// The remote journal service (push/pull endpoints).
pub trait RemoteJournal {
    fn push_record(
        &self,
        record: &RemoteRecord,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;

    fn pull_records(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RemoteRecord>, SyncError>> + Send;
}

/// HTTP implementation, keyed by device and user identifiers.
pub struct HttpRemoteJournal {
    client: reqwest::Client,
    base_url: String,
    device_id: String,
    user_id: String,
}

#[derive(Serialize)]
struct PushEnvelope<'a> {
    device_id: &'a str,
    user_id: &'a str,
    record: &'a RemoteRecord,
}

impl HttpRemoteJournal {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        device_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            device_id: device_id.into(),
            user_id: user_id.into(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl RemoteJournal for HttpRemoteJournal {
    async fn push_record(&self, record: &RemoteRecord) -> Result<(), SyncError> {
        let url = format!("{}/records", self.base_url);
        let envelope = PushEnvelope {
            device_id: &self.device_id,
            user_id: &self.user_id,
            record,
        };
        let response = self
            .client
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| SyncError::Http(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn pull_records(&self) -> Result<Vec<RemoteRecord>, SyncError> {
        let url = format!("{}/records", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("user_id", &self.user_id), ("device_id", &self.device_id)])
            .send()
            .await
            .map_err(|e| SyncError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<Vec<RemoteRecord>>()
            .await
            .map_err(|e| SyncError::Http(e.to_string()))
    }
}

/// Push everything pending, then pull remote-only records. Reports in
/// aggregate; local storage errors during the pass are themselves
/// aggregated, never silently dropped.
pub async fn sync_all_records_with_result(
    conn: &Connection,
    remote: &impl RemoteJournal,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();

    let pending = match store::fetch_pending(conn) {
        Ok(pending) => pending,
        Err(e) => {
            outcome.failures.push(format!("loading pending records: {e}"));
            return finalize(outcome);
        }
    };

    for record in &pending {
        match remote.push_record(&RemoteRecord::from_record(record)).await {
            Ok(()) => match store::mark_record_synced(conn, record.id) {
                Ok(()) => outcome.pushed += 1,
                Err(e) => outcome
                    .failures
                    .push(format!("marking {} synced: {e}", record.id)),
            },
            Err(e) => outcome.failures.push(format!("pushing {}: {e}", record.id)),
        }
    }

    match pull_into_store(conn, remote).await {
        Ok(pulled) => outcome.pulled = pulled,
        Err(e) => outcome.failures.push(format!("pulling records: {e}")),
    }

    finalize(outcome)
}

/// Pull-only variant used after login to materialize a user's existing
/// remote history locally. Returns the number of records materialized.
pub async fn fetch_records_from_cloud(
    conn: &Connection,
    remote: &impl RemoteJournal,
) -> Result<usize, SyncError> {
    pull_into_store(conn, remote).await
}

async fn pull_into_store(
    conn: &Connection,
    remote: &impl RemoteJournal,
) -> Result<usize, SyncError> {
    let mut remote_records = remote.pull_records().await?;
    // Parents must land before their successors (FK on parent link).
    remote_records.sort_by_key(|r| r.created_at);

    let mut pulled = 0;
    for remote_record in remote_records {
        if store::record_exists(conn, remote_record.id)? {
            continue;
        }
        store::insert_pulled_record(conn, &remote_record.into_record())?;
        pulled += 1;
    }
    Ok(pulled)
}

fn finalize(mut outcome: SyncOutcome) -> SyncOutcome {
    outcome.is_success = outcome.failures.is_empty();
    if !outcome.is_success {
        outcome.error_message = Some(outcome.failures.join("; "));
        tracing::warn!(
            pushed = outcome.pushed,
            pulled = outcome.pulled,
            failures = outcome.failures.len(),
            "sync finished with failures"
        );
    } else {
        tracing::info!(pushed = outcome.pushed, pulled = outcome.pulled, "sync complete");
    }
    outcome
}
