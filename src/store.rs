//! Record Store — append-only persistence of diary event records.
//!
//! No row is ever mutated in place (the `sync_state` bookkeeping column
//! is the single exception). Edits append a successor row, deletion
//! appends a tombstone, and the materialized view presented to callers
//! is the childless non-deleted row of each chain. History stays
//! reconstructable until an explicit `clear_local_data`.

use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::StorageError;
use crate::models::{EventRecord, Intensity, RecordDraft, RecordKind, SyncState};

const RECORD_COLUMNS: &str =
    "id, kind, date, start_time, end_time, intensity, notes,
     parent_record_id, root_id, is_deleted, deletion_reason, sync_state, created_at";

/// Active-view predicate: the childless, non-deleted row of each chain.
const ACTIVE_PREDICATE: &str =
    "r.is_deleted = 0
     AND NOT EXISTS (SELECT 1 FROM records c WHERE c.parent_record_id = r.id)";

/// Outcome of a day-level marker action.
///
/// Marking a day that already carries a real event is not an error and
/// not a silent no-op: the conflict is surfaced so the caller can
/// decide what to tell the user.
#[derive(Debug, Clone, PartialEq)]
pub enum DayMarkOutcome {
    Marked(EventRecord),
    ConflictIgnored,
}

// ═══════════════════════════════════════════
// Public contract
// ═══════════════════════════════════════════

/// Creates a new record chain from the draft. The returned record is
/// the chain's original (`parent_record_id = None`, `root_id = id`).
pub fn add_record(conn: &Connection, draft: &RecordDraft) -> Result<EventRecord, StorageError> {
    validate_draft(draft)?;

    let id = Uuid::new_v4();
    let record = EventRecord {
        id,
        kind: draft.kind,
        date: draft.date,
        start_time: draft.start_time,
        end_time: draft.end_time,
        intensity: draft.intensity,
        notes: draft.notes.clone(),
        parent_record_id: None,
        root_id: id,
        is_deleted: false,
        deletion_reason: None,
        sync_state: SyncState::Pending,
        created_at: Utc::now(),
    };
    insert_row(conn, &record)?;
    tracing::debug!(record_id = %id, kind = record.kind.as_str(), "record added");
    Ok(record)
}

/// Appends a successor to the chain containing `original_id`, carrying
/// the draft's full field state. The prior head is superseded by the
/// new row's parent link; nothing is rewritten.
pub fn update_record(
    conn: &Connection,
    original_id: Uuid,
    draft: &RecordDraft,
) -> Result<EventRecord, StorageError> {
    validate_draft(draft)?;

    let tx = conn.unchecked_transaction()?;
    let head = active_head(&tx, original_id)?;
    let record = EventRecord {
        id: Uuid::new_v4(),
        kind: draft.kind,
        date: draft.date,
        start_time: draft.start_time,
        end_time: draft.end_time,
        intensity: draft.intensity,
        notes: draft.notes.clone(),
        parent_record_id: Some(head.id),
        root_id: head.root_id,
        is_deleted: false,
        deletion_reason: None,
        sync_state: SyncState::Pending,
        created_at: Utc::now(),
    };
    insert_row(&tx, &record)?;
    tx.commit()?;
    tracing::debug!(record_id = %record.id, parent = %head.id, "record updated");
    Ok(record)
}

/// Appends a tombstone to the chain containing `id`. Requires a
/// non-empty reason; the chain's history remains retrievable via
/// [`get_record_history`].
pub fn delete_record(conn: &Connection, id: Uuid, reason: &str) -> Result<(), StorageError> {
    if reason.trim().is_empty() {
        return Err(StorageError::ConstraintViolation(
            "deletion requires a non-empty reason".into(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    let head = active_head(&tx, id)?;
    let tombstone = EventRecord {
        id: Uuid::new_v4(),
        kind: head.kind,
        date: head.date,
        start_time: head.start_time,
        end_time: head.end_time,
        intensity: head.intensity,
        notes: head.notes.clone(),
        parent_record_id: Some(head.id),
        root_id: head.root_id,
        is_deleted: true,
        deletion_reason: Some(reason.trim().to_string()),
        sync_state: SyncState::Pending,
        created_at: Utc::now(),
    };
    insert_row(&tx, &tombstone)?;
    tx.commit()?;
    tracing::debug!(record_id = %head.id, "record tombstoned");
    Ok(())
}

/// Materialized view: for each chain, the latest non-deleted record;
/// tombstoned chains are omitted entirely.
pub fn get_local_records(conn: &Connection) -> Result<Vec<EventRecord>, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r WHERE {ACTIVE_PREDICATE}
         ORDER BY r.date ASC, r.seq ASC"
    );
    query_records(conn, &sql, params![])
}

/// Active records attributed to the given diary day.
pub fn get_records_for_date(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<EventRecord>, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r WHERE {ACTIVE_PREDICATE}
         AND r.date = ?1 ORDER BY r.seq ASC"
    );
    query_records(conn, &sql, params![date.to_string()])
}

/// Active records whose start time falls on the given day (real events
/// only — day markers carry no start time).
pub fn get_records_for_start_date(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<EventRecord>, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r WHERE {ACTIVE_PREDICATE}
         AND r.date = ?1 AND r.start_time IS NOT NULL ORDER BY r.seq ASC"
    );
    query_records(conn, &sql, params![date.to_string()])
}

/// Full version chain containing `any_id`, oldest first (audit access).
pub fn get_record_history(
    conn: &Connection,
    any_id: Uuid,
) -> Result<Vec<EventRecord>, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r
         WHERE r.root_id = (SELECT root_id FROM records WHERE id = ?1)
         ORDER BY r.seq ASC"
    );
    let chain = query_records(conn, &sql, params![any_id.to_string()])?;
    if chain.is_empty() {
        return Err(StorageError::NotFound {
            entity_type: "EventRecord".into(),
            id: any_id.to_string(),
        });
    }
    Ok(chain)
}

/// Marks a day as "no nosebleeds happened".
pub fn mark_no_nosebleeds(conn: &Connection, date: NaiveDate) -> Result<DayMarkOutcome, StorageError> {
    mark_day(conn, date, RecordKind::NoNosebleedDay)
}

/// Marks a day as "don't know whether anything happened".
pub fn mark_unknown(conn: &Connection, date: NaiveDate) -> Result<DayMarkOutcome, StorageError> {
    mark_day(conn, date, RecordKind::UnknownDay)
}

/// Whether any active record is attributed to yesterday (local time).
pub fn has_records_for_yesterday(conn: &Connection) -> Result<bool, StorageError> {
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM records r WHERE {ACTIVE_PREDICATE} AND r.date = ?1"),
        params![yesterday.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Physically erases the entire local journal. The only operation that
/// removes history.
pub fn clear_local_data(conn: &Connection) -> Result<(), StorageError> {
    let tx = conn.unchecked_transaction()?;
    // Self-referential parent links: defer FK checks for the bulk delete.
    tx.execute_batch("PRAGMA defer_foreign_keys = ON")?;
    tx.execute("DELETE FROM records", [])?;
    tx.commit()?;
    tracing::warn!("local journal cleared");
    Ok(())
}

/// Number of rows awaiting push to the remote.
pub fn count_pending(conn: &Connection) -> Result<i64, StorageError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE sync_state = 'pending'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ═══════════════════════════════════════════
// Sync-coordinator support
// ═══════════════════════════════════════════

/// Every row (all versions, tombstones included) not yet pushed.
pub fn fetch_pending(conn: &Connection) -> Result<Vec<EventRecord>, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r
         WHERE r.sync_state = 'pending' ORDER BY r.seq ASC"
    );
    query_records(conn, &sql, params![])
}

/// Flips a row to `synced` after a successful push.
pub fn mark_record_synced(conn: &Connection, id: Uuid) -> Result<(), StorageError> {
    let updated = conn.execute(
        "UPDATE records SET sync_state = 'synced' WHERE id = ?1",
        params![id.to_string()],
    )?;
    if updated == 0 {
        return Err(StorageError::NotFound {
            entity_type: "EventRecord".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn record_exists(conn: &Connection, id: Uuid) -> Result<bool, StorageError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Inserts a record pulled from the remote, preserving its ids, chain
/// links, and timestamps.
pub fn insert_pulled_record(conn: &Connection, record: &EventRecord) -> Result<(), StorageError> {
    insert_row(conn, record)
}

// ═══════════════════════════════════════════
// Internals
// ═══════════════════════════════════════════

fn validate_draft(draft: &RecordDraft) -> Result<(), StorageError> {
    if !draft.times_are_ordered() {
        return Err(StorageError::ConstraintViolation(
            "end time must be strictly after start time".into(),
        ));
    }
    Ok(())
}

fn mark_day(
    conn: &Connection,
    date: NaiveDate,
    kind: RecordKind,
) -> Result<DayMarkOutcome, StorageError> {
    let day_records = get_records_for_date(conn, date)?;

    if day_records.iter().any(|r| r.is_real_event()) {
        tracing::info!(%date, kind = kind.as_str(), "day marker ignored: real event exists");
        return Ok(DayMarkOutcome::ConflictIgnored);
    }

    // At most one active marker per day: re-marking the same kind is
    // idempotent, the other kind supersedes it.
    if let Some(existing) = day_records
        .iter()
        .find(|r| matches!(r.kind, RecordKind::NoNosebleedDay | RecordKind::UnknownDay))
    {
        if existing.kind == kind {
            return Ok(DayMarkOutcome::Marked(existing.clone()));
        }
        let replaced = update_record(conn, existing.id, &RecordDraft::day_marker(kind, date))?;
        return Ok(DayMarkOutcome::Marked(replaced));
    }

    let marker = add_record(conn, &RecordDraft::day_marker(kind, date))?;
    Ok(DayMarkOutcome::Marked(marker))
}

/// The active (childless, non-deleted) row of the chain containing
/// `any_id`. `NotFound` when the id is unknown or the chain is
/// tombstoned.
fn active_head(conn: &Connection, any_id: Uuid) -> Result<EventRecord, StorageError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records r
         WHERE r.root_id = (SELECT root_id FROM records WHERE id = ?1)
         AND NOT EXISTS (SELECT 1 FROM records c WHERE c.parent_record_id = r.id)"
    );
    let mut heads = query_records(conn, &sql, params![any_id.to_string()])?;
    match heads.pop() {
        Some(head) if !head.is_deleted => Ok(head),
        _ => Err(StorageError::NotFound {
            entity_type: "EventRecord".into(),
            id: any_id.to_string(),
        }),
    }
}

fn insert_row(conn: &Connection, record: &EventRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO records (id, kind, date, start_time, end_time, intensity, notes,
         parent_record_id, root_id, is_deleted, deletion_reason, sync_state, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            record.id.to_string(),
            record.kind.as_str(),
            record.date.to_string(),
            record.start_time.map(|t| t.to_rfc3339()),
            record.end_time.map(|t| t.to_rfc3339()),
            record.intensity.map(|i| i.as_str()),
            record.notes,
            record.parent_record_id.map(|id| id.to_string()),
            record.root_id.to_string(),
            record.is_deleted as i32,
            record.deletion_reason,
            record.sync_state.as_str(),
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

type RecordRow = (
    String, String, String,
    Option<String>, Option<String>, Option<String>, Option<String>,
    Option<String>, String, i32, Option<String>, String, String,
);

fn query_records(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<EventRecord>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, i32>(9)?,
            row.get::<_, Option<String>>(10)?,
            row.get::<_, String>(11)?,
            row.get::<_, String>(12)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

fn record_from_row(row: RecordRow) -> Result<EventRecord, StorageError> {
    let (
        id, kind, date, start_time, end_time, intensity, notes,
        parent_record_id, root_id, is_deleted, deletion_reason, sync_state, created_at,
    ) = row;

    Ok(EventRecord {
        id: parse_uuid(&id)?,
        kind: RecordKind::from_str(&kind)?,
        date: parse_date(&date)?,
        start_time: start_time.as_deref().map(parse_timestamp).transpose()?,
        end_time: end_time.as_deref().map(parse_timestamp).transpose()?,
        intensity: intensity.as_deref().map(Intensity::from_str).transpose()?,
        notes,
        parent_record_id: parent_record_id.as_deref().map(parse_uuid).transpose()?,
        root_id: parse_uuid(&root_id)?,
        is_deleted: is_deleted != 0,
        deletion_reason,
        sync_state: SyncState::from_str(&sync_state)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StorageError::ConstraintViolation(e.to_string()))?
            .with_timezone(&Utc),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|e| StorageError::ConstraintViolation(e.to_string()))
}

fn parse_date(s: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StorageError::ConstraintViolation(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::FixedOffset>, StorageError> {
    DateTime::parse_from_rfc3339(s).map_err(|e| StorageError::ConstraintViolation(e.to_string()))
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
