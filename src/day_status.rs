//! Day Status Classifier — one derived status per calendar day.
//!
//! Recomputed on read from the active record view; never persisted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{EventRecord, RecordKind};

/// Classification shown per calendar day, highest precedence first:
/// real events always dominate day markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// A real event for the day is missing intensity or end time.
    Incomplete,
    /// At least one complete real event.
    Nosebleed,
    /// Active no-nosebleed-day marker.
    NoNosebleed,
    /// Active unknown-day marker.
    Unknown,
    /// No record touches the day.
    NotRecorded,
}

/// Classify a single day from its active records.
pub fn classify_day(day_records: &[&EventRecord]) -> DayStatus {
    if day_records.iter().any(|r| r.is_incomplete()) {
        return DayStatus::Incomplete;
    }
    if day_records.iter().any(|r| r.is_real_event()) {
        return DayStatus::Nosebleed;
    }
    if day_records.iter().any(|r| r.kind == RecordKind::NoNosebleedDay) {
        return DayStatus::NoNosebleed;
    }
    if day_records.iter().any(|r| r.kind == RecordKind::UnknownDay) {
        return DayStatus::Unknown;
    }
    DayStatus::NotRecorded
}

/// Status for every day in `from..=to` (callers choose their own
/// padding around a focused month). Dates are normalized calendar days;
/// timezone handling already happened when `EventRecord::date` was
/// derived.
pub fn day_status_range(
    records: &[EventRecord],
    from: NaiveDate,
    to: NaiveDate,
) -> BTreeMap<NaiveDate, DayStatus> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        by_day.entry(record.date).or_default().push(record);
    }

    let mut statuses = BTreeMap::new();
    let mut day = from;
    while day <= to {
        let status = by_day
            .get(&day)
            .map(|day_records| classify_day(day_records))
            .unwrap_or(DayStatus::NotRecorded);
        statuses.insert(day, status);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    statuses
}

/// Convenience wrapper over the store's active view: status for every
/// day in `from..=to`.
pub fn get_day_status_range(
    conn: &rusqlite::Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BTreeMap<NaiveDate, DayStatus>, crate::db::StorageError> {
    let records = crate::store::get_local_records(conn)?;
    Ok(day_status_range(&records, from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Intensity, SyncState};
    use chrono::{DateTime, FixedOffset, Utc};
    use uuid::Uuid;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn record(kind: RecordKind, date: &str) -> EventRecord {
        let id = Uuid::new_v4();
        EventRecord {
            id,
            kind,
            date: day(date),
            start_time: None,
            end_time: None,
            intensity: None,
            notes: None,
            parent_record_id: None,
            root_id: id,
            is_deleted: false,
            deletion_reason: None,
            sync_state: SyncState::Pending,
            created_at: Utc::now(),
        }
    }

    fn complete_event(date: &str) -> EventRecord {
        let mut rec = record(RecordKind::Nosebleed, date);
        rec.start_time = Some(ts(&format!("{date}T10:00:00+01:00")));
        rec.end_time = Some(ts(&format!("{date}T10:30:00+01:00")));
        rec.intensity = Some(Intensity::Dripping);
        rec
    }

    fn incomplete_event(date: &str) -> EventRecord {
        let mut rec = record(RecordKind::Nosebleed, date);
        rec.start_time = Some(ts(&format!("{date}T10:00:00+01:00")));
        rec
    }

    #[test]
    fn empty_range_when_from_after_to() {
        let statuses = day_status_range(&[], day("2024-01-16"), day("2024-01-15"));
        assert!(statuses.is_empty());
    }

    #[test]
    fn unrecorded_days_fill_the_span() {
        let statuses = day_status_range(&[], day("2024-01-01"), day("2024-01-31"));
        assert_eq!(statuses.len(), 31);
        assert!(statuses.values().all(|s| *s == DayStatus::NotRecorded));
    }

    #[test]
    fn incomplete_beats_marker() {
        // Incomplete real event + no-nosebleed marker on the same day
        // classifies as incomplete.
        let records = vec![
            incomplete_event("2024-01-15"),
            record(RecordKind::NoNosebleedDay, "2024-01-15"),
        ];
        let statuses = day_status_range(&records, day("2024-01-15"), day("2024-01-15"));
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::Incomplete);
    }

    #[test]
    fn incomplete_beats_complete_event() {
        let records = vec![complete_event("2024-01-15"), incomplete_event("2024-01-15")];
        let statuses = day_status_range(&records, day("2024-01-15"), day("2024-01-15"));
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::Incomplete);
    }

    #[test]
    fn complete_event_beats_markers() {
        let records = vec![
            complete_event("2024-01-15"),
            record(RecordKind::UnknownDay, "2024-01-15"),
        ];
        let statuses = day_status_range(&records, day("2024-01-15"), day("2024-01-15"));
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::Nosebleed);
    }

    #[test]
    fn no_nosebleed_beats_unknown() {
        let records = vec![
            record(RecordKind::NoNosebleedDay, "2024-01-15"),
            record(RecordKind::UnknownDay, "2024-01-15"),
        ];
        let statuses = day_status_range(&records, day("2024-01-15"), day("2024-01-15"));
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::NoNosebleed);
    }

    #[test]
    fn range_from_store_active_view() {
        use crate::db::sqlite::open_memory_database;
        use crate::models::RecordDraft;
        use crate::store;

        let conn = open_memory_database().unwrap();
        store::add_record(
            &conn,
            &RecordDraft::nosebleed(ts("2024-01-15T10:00:00+01:00")),
        )
        .unwrap();
        store::mark_no_nosebleeds(&conn, day("2024-01-16")).unwrap();

        let statuses =
            get_day_status_range(&conn, day("2024-01-14"), day("2024-01-16")).unwrap();
        assert_eq!(statuses[&day("2024-01-14")], DayStatus::NotRecorded);
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::Incomplete);
        assert_eq!(statuses[&day("2024-01-16")], DayStatus::NoNosebleed);
    }

    #[test]
    fn each_day_classified_independently() {
        let records = vec![
            complete_event("2024-01-14"),
            incomplete_event("2024-01-15"),
            record(RecordKind::UnknownDay, "2024-01-16"),
        ];
        let statuses = day_status_range(&records, day("2024-01-13"), day("2024-01-17"));
        assert_eq!(statuses[&day("2024-01-13")], DayStatus::NotRecorded);
        assert_eq!(statuses[&day("2024-01-14")], DayStatus::Nosebleed);
        assert_eq!(statuses[&day("2024-01-15")], DayStatus::Incomplete);
        assert_eq!(statuses[&day("2024-01-16")], DayStatus::Unknown);
        assert_eq!(statuses[&day("2024-01-17")], DayStatus::NotRecorded);
    }
}
