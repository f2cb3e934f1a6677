//! Diary event records — the only persisted entity.
//!
//! A record is immutable once appended. Edits create a successor row
//! whose `parent_record_id` points at the prior chain head; logical
//! deletion appends a tombstone. `root_id` names the chain (the id of
//! its original record), which keeps chain queries and the
//! own-chain exclusion in overlap detection mechanical.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Intensity, RecordKind, SyncState};

/// One persisted version of a diary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub kind: RecordKind,
    /// Diary day the record is attributed to. Derived from the
    /// wall-clock date of `start_time` when present.
    pub date: NaiveDate,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
    /// Back-link to the superseded version; `None` for originals.
    pub parent_record_id: Option<Uuid>,
    /// Id of the chain's original record (self for originals).
    pub root_id: Uuid,
    pub is_deleted: bool,
    pub deletion_reason: Option<String>,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// A record represents an actual nosebleed occurrence only when it
    /// has a start time and is not a day-level marker.
    pub fn is_real_event(&self) -> bool {
        self.kind == RecordKind::Nosebleed && self.start_time.is_some()
    }

    /// A real event missing its intensity or end time.
    pub fn is_incomplete(&self) -> bool {
        self.is_real_event() && (self.intensity.is_none() || self.end_time.is_none())
    }

    /// Episode duration in whole minutes, when both timestamps are set.
    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }
}

/// Caller-supplied field values for an add or update.
///
/// Updates carry the full desired state — the store does not merge a
/// draft with the superseded version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
}

impl RecordDraft {
    /// Draft for a real nosebleed event; the diary day comes from the
    /// start time's wall-clock date.
    pub fn nosebleed(start_time: DateTime<FixedOffset>) -> Self {
        Self {
            kind: RecordKind::Nosebleed,
            date: start_time.date_naive(),
            start_time: Some(start_time),
            end_time: None,
            intensity: None,
            notes: None,
        }
    }

    /// Draft for a day-level marker (no-nosebleed / unknown).
    pub fn day_marker(kind: RecordKind, date: NaiveDate) -> Self {
        Self {
            kind,
            date,
            start_time: None,
            end_time: None,
            intensity: None,
            notes: None,
        }
    }

    /// Draft carrying the current field values of an existing record,
    /// as the starting point for an edit.
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            kind: record.kind,
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            intensity: record.intensity,
            notes: record.notes.clone(),
        }
    }

    /// End time, when present, must be strictly after the start time.
    pub fn times_are_ordered(&self) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end > start,
            (None, Some(_)) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn real_event(start: &str, end: Option<&str>, intensity: Option<Intensity>) -> EventRecord {
        let id = Uuid::new_v4();
        EventRecord {
            id,
            kind: RecordKind::Nosebleed,
            date: ts(start).date_naive(),
            start_time: Some(ts(start)),
            end_time: end.map(ts),
            intensity,
            notes: None,
            parent_record_id: None,
            root_id: id,
            is_deleted: false,
            deletion_reason: None,
            sync_state: SyncState::Pending,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn incomplete_when_intensity_missing() {
        let rec = real_event("2024-01-15T10:00:00+01:00", Some("2024-01-15T10:30:00+01:00"), None);
        assert!(rec.is_real_event());
        assert!(rec.is_incomplete());
    }

    #[test]
    fn incomplete_when_end_time_missing() {
        let rec = real_event("2024-01-15T10:00:00+01:00", None, Some(Intensity::Dripping));
        assert!(rec.is_incomplete());
    }

    #[test]
    fn complete_when_both_present() {
        let rec = real_event(
            "2024-01-15T10:00:00+01:00",
            Some("2024-01-15T10:30:00+01:00"),
            Some(Intensity::Spotting),
        );
        assert!(!rec.is_incomplete());
        assert_eq!(rec.duration_minutes(), Some(30));
    }

    #[test]
    fn day_marker_is_never_incomplete() {
        let id = Uuid::new_v4();
        let marker = EventRecord {
            id,
            kind: RecordKind::NoNosebleedDay,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
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
        };
        assert!(!marker.is_real_event());
        assert!(!marker.is_incomplete());
    }

    #[test]
    fn diary_day_uses_wall_clock_date_of_offset() {
        // 23:30 local on the 15th is already the 16th in UTC; the diary
        // day must stay the 15th.
        let draft = RecordDraft::nosebleed(ts("2024-01-15T23:30:00+02:00"));
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn times_ordered_rejects_end_before_start() {
        let mut draft = RecordDraft::nosebleed(ts("2024-01-15T10:00:00+01:00"));
        draft.end_time = Some(ts("2024-01-15T09:59:00+01:00"));
        assert!(!draft.times_are_ordered());

        draft.end_time = Some(ts("2024-01-15T10:00:00+01:00"));
        assert!(!draft.times_are_ordered(), "equal timestamps are not strictly after");

        draft.end_time = Some(ts("2024-01-15T10:01:00+01:00"));
        assert!(draft.times_are_ordered());
    }

    #[test]
    fn end_time_without_start_is_rejected() {
        let mut draft = RecordDraft::day_marker(
            RecordKind::Nosebleed,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        draft.end_time = Some(ts("2024-01-15T10:30:00+01:00"));
        assert!(!draft.times_are_ordered());
    }
}
