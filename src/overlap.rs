//! Overlap Detector — pure time-range collision checks.
//!
//! Overlaps are advisory by product decision: callers surface a
//! warning, saves are never blocked. Duration and old-entry gates stay
//! blocking; that asymmetry is intentional and tested.

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::models::EventRecord;

/// Half-open interval intersection: `[a.start, a.end)` meets
/// `[b.start, b.end)` iff `a.start < b.end && a.end > b.start`.
fn intervals_intersect(
    a_start: DateTime<FixedOffset>,
    a_end: DateTime<FixedOffset>,
    b_start: DateTime<FixedOffset>,
    b_end: DateTime<FixedOffset>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Real events among `candidates` whose interval intersects
/// `[start, end)`, excluding the chain named by `own_root` (a record
/// never collides with itself or its own prior versions).
///
/// Records without both timestamps, and day-level markers, never
/// participate.
pub fn find_overlaps<'a>(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    own_root: Option<Uuid>,
    candidates: &'a [EventRecord],
) -> Vec<&'a EventRecord> {
    candidates
        .iter()
        .filter(|other| Some(other.root_id) != own_root)
        .filter(|other| other.is_real_event())
        .filter_map(|other| match (other.start_time, other.end_time) {
            (Some(other_start), Some(other_end)) => {
                intervals_intersect(start, end, other_start, other_end).then_some(other)
            }
            _ => None,
        })
        .collect()
}

/// Overlaps for an already-materialized record (both timestamps
/// required, otherwise the result is empty).
pub fn find_record_overlaps<'a>(
    record: &EventRecord,
    candidates: &'a [EventRecord],
) -> Vec<&'a EventRecord> {
    match (record.start_time, record.end_time) {
        (Some(start), Some(end)) if record.is_real_event() => {
            find_overlaps(start, end, Some(record.root_id), candidates)
        }
        _ => Vec::new(),
    }
}
