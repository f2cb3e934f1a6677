//! Validation Gate — sponsor-configurable pre-save checks.
//!
//! Stateless decision functions over an immutable [`SponsorConfig`]
//! value injected at call time. Each triggered gate requires an
//! explicit confirmation or justification before a save may proceed;
//! declining one aborts the save as a normal cancellation, not an
//! error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::RecordDraft;

/// Sponsor-controlled flags and thresholds, sourced once at session
/// start (optionally refreshed from the remote, see
/// [`crate::config::fetch_sponsor_config`]) and passed by value —
/// never a process-wide singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SponsorConfig {
    pub sponsor_id: Option<String>,
    /// Require a justification for entries started more than one
    /// calendar day in the past.
    pub require_old_entry_justification: bool,
    /// Confirm episodes lasting one minute or less.
    pub confirm_short_duration: bool,
    /// Confirm episodes longer than the threshold below.
    pub confirm_long_duration: bool,
    /// Whole hours, clamped to 1..=24.
    pub long_duration_threshold_hours: u32,
    /// When false the capture flow auto-saves after end-time
    /// confirmation instead of visiting the review step.
    pub review_screen_enabled: bool,
}

impl Default for SponsorConfig {
    fn default() -> Self {
        Self {
            sponsor_id: None,
            require_old_entry_justification: true,
            confirm_short_duration: true,
            confirm_long_duration: true,
            long_duration_threshold_hours: 4,
            review_screen_enabled: true,
        }
    }
}

impl SponsorConfig {
    pub fn long_duration_threshold_minutes(&self) -> i64 {
        i64::from(self.long_duration_threshold_hours.clamp(1, 24)) * 60
    }
}

/// One pre-save check that still needs user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    OldEntryJustification,
    ShortDurationConfirmation,
    LongDurationConfirmation,
}

/// Confirmations and justifications collected so far for one save
/// attempt. `None` means not asked yet; `Some(false)` means declined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateAnswers {
    pub old_entry_justification: Option<String>,
    pub short_duration_confirmed: Option<bool>,
    pub long_duration_confirmed: Option<bool>,
}

impl GateAnswers {
    /// Whether any collected answer is an explicit decline.
    pub fn any_declined(&self) -> bool {
        self.short_duration_confirmed == Some(false)
            || self.long_duration_confirmed == Some(false)
    }
}

/// True when the flag is enabled, the entry's start date is more than
/// one calendar day in the past, and no justification has been
/// captured for this save attempt.
pub fn needs_old_entry_justification(
    start_date: NaiveDate,
    today: NaiveDate,
    already_justified: bool,
    config: &SponsorConfig,
) -> bool {
    config.require_old_entry_justification
        && (today - start_date).num_days() > 1
        && !already_justified
}

/// True when enabled and the episode lasted one minute or less.
pub fn needs_short_duration_confirmation(duration_minutes: i64, config: &SponsorConfig) -> bool {
    config.confirm_short_duration && duration_minutes <= 1
}

/// True when enabled and the episode lasted strictly longer than the
/// configured threshold (exactly at the threshold does not trigger).
pub fn needs_long_duration_confirmation(duration_minutes: i64, config: &SponsorConfig) -> bool {
    config.confirm_long_duration && duration_minutes > config.long_duration_threshold_minutes()
}

/// Gates that still require input before the draft may be saved, given
/// the answers collected so far.
pub fn required_gates(
    draft: &RecordDraft,
    today: NaiveDate,
    answers: &GateAnswers,
    config: &SponsorConfig,
) -> Vec<Gate> {
    let mut gates = Vec::new();

    let justified = answers
        .old_entry_justification
        .as_deref()
        .is_some_and(|j| !j.trim().is_empty());
    if needs_old_entry_justification(draft.date, today, justified, config) {
        gates.push(Gate::OldEntryJustification);
    }

    if let (Some(start), Some(end)) = (draft.start_time, draft.end_time) {
        let duration = (end - start).num_minutes();
        if answers.short_duration_confirmed.is_none()
            && needs_short_duration_confirmation(duration, config)
        {
            gates.push(Gate::ShortDurationConfirmation);
        }
        if answers.long_duration_confirmed.is_none()
            && needs_long_duration_confirmation(duration, config)
        {
            gates.push(Gate::LongDurationConfirmation);
        }
    }

    gates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordDraft;
    use chrono::DateTime;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn draft_with_duration(minutes: i64) -> RecordDraft {
        let start = DateTime::parse_from_rfc3339("2024-01-15T10:00:00+01:00").unwrap();
        let mut draft = RecordDraft::nosebleed(start);
        draft.end_time = Some(start + chrono::Duration::minutes(minutes));
        draft
    }

    // ───────────────────────────────────────
    // old-entry justification
    // ───────────────────────────────────────

    #[test]
    fn old_entry_fires_beyond_one_day() {
        let config = SponsorConfig::default();
        let today = day("2024-01-17");

        assert!(!needs_old_entry_justification(day("2024-01-17"), today, false, &config));
        assert!(!needs_old_entry_justification(day("2024-01-16"), today, false, &config));
        assert!(needs_old_entry_justification(day("2024-01-15"), today, false, &config));
    }

    #[test]
    fn old_entry_suppressed_once_justified() {
        let config = SponsorConfig::default();
        assert!(!needs_old_entry_justification(
            day("2024-01-10"),
            day("2024-01-17"),
            true,
            &config
        ));
    }

    #[test]
    fn old_entry_disabled_by_flag() {
        let config = SponsorConfig {
            require_old_entry_justification: false,
            ..SponsorConfig::default()
        };
        assert!(!needs_old_entry_justification(
            day("2024-01-10"),
            day("2024-01-17"),
            false,
            &config
        ));
    }

    // ───────────────────────────────────────
    // duration gates
    // ───────────────────────────────────────

    #[test]
    fn short_duration_boundary() {
        let config = SponsorConfig::default();
        assert!(needs_short_duration_confirmation(0, &config));
        assert!(needs_short_duration_confirmation(1, &config));
        assert!(!needs_short_duration_confirmation(2, &config));
    }

    #[test]
    fn long_duration_boundary() {
        let config = SponsorConfig {
            long_duration_threshold_hours: 2,
            ..SponsorConfig::default()
        };
        // Exactly at the threshold does not trigger; one minute above does.
        assert!(!needs_long_duration_confirmation(120, &config));
        assert!(needs_long_duration_confirmation(121, &config));
    }

    #[test]
    fn threshold_is_clamped_to_whole_hour_range() {
        let low = SponsorConfig {
            long_duration_threshold_hours: 0,
            ..SponsorConfig::default()
        };
        assert_eq!(low.long_duration_threshold_minutes(), 60);

        let high = SponsorConfig {
            long_duration_threshold_hours: 48,
            ..SponsorConfig::default()
        };
        assert_eq!(high.long_duration_threshold_minutes(), 24 * 60);
    }

    #[test]
    fn duration_gates_disabled_by_flags() {
        let config = SponsorConfig {
            confirm_short_duration: false,
            confirm_long_duration: false,
            ..SponsorConfig::default()
        };
        assert!(!needs_short_duration_confirmation(1, &config));
        assert!(!needs_long_duration_confirmation(10_000, &config));
    }

    // ───────────────────────────────────────
    // aggregate helper
    // ───────────────────────────────────────

    #[test]
    fn required_gates_collects_all_unanswered() {
        let config = SponsorConfig {
            long_duration_threshold_hours: 1,
            ..SponsorConfig::default()
        };
        let mut draft = draft_with_duration(90);
        draft.date = day("2024-01-10");

        let gates = required_gates(&draft, day("2024-01-17"), &GateAnswers::default(), &config);
        assert_eq!(
            gates,
            vec![Gate::OldEntryJustification, Gate::LongDurationConfirmation]
        );
    }

    #[test]
    fn answered_gates_drop_out() {
        let config = SponsorConfig {
            long_duration_threshold_hours: 1,
            ..SponsorConfig::default()
        };
        let mut draft = draft_with_duration(90);
        draft.date = day("2024-01-10");

        let answers = GateAnswers {
            old_entry_justification: Some("was travelling, catching up".into()),
            long_duration_confirmed: Some(true),
            ..GateAnswers::default()
        };
        assert!(required_gates(&draft, day("2024-01-17"), &answers, &config).is_empty());
    }

    #[test]
    fn blank_justification_does_not_count() {
        let config = SponsorConfig::default();
        let mut draft = draft_with_duration(10);
        draft.date = day("2024-01-10");

        let answers = GateAnswers {
            old_entry_justification: Some("  ".into()),
            ..GateAnswers::default()
        };
        let gates = required_gates(&draft, day("2024-01-17"), &answers, &config);
        assert_eq!(gates, vec![Gate::OldEntryJustification]);
    }

    #[test]
    fn no_duration_gates_without_both_timestamps() {
        let config = SponsorConfig::default();
        let start = DateTime::parse_from_rfc3339("2024-01-17T10:00:00+01:00").unwrap();
        let draft = RecordDraft::nosebleed(start);

        assert!(required_gates(&draft, day("2024-01-17"), &GateAnswers::default(), &config)
            .is_empty());
    }

    #[test]
    fn declined_answer_detected() {
        let answers = GateAnswers {
            short_duration_confirmed: Some(false),
            ..GateAnswers::default()
        };
        assert!(answers.any_declined());
        assert!(!GateAnswers::default().any_declined());
    }
}
