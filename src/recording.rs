//! Recording State Machine — the guided multi-step capture flow.
//!
//! Reifies the capture steps as a single explicit state object with an
//! exhaustive transition function, independent of any rendering layer.
//! Transitions are pure; persistence happens only at the defined save
//! points (`save`, `delete`, `exit`).

use chrono::{DateTime, FixedOffset, Local};
use rusqlite::Connection;
use thiserror::Error;

use crate::db::StorageError;
use crate::models::{EventRecord, Intensity, RecordDraft, RecordKind};
use crate::overlap::find_overlaps;
use crate::store;
use crate::validation::{required_gates, Gate, GateAnswers, SponsorConfig};

/// Steps of the capture flow, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStep {
    StartTime,
    Intensity,
    EndTime,
    Complete,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("start time must be set before the end time")]
    StartTimeMissing,

    #[error("end time must be strictly after the start time")]
    EndBeforeStart,

    #[error("operation not valid at step {0:?}")]
    WrongStep(RecordingStep),

    #[error("only an existing record can be deleted from the flow")]
    NotEditing,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What follows a confirmed end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTimeOutcome {
    /// Review step is enabled; the flow sits at `Complete` until the
    /// user saves or edits further.
    Review,
    /// Review step is disabled; the caller saves immediately.
    ReadyToSave,
}

/// Result of tapping a summary field to jump back to its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
    Moved,
    /// End time is unreachable until intensity is set; the UI flashes
    /// the intensity field instead.
    NudgeIntensity,
}

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved {
        record: EventRecord,
        /// Advisory: other real events colliding with this one. Never
        /// blocks the save.
        overlap_warnings: Vec<EventRecord>,
    },
    /// Validation gates still need user input; collect answers and
    /// call `save` again.
    GatesRequired(Vec<Gate>),
    /// The user declined a gate. A normal abort, not an error.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    New,
    Edit { original: EventRecord },
}

/// The capture flow for one diary entry.
#[derive(Debug, Clone)]
pub struct RecordingFlow {
    step: RecordingStep,
    mode: Mode,
    draft: RecordDraft,
    initial: RecordDraft,
    /// Gate confirmations collected for the current save attempt.
    pub answers: GateAnswers,
    config: SponsorConfig,
    finished: bool,
}

impl RecordingFlow {
    /// Flow for a brand-new entry; always begins at the start time.
    pub fn new_entry(config: SponsorConfig) -> Self {
        let draft = RecordDraft {
            kind: RecordKind::Nosebleed,
            date: Local::now().date_naive(),
            start_time: None,
            end_time: None,
            intensity: None,
            notes: None,
        };
        Self {
            step: RecordingStep::StartTime,
            mode: Mode::New,
            initial: draft.clone(),
            draft,
            answers: GateAnswers::default(),
            config,
            finished: false,
        }
    }

    /// Flow for editing an existing record; begins at the first step
    /// whose field is unset.
    pub fn edit(original: EventRecord, config: SponsorConfig) -> Self {
        let draft = RecordDraft::from_record(&original);
        let step = if draft.start_time.is_none() {
            RecordingStep::StartTime
        } else if draft.intensity.is_none() {
            RecordingStep::Intensity
        } else if draft.end_time.is_none() {
            RecordingStep::EndTime
        } else {
            RecordingStep::Complete
        };
        Self {
            step,
            mode: Mode::Edit { original },
            initial: draft.clone(),
            draft,
            answers: GateAnswers::default(),
            config,
            finished: false,
        }
    }

    pub fn step(&self) -> RecordingStep {
        self.step
    }

    pub fn draft(&self) -> &RecordDraft {
        &self.draft
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Edit { .. })
    }

    /// Whether any field differs from its initial value.
    pub fn is_dirty(&self) -> bool {
        self.draft != self.initial
    }

    /// `StartTime --confirm--> Intensity`. The diary day is re-derived
    /// from the confirmed start time. A kept end time that is no longer
    /// strictly after the new start is cleared so the draft stays
    /// persistable, and previously collected gate answers are discarded
    /// since the times they answered for changed.
    pub fn confirm_start_time(&mut self, start: DateTime<FixedOffset>) -> Result<(), FlowError> {
        if self.step != RecordingStep::StartTime {
            return Err(FlowError::WrongStep(self.step));
        }
        self.draft.start_time = Some(start);
        self.draft.date = start.date_naive();
        if self.draft.end_time.is_some_and(|end| end <= start) {
            self.draft.end_time = None;
        }
        self.answers = GateAnswers::default();
        self.step = RecordingStep::Intensity;
        Ok(())
    }

    /// `Intensity --select--> EndTime`.
    pub fn select_intensity(&mut self, intensity: Intensity) -> Result<(), FlowError> {
        if self.step != RecordingStep::Intensity {
            return Err(FlowError::WrongStep(self.step));
        }
        self.draft.intensity = Some(intensity);
        self.step = RecordingStep::EndTime;
        Ok(())
    }

    /// `EndTime --confirm--> Complete`. An end time before the start
    /// time (or without one) is rejected and no transition occurs.
    pub fn confirm_end_time(
        &mut self,
        end: DateTime<FixedOffset>,
    ) -> Result<EndTimeOutcome, FlowError> {
        if self.step != RecordingStep::EndTime {
            return Err(FlowError::WrongStep(self.step));
        }
        let start = self.draft.start_time.ok_or(FlowError::StartTimeMissing)?;
        if end <= start {
            return Err(FlowError::EndBeforeStart);
        }
        self.draft.end_time = Some(end);
        // The duration just changed; stale confirmations for the old
        // duration must not carry over to the next save attempt.
        self.answers.short_duration_confirmed = None;
        self.answers.long_duration_confirmed = None;
        self.step = RecordingStep::Complete;
        Ok(if self.config.review_screen_enabled {
            EndTimeOutcome::Review
        } else {
            EndTimeOutcome::ReadyToSave
        })
    }

    /// Tap a summary field to return to its step. End time stays
    /// unreachable until intensity has been set.
    pub fn jump_to(&mut self, target: RecordingStep) -> Result<JumpOutcome, FlowError> {
        match target {
            RecordingStep::StartTime | RecordingStep::Intensity => {
                self.step = target;
                Ok(JumpOutcome::Moved)
            }
            RecordingStep::EndTime => {
                if self.draft.intensity.is_none() {
                    Ok(JumpOutcome::NudgeIntensity)
                } else {
                    self.step = RecordingStep::EndTime;
                    Ok(JumpOutcome::Moved)
                }
            }
            RecordingStep::Complete => Err(FlowError::WrongStep(self.step)),
        }
    }

    /// `Complete --save--> terminal`. Runs the validation gates against
    /// the collected answers, computes advisory overlap warnings, and
    /// persists through the Record Store.
    pub fn save(&mut self, conn: &Connection) -> Result<SaveOutcome, FlowError> {
        if self.step != RecordingStep::Complete {
            return Err(FlowError::WrongStep(self.step));
        }

        if self.answers.any_declined() {
            tracing::info!("save cancelled: validation gate declined");
            return Ok(SaveOutcome::Cancelled);
        }
        let today = Local::now().date_naive();
        let pending = required_gates(&self.draft, today, &self.answers, &self.config);
        if !pending.is_empty() {
            return Ok(SaveOutcome::GatesRequired(pending));
        }

        let overlap_warnings = self.overlap_warnings(conn)?;
        let record = self.persist_draft(conn)?;
        self.finished = true;
        tracing::info!(record_id = %record.id, warnings = overlap_warnings.len(), "entry saved");
        Ok(SaveOutcome::Saved {
            record,
            overlap_warnings,
        })
    }

    /// `Complete --delete--> terminal` (edit mode only).
    pub fn delete(&mut self, conn: &Connection, reason: &str) -> Result<(), FlowError> {
        let Mode::Edit { original } = &self.mode else {
            return Err(FlowError::NotEditing);
        };
        store::delete_record(conn, original.id, reason)?;
        self.finished = true;
        Ok(())
    }

    /// Navigation-away handler: a dirty, unfinished draft is preserved
    /// through the store without prompting. Such records carry
    /// `is_incomplete() == true` whenever intensity or end time is
    /// still missing.
    pub fn exit(&mut self, conn: &Connection) -> Result<Option<EventRecord>, StorageError> {
        if self.finished || !self.is_dirty() {
            return Ok(None);
        }
        let record = match &self.mode {
            Mode::New => store::add_record(conn, &self.draft)?,
            Mode::Edit { original } => store::update_record(conn, original.id, &self.draft)?,
        };
        self.finished = true;
        tracing::info!(record_id = %record.id, "partial entry auto-preserved on exit");
        Ok(Some(record))
    }

    fn overlap_warnings(&self, conn: &Connection) -> Result<Vec<EventRecord>, StorageError> {
        let (Some(start), Some(end)) = (self.draft.start_time, self.draft.end_time) else {
            return Ok(Vec::new());
        };
        let own_root = match &self.mode {
            Mode::New => None,
            Mode::Edit { original } => Some(original.root_id),
        };
        let active = store::get_local_records(conn)?;
        Ok(find_overlaps(start, end, own_root, &active)
            .into_iter()
            .cloned()
            .collect())
    }

    fn persist_draft(&self, conn: &Connection) -> Result<EventRecord, StorageError> {
        match &self.mode {
            Mode::New => store::add_record(conn, &self.draft),
            Mode::Edit { original } => store::update_record(conn, original.id, &self.draft),
        }
    }
}
