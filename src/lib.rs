//! Epistax core — a local-first nosebleed diary engine.
//!
//! Records discrete nosebleed episodes and day-level markers in an
//! append-only SQLite journal, classifies each calendar day for the
//! diary calendar, gates saves behind sponsor-configurable validation
//! rules, and reconciles the local journal with a remote copy on a
//! best-effort basis. Rendering, navigation, and account handling live
//! elsewhere; everything here returns plain data and typed errors.

pub mod config;
pub mod db;
pub mod models;
pub mod store; // Record Store: append-only versioned persistence
pub mod overlap; // Overlap Detector: advisory time-range collisions
pub mod day_status; // Day Status Classifier: one status per calendar day
pub mod validation; // Validation Gate: sponsor-configurable pre-save checks
pub mod recording; // Recording State Machine: guided capture flow
pub mod sync; // Sync Coordinator: push/pull with aggregate reporting

pub use db::StorageError;
pub use day_status::{day_status_range, get_day_status_range, DayStatus};
pub use models::{EventRecord, Intensity, RecordDraft, RecordKind, SyncState};
pub use recording::{RecordingFlow, RecordingStep, SaveOutcome};
pub use store::DayMarkOutcome;
pub use sync::{SyncError, SyncOutcome};
pub use validation::SponsorConfig;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for an embedding application. `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
