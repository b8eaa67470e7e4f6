//! Session coordination
//!
//! This module owns the per-session state machine:
//! - Mode configuration and language-tag validation
//! - The coordinator task that serializes translations, defers finals
//!   arriving mid-flight, and drives the pause and inactivity timers
//! - Teardown statistics

mod coordinator;
mod options;
mod stats;

pub use coordinator::{
    SessionCommand, SessionCoordinator, SessionHandle, SessionParams, TranslationJob,
};
pub use options::{
    base_language, validate_source_language, validate_target_language, ModeConfig, SessionMode,
    MAX_TRANSLATION_INTERVAL_MS, MIN_TRANSLATION_INTERVAL_MS,
};
pub use stats::SessionStats;
