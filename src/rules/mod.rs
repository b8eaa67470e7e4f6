//! Per-update translation decisions
//!
//! This module is the decision layer of the pipeline:
//! - Quality gating (word count, filler detection, length)
//! - Trigger priority (sentence ending, max interval, final, pause)
//! - New-text extraction against the previously translated tail
//! - Duplicate suppression over recent translation outputs

mod engine;
pub mod text;

pub use engine::{Decision, DecisionMetrics, DecisionReason, RulesEngine, TranscriptUpdate, Trigger};
