//! Translation pipeline
//!
//! Turns an approved decision and the full transcript into at most one
//! emitted translation string:
//! - Full-context translation happens upstream (the whole transcript is
//!   sent to MT, never the delta chunk)
//! - Word-LCP extraction emits only the words beyond the committed prefix
//! - The raw MT output is committed before post-processing, so the next
//!   LCP comparison always runs against a string MT actually produced

pub mod lcp;
pub mod postprocess;

use std::sync::Arc;

use tracing::debug;

pub use lcp::LcpOutcome;
pub use postprocess::{default_mappings, TermMapping};

/// Fraction of committed words that must match as a prefix for tail
/// extraction; below this the full translation is emitted instead.
pub const LCP_THRESHOLD: f64 = 0.60;

/// Per-session pipeline state.
pub struct TranslationPipeline {
    /// Raw MT output for the full transcript from the last successful call.
    /// Never the concatenation of emitted tails.
    committed_translation: String,
    emitted_count: u64,
    lcp_threshold: f64,
    mappings: Arc<Vec<TermMapping>>,
}

impl TranslationPipeline {
    pub fn new(mappings: Arc<Vec<TermMapping>>) -> Self {
        Self {
            committed_translation: String::new(),
            emitted_count: 0,
            lcp_threshold: LCP_THRESHOLD,
            mappings,
        }
    }

    /// Process a successful full-context MT result.
    ///
    /// Commits the raw output, extracts the new tail, and post-processes it.
    /// Returns the text to emit; an empty result means the translation added
    /// nothing new.
    pub fn process(
        &mut self,
        translated_full: &str,
        source_new_text: &str,
        source_full_text: &str,
        target_lang: &str,
    ) -> String {
        let emitted = match lcp::extract_tail(
            &self.committed_translation,
            translated_full,
            self.lcp_threshold,
        ) {
            LcpOutcome::Tail(tail) => tail,
            LcpOutcome::Diverged => {
                debug!("translation prefix diverged, emitting full output");
                translated_full.trim().to_string()
            }
        };

        self.committed_translation = translated_full.to_string();

        if emitted.is_empty() {
            return emitted;
        }

        postprocess::apply(
            &emitted,
            source_new_text,
            source_full_text,
            target_lang,
            &self.mappings,
        )
    }

    /// Count an emitted translation.
    pub fn mark_emitted(&mut self) -> u64 {
        self.emitted_count += 1;
        self.emitted_count
    }

    pub fn emitted_count(&self) -> u64 {
        self.emitted_count
    }

    /// Drop the committed translation. A fresh recognizer stream produces
    /// fresh full-context translations that share no prefix with the old.
    pub fn reset_committed(&mut self) {
        self.committed_translation.clear();
    }

    /// The committed translation, exposed for debugging.
    pub fn last_full_translation(&self) -> &str {
        &self.committed_translation
    }
}
