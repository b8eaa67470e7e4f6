use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Session mode names accepted at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Long-form talks: favor larger, well-formed emissions
    Talks,
    /// Low-latency earbud relay: smaller emissions, TTS downstream
    Earbuds,
}

impl SessionMode {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "talks" => Ok(SessionMode::Talks),
            "earbuds" => Ok(SessionMode::Earbuds),
            other => bail!("Unknown session mode: {}", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Talks => "talks",
            SessionMode::Earbuds => "earbuds",
        }
    }
}

/// Per-session tuning bundle.
///
/// The overlap thresholds were tuned empirically; they are carried here so
/// they can be overridden per mode and logged at session start.
#[derive(Debug, Clone)]
pub struct ModeConfig {
    /// Maximum time between emissions irrespective of pauses
    pub translation_interval: Duration,
    /// Quiet interval after the last text change that triggers emission
    pub pause_detection: Duration,
    /// Minimum word count for quality acceptance
    pub min_words: usize,
    /// Downstream rendering hint (pass-through)
    pub enable_tts: bool,
    /// Downstream rendering hint (pass-through)
    pub display_visual_cards: bool,
    /// Word-overlap ratio above which incoming text is a duplicate
    pub new_text_overlap_threshold: f64,
    /// Word-overlap ratio above which a translation output is a duplicate
    pub dedup_overlap_threshold: f64,
}

pub const MIN_TRANSLATION_INTERVAL_MS: u64 = 1_000;
pub const MAX_TRANSLATION_INTERVAL_MS: u64 = 60_000;
const MIN_DEDUP_WINDOW: Duration = Duration::from_millis(20_000);

impl Default for ModeConfig {
    fn default() -> Self {
        ModeConfig::talks()
    }
}

impl ModeConfig {
    pub fn talks() -> Self {
        Self {
            translation_interval: Duration::from_millis(15_000),
            pause_detection: Duration::from_millis(4_000),
            min_words: 6,
            enable_tts: false,
            display_visual_cards: true,
            new_text_overlap_threshold: 0.65,
            dedup_overlap_threshold: 0.65,
        }
    }

    pub fn earbuds() -> Self {
        Self {
            translation_interval: Duration::from_millis(8_000),
            pause_detection: Duration::from_millis(2_500),
            min_words: 4,
            enable_tts: true,
            display_visual_cards: false,
            ..ModeConfig::talks()
        }
    }

    pub fn for_mode(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Talks => ModeConfig::talks(),
            SessionMode::Earbuds => ModeConfig::earbuds(),
        }
    }

    /// Apply a client-supplied interval override, validated to 1-60 s.
    pub fn with_interval_override(mut self, interval_ms: u64) -> Result<Self> {
        if !(MIN_TRANSLATION_INTERVAL_MS..=MAX_TRANSLATION_INTERVAL_MS).contains(&interval_ms) {
            bail!(
                "translationInterval must be between {} and {} ms",
                MIN_TRANSLATION_INTERVAL_MS,
                MAX_TRANSLATION_INTERVAL_MS
            );
        }
        self.translation_interval = Duration::from_millis(interval_ms);
        Ok(self)
    }

    /// Horizon for post-translation duplicate detection. Always exceeds the
    /// translation interval, even when the interval is overridden upward.
    pub fn dedup_window(&self) -> Duration {
        MIN_DEDUP_WINDOW.max(self.translation_interval + Duration::from_millis(5_000))
    }
}

static SOURCE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2}-[A-Z]{2}$").unwrap());
static TARGET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$").unwrap());

/// Validate a source language tag (`ro-RO` form).
pub fn validate_source_language(tag: &str) -> Result<()> {
    if !SOURCE_TAG.is_match(tag) {
        bail!("Invalid source language tag: {}", tag);
    }
    Ok(())
}

/// Validate a target language tag (`en` or `en-US` form).
pub fn validate_target_language(tag: &str) -> Result<()> {
    if !TARGET_TAG.is_match(tag) {
        bail!("Invalid target language tag: {}", tag);
    }
    Ok(())
}

/// Primary language subtag (`ro-RO` -> `ro`).
pub fn base_language(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}
