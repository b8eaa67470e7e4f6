use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

use super::text;
use crate::session::ModeConfig;

/// How a transcript update reached the decision layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Interim,
    Final,
    Pause,
}

/// One transcript update to decide on.
#[derive(Debug, Clone)]
pub struct TranscriptUpdate {
    /// Current full transcript for the utterance
    pub text: String,
    /// Whether the recognizer regards this chunk as terminal
    pub is_final: bool,
    /// Time since `text` last differed from its prior value
    pub time_since_last_change: Duration,
    pub trigger: Trigger,
    /// For logging only
    pub client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    SentenceEnding,
    MaxInterval,
    FinalResult,
    PauseDetected,
    WaitingForTrigger,
    TooFewWords,
    FillerWordsOnly,
    TooShort,
    EmptyText,
    MaxIntervalPoorQuality,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::SentenceEnding => "sentence_ending",
            DecisionReason::MaxInterval => "max_interval",
            DecisionReason::FinalResult => "final_result",
            DecisionReason::PauseDetected => "pause_detected",
            DecisionReason::WaitingForTrigger => "waiting_for_trigger",
            DecisionReason::TooFewWords => "too_few_words",
            DecisionReason::FillerWordsOnly => "filler_words_only",
            DecisionReason::TooShort => "too_short",
            DecisionReason::EmptyText => "empty_text",
            DecisionReason::MaxIntervalPoorQuality => "max_interval_poor_quality",
        }
    }
}

/// The decision taken for a single update.
#[derive(Debug, Clone)]
pub struct Decision {
    pub should_translate: bool,
    pub reason: DecisionReason,
    pub confidence: f64,
    /// The portion of the transcript not yet covered by a translation
    pub new_text: String,
    pub is_complete: bool,
}

impl Decision {
    fn reject(reason: DecisionReason) -> Self {
        Self {
            should_translate: false,
            reason,
            confidence: 0.0,
            new_text: String::new(),
            is_complete: false,
        }
    }
}

/// Counters kept per session and logged at teardown.
#[derive(Debug, Default, Clone)]
pub struct DecisionMetrics {
    pub checks: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub by_reason: HashMap<&'static str, u64>,
}

#[derive(Debug)]
struct RecentTranslation {
    text: String,
    at: Instant,
}

enum Quality {
    Ok,
    Reject(DecisionReason),
}

const LAST_TRANSLATED_TAIL: usize = 500;
const LAST_TRANSLATED_HARD_CAP: usize = 2_000;
const ACCUMULATED_TAIL: usize = 1_000;
const MIN_CHARS: usize = 10;

/// Decides, per transcript update, whether to translate now.
///
/// Decision state (`last_translation_time`, `last_translated_text`) mutates
/// only on approvals; a rejected update must never poison later decisions.
pub struct RulesEngine {
    mode: ModeConfig,
    last_translation_time: Option<Instant>,
    last_translated_text: String,
    accumulated_text: String,
    recent: VecDeque<RecentTranslation>,
    metrics: DecisionMetrics,
}

impl RulesEngine {
    pub fn new(mode: ModeConfig) -> Self {
        Self {
            mode,
            last_translation_time: None,
            last_translated_text: String::new(),
            accumulated_text: String::new(),
            recent: VecDeque::new(),
            metrics: DecisionMetrics::default(),
        }
    }

    /// Decide whether the update should trigger a translation.
    pub fn decide(&mut self, update: &TranscriptUpdate) -> Decision {
        self.decide_at(update, Instant::now())
    }

    /// Clock-injected form of [`decide`](Self::decide).
    pub fn decide_at(&mut self, update: &TranscriptUpdate, now: Instant) -> Decision {
        self.metrics.checks += 1;
        let since_last = match self.last_translation_time {
            Some(t) => now.duration_since(t),
            None => {
                // Interval timing starts at the first check
                self.last_translation_time = Some(now);
                Duration::ZERO
            }
        };

        let quality = self.quality_check(&update.text);
        let decision = self.apply_priority(update, since_last, quality);

        if decision.should_translate {
            self.last_translation_time = Some(now);
            self.last_translated_text =
                text::tail_chars(update.text.trim(), LAST_TRANSLATED_TAIL).to_string();
        }

        self.record(&decision);
        debug!(
            client_id = %update.client_id,
            reason = decision.reason.as_str(),
            approved = decision.should_translate,
            "decision"
        );
        decision
    }

    fn apply_priority(
        &self,
        update: &TranscriptUpdate,
        since_last: Duration,
        quality: Quality,
    ) -> Decision {
        let interval_reached = since_last >= self.mode.translation_interval;

        if text::is_sentence_ending(&update.text) {
            if let Quality::Ok = quality {
                return self.approve(update, DecisionReason::SentenceEnding, 1.0);
            }
        }

        if interval_reached {
            return match quality {
                Quality::Ok => self.approve(update, DecisionReason::MaxInterval, 0.9),
                // The interval timer is not reset on rejection
                Quality::Reject(_) => Decision::reject(DecisionReason::MaxIntervalPoorQuality),
            };
        }

        if update.is_final {
            return match quality {
                Quality::Ok => self.approve(update, DecisionReason::FinalResult, 0.8),
                Quality::Reject(reason) => Decision::reject(reason),
            };
        }

        if update.time_since_last_change >= self.mode.pause_detection {
            if let Quality::Ok = quality {
                return self.approve(update, DecisionReason::PauseDetected, 0.7);
            }
        }

        Decision::reject(DecisionReason::WaitingForTrigger)
    }

    fn approve(&self, update: &TranscriptUpdate, reason: DecisionReason, confidence: f64) -> Decision {
        let new_text = self.get_new_text(&update.text);
        Decision {
            should_translate: !new_text.is_empty(),
            reason,
            confidence,
            new_text,
            is_complete: true,
        }
    }

    /// Quality gate, applied in a fixed order.
    fn quality_check(&self, raw: &str) -> Quality {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Quality::Reject(DecisionReason::EmptyText);
        }
        if text::word_count(trimmed) < self.mode.min_words {
            return Quality::Reject(DecisionReason::TooFewWords);
        }
        if text::is_filler_only(trimmed) {
            return Quality::Reject(DecisionReason::FillerWordsOnly);
        }
        if trimmed.chars().count() < MIN_CHARS {
            return Quality::Reject(DecisionReason::TooShort);
        }
        Quality::Ok
    }

    /// Extract the portion of `full_text` not covered by the last approval.
    ///
    /// The comparison is case-insensitive. The word-count guard on the subset
    /// test matters after a recognizer restart: the retained tail may
    /// coincidentally contain a new short utterance.
    pub fn get_new_text(&self, full_text: &str) -> String {
        let current = full_text.trim();
        if current.is_empty() {
            return String::new();
        }

        let last = self.last_translated_text.trim();
        if last.is_empty() {
            return current.to_string();
        }

        let current_lower = current.to_lowercase();
        let last_lower = last.to_lowercase();

        if current_lower == last_lower {
            return String::new();
        }

        if last_lower.contains(&current_lower)
            && text::word_count(current) <= text::word_count(last)
        {
            return String::new();
        }

        if current_lower.starts_with(&last_lower) {
            if let Some(suffix) = current.get(last_lower.len()..) {
                return suffix.trim().to_string();
            }
        }

        if text::multiset_overlap(current, last) > self.mode.new_text_overlap_threshold {
            return String::new();
        }

        current.to_string()
    }

    /// Post-translation duplicate predicate over the recent-output window.
    pub fn is_duplicate_translation(&mut self, translated: &str) -> bool {
        self.is_duplicate_translation_at(translated, Instant::now())
    }

    pub fn is_duplicate_translation_at(&mut self, translated: &str, now: Instant) -> bool {
        self.evict(now);
        let candidate = translated.trim().to_lowercase();
        if candidate.is_empty() {
            return true;
        }

        self.recent.iter().any(|entry| {
            let prior = entry.text.trim().to_lowercase();
            if prior == candidate {
                return true;
            }
            let (short, long) = if prior.len() <= candidate.len() {
                (&prior, &candidate)
            } else {
                (&candidate, &prior)
            };
            if long.contains(short.as_str())
                && short.len() as f64 / long.len() as f64 >= self.mode.dedup_overlap_threshold
            {
                return true;
            }
            text::multiset_overlap(&entry.text, translated) >= self.mode.dedup_overlap_threshold
        })
    }

    /// Record an emitted (or suppressed) translation output for dedup.
    pub fn record_translation(&mut self, translated: &str) {
        self.record_translation_at(translated, Instant::now());
    }

    pub fn record_translation_at(&mut self, translated: &str, now: Instant) {
        self.recent.push_back(RecentTranslation {
            text: translated.to_string(),
            at: now,
        });
        self.evict(now);
    }

    fn evict(&mut self, now: Instant) {
        let window = self.mode.dedup_window();
        while let Some(front) = self.recent.front() {
            if now.duration_since(front.at) > window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Append an emitted translation to the bounded running tail.
    pub fn record_emission(&mut self, translated: &str) {
        if self.accumulated_text.is_empty() {
            self.accumulated_text = translated.to_string();
        } else {
            self.accumulated_text.push(' ');
            self.accumulated_text.push_str(translated);
        }
        if self.accumulated_text.chars().count() > ACCUMULATED_TAIL {
            self.accumulated_text =
                text::tail_chars(&self.accumulated_text, ACCUMULATED_TAIL).to_string();
        }
        debug_assert!(self.last_translated_text.chars().count() <= LAST_TRANSLATED_HARD_CAP);
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn last_translated_text(&self) -> &str {
        &self.last_translated_text
    }

    pub fn metrics(&self) -> &DecisionMetrics {
        &self.metrics
    }

    fn record(&mut self, decision: &Decision) {
        if decision.should_translate {
            self.metrics.approvals += 1;
        } else {
            self.metrics.rejections += 1;
        }
        *self
            .metrics
            .by_reason
            .entry(decision.reason.as_str())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RulesEngine {
        RulesEngine::new(ModeConfig::talks())
    }

    fn update(text: &str, is_final: bool, trigger: Trigger) -> TranscriptUpdate {
        TranscriptUpdate {
            text: text.to_string(),
            is_final,
            time_since_last_change: Duration::from_millis(1_000),
            trigger,
            client_id: "test-client".to_string(),
        }
    }

    #[test]
    fn test_single_word_final_is_blocked() {
        let mut eng = engine();
        let d = eng.decide(&update("pair", true, Trigger::Final));
        assert!(!d.should_translate);
        assert_eq!(d.reason, DecisionReason::TooFewWords);
    }

    #[test]
    fn test_sentence_ending_approves_with_full_confidence() {
        let mut eng = engine();
        let d = eng.decide(&update(
            "we have arrived at the station together.",
            false,
            Trigger::Interim,
        ));
        assert!(d.should_translate);
        assert_eq!(d.reason, DecisionReason::SentenceEnding);
        assert!((d.confidence - 1.0).abs() < 1e-9);
        assert!(d.is_complete);
    }

    #[test]
    fn test_ellipsis_is_not_a_sentence_ending() {
        let mut eng = engine();
        let d = eng.decide(&update(
            "we have arrived at the station together...",
            false,
            Trigger::Interim,
        ));
        assert!(!d.should_translate);
        assert_eq!(d.reason, DecisionReason::WaitingForTrigger);
    }

    #[test]
    fn test_max_interval_approves_without_sentence_ending() {
        let mut eng = engine();
        let now = Instant::now();
        // Timer starts on the first check
        eng.decide_at(&update("short", false, Trigger::Interim), now);

        let later = now + Duration::from_millis(16_000);
        let d = eng.decide_at(
            &update(
                "welcome to JW broadcasting in this program we will see",
                false,
                Trigger::Interim,
            ),
            later,
        );
        assert!(d.should_translate);
        assert_eq!(d.reason, DecisionReason::MaxInterval);
        assert!((d.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_max_interval_poor_quality_does_not_reset_timer() {
        let mut eng = engine();
        let now = Instant::now();
        eng.decide_at(&update("short", false, Trigger::Interim), now);

        let later = now + Duration::from_millis(16_000);
        let d = eng.decide_at(&update("um uh", false, Trigger::Interim), later);
        assert!(!d.should_translate);
        assert_eq!(d.reason, DecisionReason::MaxIntervalPoorQuality);

        // A quality utterance right after still sees the interval as elapsed
        let d = eng.decide_at(
            &update("now we finally have enough words here", false, Trigger::Interim),
            later + Duration::from_millis(100),
        );
        assert!(d.should_translate);
        assert_eq!(d.reason, DecisionReason::MaxInterval);
    }

    #[test]
    fn test_rejection_does_not_mutate_state() {
        let mut eng = engine();
        eng.decide(&update(
            "the first full sentence we translate.",
            false,
            Trigger::Interim,
        ));
        let before = eng.last_translated_text().to_string();

        let d = eng.decide(&update("pair", true, Trigger::Final));
        assert!(!d.should_translate);
        assert_eq!(eng.last_translated_text(), before);
    }

    #[test]
    fn test_case_insensitive_subset_duplicate() {
        let mut eng = engine();
        eng.last_translated_text = "hrănește ceea ce suntem în interior".to_string();

        let d = eng.decide(&update("Hrănește ceea ce suntem", true, Trigger::Final));
        assert!(!d.should_translate);
        assert!(d.new_text.is_empty());
    }

    #[test]
    fn test_prefix_extension_yields_suffix() {
        let mut eng = engine();
        eng.last_translated_text = "the book of obadiah".to_string();

        let new_text = eng.get_new_text("The book of Obadiah is one of the shortest");
        assert_eq!(new_text, "is one of the shortest");
    }

    #[test]
    fn test_heavy_overlap_is_duplicate() {
        let mut eng = engine();
        eng.last_translated_text = "we will read from the book of psalms today".to_string();

        let new_text = eng.get_new_text("today we will read from the book of psalms");
        assert!(new_text.is_empty());
    }

    #[test]
    fn test_distinct_utterance_passes_whole_text() {
        let mut eng = engine();
        eng.last_translated_text = "the weather has been lovely".to_string();

        let new_text = eng.get_new_text("please open your songbooks to number five");
        assert_eq!(new_text, "please open your songbooks to number five");
    }

    #[test]
    fn test_duplicate_translation_window() {
        let mut eng = engine();
        let now = Instant::now();
        eng.record_translation_at("The book of Obadiah is short", now);

        assert!(eng.is_duplicate_translation_at("the book of obadiah is short", now));
        assert!(eng.is_duplicate_translation_at("The book of Obadiah is", now));

        let past_window = now + eng.mode.dedup_window() + Duration::from_secs(1);
        assert!(!eng.is_duplicate_translation_at("The book of Obadiah is short", past_window));
    }

    #[test]
    fn test_accumulated_text_is_bounded() {
        let mut eng = engine();
        for _ in 0..100 {
            eng.record_emission("a somewhat long emitted translation chunk");
        }
        assert!(eng.accumulated_text().chars().count() <= 1_000);
    }

    #[test]
    fn test_metrics_histogram() {
        let mut eng = engine();
        eng.decide(&update("", true, Trigger::Final));
        eng.decide(&update("pair", true, Trigger::Final));
        eng.decide(&update(
            "a complete sentence that clears every gate.",
            true,
            Trigger::Final,
        ));

        let m = eng.metrics();
        assert_eq!(m.checks, 3);
        assert_eq!(m.approvals, 1);
        assert_eq!(m.rejections, 2);
        assert_eq!(m.by_reason.get("empty_text"), Some(&1));
        assert_eq!(m.by_reason.get("too_few_words"), Some(&1));
    }
}
