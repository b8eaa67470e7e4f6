use std::time::{Duration, Instant};

use lingo_relay::rules::text;
use lingo_relay::{DecisionReason, ModeConfig, RulesEngine, TranscriptUpdate, Trigger};

fn talks_engine() -> RulesEngine {
    RulesEngine::new(ModeConfig::talks())
}

fn update(text: &str, is_final: bool, trigger: Trigger) -> TranscriptUpdate {
    TranscriptUpdate {
        text: text.to_string(),
        is_final,
        time_since_last_change: Duration::from_millis(1_000),
        trigger,
        client_id: "client-1".to_string(),
    }
}

#[test]
fn test_single_word_final_is_blocked() {
    let mut engine = talks_engine();
    let decision = engine.decide(&update("pair", true, Trigger::Final));
    assert!(!decision.should_translate);
    assert_eq!(decision.reason, DecisionReason::TooFewWords);
    assert!(decision.new_text.is_empty());
}

#[test]
fn test_continuous_speech_hits_max_interval() {
    let mut engine = talks_engine();
    let start = Instant::now();
    engine.decide_at(&update("hello", false, Trigger::Interim), start);

    let decision = engine.decide_at(
        &update(
            "welcome to JW broadcasting in this program we will see",
            false,
            Trigger::Interim,
        ),
        start + Duration::from_millis(16_000),
    );
    assert!(decision.should_translate);
    assert_eq!(decision.reason, DecisionReason::MaxInterval);
    assert!((decision.confidence - 0.9).abs() < 1e-9);
}

#[test]
fn test_case_insensitive_subset_duplicate() {
    let mut engine = talks_engine();
    // Establish the translated tail through a normal approval
    let first = engine.decide(&update(
        "hrănește ceea ce suntem în interior.",
        false,
        Trigger::Interim,
    ));
    assert!(first.should_translate);

    // The incoming final is a case-variant subset of what was translated
    let second = engine.decide(&update("Hrănește ceea ce suntem", true, Trigger::Final));
    assert!(!second.should_translate);
    assert!(second.new_text.is_empty());
}

#[test]
fn test_subset_duplicate_with_enough_words() {
    let mut engine = talks_engine();
    let first = engine.decide(&update(
        "the brothers prepared the program for the congregation meeting tonight.",
        false,
        Trigger::Interim,
    ));
    assert!(first.should_translate);

    let second = engine.decide(&update(
        "brothers prepared the program for the congregation",
        true,
        Trigger::Final,
    ));
    assert!(!second.should_translate);
    assert_eq!(second.reason, DecisionReason::FinalResult);
    assert!(second.new_text.is_empty());
}

#[test]
fn test_quality_check_order_is_deterministic() {
    let mut engine = talks_engine();
    assert_eq!(
        engine.decide(&update("", true, Trigger::Final)).reason,
        DecisionReason::EmptyText
    );
    assert_eq!(
        engine.decide(&update("only three words", true, Trigger::Final)).reason,
        DecisionReason::TooFewWords
    );
    assert_eq!(
        engine
            .decide(&update("uh um ah hmm eh er", true, Trigger::Final))
            .reason,
        DecisionReason::FillerWordsOnly
    );

    // Reaching the character gate needs a lower word floor
    let mut earbuds = RulesEngine::new(ModeConfig::earbuds());
    assert_eq!(
        earbuds.decide(&update("a b c d", true, Trigger::Final)).reason,
        DecisionReason::TooShort
    );
}

#[test]
fn test_sentence_ending_law() {
    assert!(text::is_sentence_ending("a."));
    assert!(!text::is_sentence_ending("a.."));
    assert!(!text::is_sentence_ending("a..."));
    assert!(text::is_sentence_ending("a.   "));
}

#[test]
fn test_overlap_uses_multiset_counts() {
    let overlap = text::multiset_overlap("the the the cat", "the cat");
    assert!((overlap - 0.5).abs() < 1e-9);
}

#[test]
fn test_pause_trigger_approves_quality_text() {
    let mut engine = talks_engine();
    let decision = engine.decide(&TranscriptUpdate {
        text: "we walked along the river to the market".to_string(),
        is_final: false,
        time_since_last_change: Duration::from_millis(4_200),
        trigger: Trigger::Pause,
        client_id: "client-1".to_string(),
    });
    assert!(decision.should_translate);
    assert_eq!(decision.reason, DecisionReason::PauseDetected);
    assert!((decision.confidence - 0.7).abs() < 1e-9);
}

#[test]
fn test_decision_state_changes_only_on_approval() {
    let mut engine = talks_engine();
    engine.decide(&update(
        "the first full sentence we translated here.",
        false,
        Trigger::Interim,
    ));
    let tail_before = engine.last_translated_text().to_string();

    // A string of rejections of every flavor
    engine.decide(&update("", true, Trigger::Final));
    engine.decide(&update("pair", true, Trigger::Final));
    engine.decide(&update("um uh like", true, Trigger::Final));
    engine.decide(&update("still speaking without a stop", false, Trigger::Interim));

    assert_eq!(engine.last_translated_text(), tail_before);
}

#[test]
fn test_post_translation_duplicate_predicate() {
    let mut engine = talks_engine();
    engine.record_translation("Jehovah gives strength to his people");

    // Exact, case-insensitive
    assert!(engine.is_duplicate_translation("jehovah gives strength to his people"));
    // Substring with high length ratio
    assert!(engine.is_duplicate_translation("Jehovah gives strength to his"));
    // Heavy word overlap
    assert!(engine.is_duplicate_translation("Jehovah gives his people strength"));
    // Genuinely new output
    assert!(!engine.is_duplicate_translation("the congregation sang a new song"));
}
