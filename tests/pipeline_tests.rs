use std::sync::Arc;

use lingo_relay::pipeline::{default_mappings, TranslationPipeline};
use lingo_relay::{ModeConfig, RulesEngine};

fn pipeline() -> TranslationPipeline {
    TranslationPipeline::new(Arc::new(default_mappings()))
}

#[test]
fn test_lcp_extraction_emits_only_new_tail() {
    let mut p = pipeline();
    p.process(
        "The book of Obadiah is",
        "cartea lui Obadia este",
        "cartea lui Obadia este",
        "en",
    );

    let emitted = p.process(
        "The book of Obadiah is one of the shortest",
        "una dintre cele mai scurte",
        "cartea lui Obadia este una dintre cele mai scurte",
        "en",
    );
    assert_eq!(emitted, "one of the shortest");
}

#[test]
fn test_committed_translation_is_raw_mt_output() {
    let mut p = pipeline();
    // First round produces post-processed output differing from raw MT
    let emitted = p.process("the Lord is good", "Iehova este bun", "Iehova este bun", "en");
    assert_eq!(emitted, "Jehovah is good");

    // The commit must be the raw MT output, not the post-processed emission
    assert_eq!(p.last_full_translation(), "the Lord is good");

    // So the next LCP still matches against what MT actually produces
    let emitted = p.process(
        "the Lord is good to all his people",
        "cu tot poporul său",
        "Iehova este bun cu tot poporul său",
        "en",
    );
    assert_eq!(emitted, "to all his people");
}

#[test]
fn test_diverged_translation_emits_full_output() {
    let mut p = pipeline();
    p.process("we went to the city", "x", "x", "en");

    let emitted = p.process(
        "a wholly different sentence shape came back",
        "y",
        "y",
        "en",
    );
    assert_eq!(emitted, "a wholly different sentence shape came back");
    assert_eq!(
        p.last_full_translation(),
        "a wholly different sentence shape came back"
    );
}

#[test]
fn test_multi_group_thousands_left_to_mt() {
    let mut p = pipeline();
    let emitted = p.process(
        "it was the year 1,234,567",
        "era anul 1.234.567",
        "era anul 1.234.567",
        "en",
    );
    assert_eq!(emitted, "it was the year 1,234,567");
}

#[test]
fn test_matching_digit_counts_pass_through() {
    let mut p = pipeline();
    let emitted = p.process(
        "chapter 14 verse 3",
        "capitolul 14 versetul 3",
        "capitolul 14 versetul 3",
        "en",
    );
    assert_eq!(emitted, "chapter 14 verse 3");
}

#[test]
fn test_spelled_out_numbers_resubstituted() {
    let mut p = pipeline();
    let emitted = p.process(
        "chapter fourteen verse three",
        "capitolul 14 versetul 3",
        "capitolul 14 versetul 3",
        "en",
    );
    assert_eq!(emitted, "chapter 14 verse 3");
}

#[test]
fn test_no_duplicate_translations_within_window() {
    let mut rules = RulesEngine::new(ModeConfig::talks());
    let mut p = pipeline();

    let first = p.process("we sang together", "am cântat împreună", "am cântat împreună", "en");
    assert!(!rules.is_duplicate_translation(&first));
    rules.record_translation(&first);

    // A re-translation of effectively the same content is suppressed
    p.reset_committed();
    let second = p.process("We sang together", "am cântat împreună", "am cântat împreună", "en");
    assert!(rules.is_duplicate_translation(&second));
}

#[test]
fn test_suppressed_duplicate_still_commits() {
    let mut rules = RulesEngine::new(ModeConfig::talks());
    let mut p = pipeline();

    let first = p.process("we sang together", "x", "x", "en");
    rules.record_translation(&first);

    p.reset_committed();
    let second = p.process("We sang together", "x", "x", "en");
    assert!(rules.is_duplicate_translation(&second));
    // Commit still advanced to the raw MT output
    assert_eq!(p.last_full_translation(), "We sang together");
}
