//! Word-level longest-common-prefix extraction.
//!
//! After a full-context translation, only the words beyond the previously
//! committed translation should reach the client. Matching is done on
//! normalized tokens; the emitted tail keeps original casing and punctuation.

use crate::rules::text::normalize_word;

/// Result of comparing a fresh full translation against the committed one.
#[derive(Debug, Clone, PartialEq)]
pub enum LcpOutcome {
    /// The committed prefix matched; emit only the trailing words.
    Tail(String),
    /// The prefix diverged below the threshold; emit the full translation.
    Diverged,
}

/// Compare `translated_full` against `committed` word by word.
///
/// `threshold` is the minimum fraction of committed words that must match
/// as a prefix for tail extraction to be trusted.
pub fn extract_tail(committed: &str, translated_full: &str, threshold: f64) -> LcpOutcome {
    let committed_words: Vec<String> = committed
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();

    if committed_words.is_empty() {
        return LcpOutcome::Tail(translated_full.trim().to_string());
    }

    let full_words: Vec<&str> = translated_full.split_whitespace().collect();

    let mut matched = 0usize;
    for (i, word) in full_words.iter().enumerate() {
        if i >= committed_words.len() {
            break;
        }
        if normalize_word(word) == committed_words[i] {
            matched += 1;
        } else {
            break;
        }
    }

    let ratio = matched as f64 / committed_words.len() as f64;
    if ratio < threshold {
        return LcpOutcome::Diverged;
    }

    LcpOutcome::Tail(full_words[matched..].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_committed_emits_full() {
        assert_eq!(
            extract_tail("", "The book of Obadiah is", 0.60),
            LcpOutcome::Tail("The book of Obadiah is".to_string())
        );
    }

    #[test]
    fn test_full_prefix_match_emits_tail() {
        let outcome = extract_tail(
            "The book of Obadiah is",
            "The book of Obadiah is one of the shortest",
            0.60,
        );
        assert_eq!(outcome, LcpOutcome::Tail("one of the shortest".to_string()));
    }

    #[test]
    fn test_matching_is_case_and_punctuation_insensitive() {
        let outcome = extract_tail(
            "the book, of obadiah is",
            "The book of Obadiah is one of the shortest,",
            0.60,
        );
        assert_eq!(
            outcome,
            LcpOutcome::Tail("one of the shortest,".to_string())
        );
    }

    #[test]
    fn test_divergence_below_threshold() {
        let outcome = extract_tail(
            "the quick brown fox jumps high",
            "a completely different rendering of the idea",
            0.60,
        );
        assert_eq!(outcome, LcpOutcome::Diverged);
    }

    #[test]
    fn test_partial_match_above_threshold() {
        // 4 of 5 committed words match: ratio 0.8
        let outcome = extract_tail(
            "we saw the old city",
            "we saw the old town again today",
            0.60,
        );
        assert_eq!(outcome, LcpOutcome::Tail("town again today".to_string()));
    }

    #[test]
    fn test_identical_translation_yields_empty_tail() {
        let outcome = extract_tail("exactly the same words", "Exactly the same words", 0.60);
        assert_eq!(outcome, LcpOutcome::Tail(String::new()));
    }
}
