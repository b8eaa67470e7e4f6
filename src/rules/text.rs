//! Text utilities shared by the decision layer and the pipeline.

use std::collections::HashMap;

/// Language-neutral filler tokens removed before the filler-only check.
/// Romanian entries cover the hesitation words common in live speech.
const FILLER_WORDS: &[&str] = &[
    "uh", "um", "ah", "hmm", "eh", "er", "like", "ă", "e", "ei", "păi", "deci", "adică",
];

/// Punctuation stripped from word edges during normalization.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '„', '”', '«', '»', '…',
];

/// Words are maximal non-whitespace runs.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Last `max_chars` characters of `text`, on a char boundary.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Whether the trimmed text ends a sentence.
///
/// An ellipsis (two or more trailing dots) is not a sentence ending.
pub fn is_sentence_ending(text: &str) -> bool {
    let trimmed = text.trim_end();
    let mut chars = trimmed.chars().rev();
    match chars.next() {
        Some('.') => chars.next() != Some('.'),
        Some('!') | Some('?') | Some('。') | Some('！') | Some('？') => true,
        _ => false,
    }
}

/// Whether the text contains only filler words.
///
/// Each token is lowercased and stripped of trailing punctuation before the
/// comparison; the two-token filler "you know" is removed as a pair.
pub fn is_filler_only(text: &str) -> bool {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_end_matches(['.', ',', '!', '?', ';', ':'])
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    if tokens.is_empty() {
        return false;
    }

    let mut remaining = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "you" && tokens.get(i + 1).map(String::as_str) == Some("know") {
            i += 2;
            continue;
        }
        if !FILLER_WORDS.contains(&tokens[i].as_str()) {
            remaining += 1;
        }
        i += 1;
    }
    remaining == 0
}

/// Lowercase a word and strip leading/trailing punctuation.
pub fn normalize_word(word: &str) -> String {
    word.trim_matches(EDGE_PUNCTUATION).to_lowercase()
}

/// Word-multiset overlap between two texts in `[0, 1]`.
///
/// Repeated words count once per shared occurrence, so
/// `overlap("the the the cat", "the cat")` is `2 / 4 = 0.5`.
pub fn multiset_overlap(a: &str, b: &str) -> f64 {
    let count = |s: &str| -> (HashMap<String, usize>, usize) {
        let mut map = HashMap::new();
        let mut total = 0usize;
        for word in s.split_whitespace() {
            let w = normalize_word(word);
            if w.is_empty() {
                continue;
            }
            *map.entry(w).or_insert(0) += 1;
            total += 1;
        }
        (map, total)
    };

    let (map_a, total_a) = count(a);
    let (map_b, total_b) = count(b);
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    let shared: usize = map_a
        .iter()
        .map(|(w, n)| n.min(map_b.get(w).unwrap_or(&0)))
        .sum();

    shared as f64 / total_a.max(total_b) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  bun   venit  "), 2);
        assert_eq!(word_count("one"), 1);
    }

    #[test]
    fn test_sentence_ending() {
        assert!(is_sentence_ending("a."));
        assert!(!is_sentence_ending("a.."));
        assert!(!is_sentence_ending("a..."));
        assert!(is_sentence_ending("a.   "));
        assert!(is_sentence_ending("gata!"));
        assert!(is_sentence_ending("ce faci?"));
        assert!(is_sentence_ending("终わり。"));
        assert!(!is_sentence_ending("still going"));
        assert!(!is_sentence_ending(""));
    }

    #[test]
    fn test_filler_only() {
        assert!(is_filler_only("uh um, ah"));
        assert!(is_filler_only("păi deci adică"));
        assert!(is_filler_only("you know, like, um"));
        assert!(!is_filler_only("um hello there"));
        assert!(!is_filler_only(""));
    }

    #[test]
    fn test_multiset_overlap_counts_occurrences() {
        let overlap = multiset_overlap("the the the cat", "the cat");
        assert!((overlap - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_multiset_overlap_identical() {
        assert!((multiset_overlap("bun venit", "Bun venit!") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("ăîșț", 2), "șț");
    }
}
