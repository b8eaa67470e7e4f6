//! Post-processing of emitted translations.
//!
//! Applied in order: domain term mappings, religious proper-noun
//! normalization, source-number preservation, date reconstruction, and a
//! single-word fallback for words MT passes through untranslated.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::session::base_language;

/// One ordered case-insensitive pattern -> replacement rule.
///
/// `source_trigger` restricts the rule to outputs whose source transcript
/// contains the given substring (case-insensitive).
#[derive(Debug, Clone)]
pub struct TermMapping {
    pub pattern: Regex,
    pub replacement: String,
    pub source_trigger: Option<String>,
}

impl TermMapping {
    pub fn new(pattern: &str, replacement: &str, source_trigger: Option<&str>) -> Self {
        Self {
            pattern: Regex::new(&format!("(?i){}", pattern)).expect("invalid term mapping"),
            replacement: replacement.to_string(),
            source_trigger: source_trigger.map(|s| s.to_lowercase()),
        }
    }
}

/// The default domain mapping set. Deployments replace this wholesale.
pub fn default_mappings() -> Vec<TermMapping> {
    vec![
        TermMapping::new(r"\bjw broadcasting\b", "JW Broadcasting", None),
        TermMapping::new(r"\bkingdom hall\b", "Kingdom Hall", None),
        TermMapping::new(r"\bthe lord\b", "Jehovah", Some("iehova")),
    ]
}

struct ProperNounRule {
    source_trigger: &'static str,
    variants: Lazy<Regex>,
    canonical: &'static str,
}

/// Variant spellings canonicalized when translating into Romanian and the
/// English trigger appears in the source.
static PROPER_NOUNS_RO: Lazy<Vec<ProperNounRule>> = Lazy::new(|| {
    vec![
        ProperNounRule {
            source_trigger: "jehovah",
            variants: Lazy::new(|| Regex::new(r"(?i)\b(?:Yehova|Jehova|Iehovah)\b").unwrap()),
            canonical: "Iehova",
        },
        ProperNounRule {
            source_trigger: "jesus",
            variants: Lazy::new(|| Regex::new(r"(?i)\bIisus\b").unwrap()),
            canonical: "Isus",
        },
    ]
});

/// Apply the full post-processing chain to an emitted translation.
pub fn apply(
    emitted: &str,
    source_new_text: &str,
    source_full_text: &str,
    target_lang: &str,
    mappings: &[TermMapping],
) -> String {
    let mut out = emitted.to_string();
    let source_lower = source_full_text.to_lowercase();

    for mapping in mappings {
        if let Some(trigger) = &mapping.source_trigger {
            if !source_lower.contains(trigger) {
                continue;
            }
        }
        out = mapping
            .pattern
            .replace_all(&out, mapping.replacement.as_str())
            .into_owned();
    }

    if base_language(target_lang) == "ro" {
        for rule in PROPER_NOUNS_RO.iter() {
            if source_lower.contains(rule.source_trigger) {
                out = rule.variants.replace_all(&out, rule.canonical).into_owned();
            }
        }
    }

    out = preserve_numbers(&out, source_new_text);
    out = preserve_dates(&out, source_new_text, target_lang);
    out = single_word_fallback(&out, source_new_text, target_lang);
    out
}

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());
static GROUPED_THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").unwrap());

#[derive(Debug, Clone)]
struct NumToken {
    start: usize,
    end: usize,
    text: String,
}

fn scan_numbers(text: &str) -> Vec<NumToken> {
    NUMERIC_TOKEN
        .find_iter(text)
        .map(|m| NumToken {
            start: m.start(),
            end: m.end(),
            text: m.as_str().to_string(),
        })
        .collect()
}

fn digits_of(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Replace the token ranges in `text` with the given substitutes.
fn splice(text: &str, replacements: &[(usize, usize, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for (start, end, sub) in replacements {
        out.push_str(&text[cursor..*start]);
        out.push_str(sub);
        cursor = *end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Carry numeric tokens from the source chunk into the translation.
///
/// Multi-group thousands (`1.234.567`) are left to MT, which converts the
/// separators correctly. Everything else is substituted positionally when
/// token counts line up; otherwise digit runs and spelled-out number words
/// are matched against the source digits.
fn preserve_numbers(emitted: &str, source_new_text: &str) -> String {
    let source_tokens: Vec<NumToken> = scan_numbers(source_new_text)
        .into_iter()
        .filter(|t| !GROUPED_THOUSANDS.is_match(&t.text))
        .collect();
    if source_tokens.is_empty() {
        return emitted.to_string();
    }

    let output_tokens = scan_numbers(emitted);

    if output_tokens.len() == source_tokens.len() {
        let replacements: Vec<(usize, usize, String)> = output_tokens
            .iter()
            .zip(source_tokens.iter())
            .map(|(out_tok, src_tok)| (out_tok.start, out_tok.end, src_tok.text.clone()))
            .collect();
        return splice(emitted, &replacements);
    }

    // Counts differ: merge contiguous digit runs that spell a source number
    if !output_tokens.is_empty() {
        if let Some(result) = merge_digit_runs(emitted, &output_tokens, &source_tokens) {
            return result;
        }
        return emitted.to_string();
    }

    substitute_number_words(emitted, &source_tokens)
}

fn merge_digit_runs(
    emitted: &str,
    output_tokens: &[NumToken],
    source_tokens: &[NumToken],
) -> Option<String> {
    let mut replacements: Vec<(usize, usize, String)> = Vec::new();
    let mut used = vec![false; output_tokens.len()];

    for src in source_tokens {
        let want = digits_of(&src.text);
        'search: for i in 0..output_tokens.len() {
            if used[i] {
                continue;
            }
            let mut digits = String::new();
            for j in i..output_tokens.len() {
                if used[j] {
                    break;
                }
                digits.push_str(&digits_of(&output_tokens[j].text));
                if digits == want {
                    for slot in used.iter_mut().take(j + 1).skip(i) {
                        *slot = true;
                    }
                    replacements.push((output_tokens[i].start, output_tokens[j].end, src.text.clone()));
                    break 'search;
                }
                if digits.len() >= want.len() {
                    break;
                }
            }
        }
    }

    if replacements.is_empty() {
        return None;
    }
    replacements.sort_by_key(|r| r.0);
    Some(splice(emitted, &replacements))
}

static NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    "hundred", "thousand",
];

static NUMBER_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", NUMBER_WORDS.join("|"))).unwrap()
});

/// Replace spelled-out number words positionally with the source digits.
fn substitute_number_words(emitted: &str, source_tokens: &[NumToken]) -> String {
    let word_matches: Vec<(usize, usize)> = NUMBER_WORD_RE
        .find_iter(emitted)
        .map(|m| (m.start(), m.end()))
        .collect();

    if word_matches.len() != source_tokens.len() {
        return emitted.to_string();
    }

    let replacements: Vec<(usize, usize, String)> = word_matches
        .iter()
        .zip(source_tokens.iter())
        .map(|((start, end), src)| (*start, *end, src.text.clone()))
        .collect();
    splice(emitted, &replacements)
}

static MONTHS_EN: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static MONTHS_RO: &[&str] = &[
    "ianuarie",
    "februarie",
    "martie",
    "aprilie",
    "mai",
    "iunie",
    "iulie",
    "august",
    "septembrie",
    "octombrie",
    "noiembrie",
    "decembrie",
];

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    let months = MONTHS_EN
        .iter()
        .chain(MONTHS_RO.iter())
        .copied()
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({})\s+(\d{{4}})\b", months)).unwrap()
});

fn month_index(name: &str) -> Option<usize> {
    let lower = name.to_lowercase();
    MONTHS_EN
        .iter()
        .position(|m| *m == lower)
        .or_else(|| MONTHS_RO.iter().position(|m| *m == lower))
}

fn month_for_target(index: usize, target_lang: &str) -> &'static str {
    let month = if base_language(target_lang) == "ro" {
        MONTHS_RO[index]
    } else {
        MONTHS_EN[index]
    };
    month
}

fn contains_month_name(text: &str) -> bool {
    let lower = text.to_lowercase();
    MONTHS_EN
        .iter()
        .chain(MONTHS_RO.iter())
        .any(|m| lower.split_whitespace().any(|w| w.trim_matches(',') == *m))
}

/// Reinsert month names MT dropped from `day month year` triples.
fn preserve_dates(emitted: &str, source_new_text: &str, target_lang: &str) -> String {
    let mut out = emitted.to_string();

    for caps in DATE_RE.captures_iter(source_new_text) {
        let day = &caps[1];
        let month = &caps[2];
        let year = &caps[3];

        if contains_month_name(&out) {
            continue;
        }

        let Some(index) = month_index(month) else {
            continue;
        };
        let adjacent = Regex::new(&format!(r"\b{}\s+{}\b", day, year)).unwrap();
        if adjacent.is_match(&out) {
            let injected = format!("{} {} {}", day, month_for_target(index, target_lang), year);
            out = adjacent.replace(&out, injected.as_str()).into_owned();
        }
    }

    out
}

/// Lowercase, decompose, and strip combining marks for equality checks.
fn fold(text: &str) -> String {
    text.trim()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

static SINGLE_WORD_RO_EN: &[(&str, &str)] = &[
    ("pace", "peace"),
    ("bucurie", "joy"),
    ("credinta", "faith"),
    ("adevar", "truth"),
    ("iubire", "love"),
    ("speranta", "hope"),
];

/// If MT returned the source word unchanged, try a small hard-coded map.
fn single_word_fallback(emitted: &str, source_new_text: &str, target_lang: &str) -> String {
    let source = source_new_text.trim();
    if source.split_whitespace().count() != 1 {
        return emitted.to_string();
    }
    if fold(source) != fold(emitted) {
        return emitted.to_string();
    }

    let key = fold(source);
    let mapped = match base_language(target_lang) {
        "en" => SINGLE_WORD_RO_EN
            .iter()
            .find(|(ro, _)| *ro == key)
            .map(|(_, en)| *en),
        "ro" => SINGLE_WORD_RO_EN
            .iter()
            .find(|(_, en)| *en == key)
            .map(|(ro, _)| *ro),
        _ => None,
    };

    match mapped {
        Some(word) => word.to_string(),
        None => emitted.to_string(),
    }
}
