//! Fuzzy option matching for `Select` fields.

use crate::field::OptionSpec;
use tracing::debug;

/// Minimum score an option needs before it is accepted.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.3;

const ORDINALS: [(&str, usize); 20] = [
    ("first", 1),
    ("1st", 1),
    ("second", 2),
    ("2nd", 2),
    ("third", 3),
    ("3rd", 3),
    ("fourth", 4),
    ("4th", 4),
    ("fifth", 5),
    ("5th", 5),
    ("sixth", 6),
    ("6th", 6),
    ("seventh", 7),
    ("7th", 7),
    ("eighth", 8),
    ("8th", 8),
    ("ninth", 9),
    ("9th", 9),
    ("tenth", 10),
    ("10th", 10),
];

/// Similarity of a search term and a transcript, both already lower-cased.
pub fn similarity(term: &str, transcript: &str) -> f32 {
    if term.is_empty() || transcript.is_empty() {
        return 0.0;
    }
    if term == transcript {
        return 1.0;
    }
    if contains_word(term, transcript) {
        return 0.8;
    }
    if term.contains(transcript) || transcript.contains(term) {
        let (a, b) = (term.chars().count(), transcript.chars().count());
        return a.min(b) as f32 / a.max(b) as f32;
    }
    0.0
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

/// 1-based position shortcut: `"2"` picks the second option.
fn numeric_position(transcript: &str, len: usize) -> Option<usize> {
    let n: usize = transcript.parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Best option for `transcript`, or `None` when nothing scores above `threshold`.
///
/// The option label is scored alongside its search terms. Ties keep the
/// earliest option.
pub fn best_match<'a>(
    transcript: &str,
    options: &'a [OptionSpec],
    threshold: f32,
) -> Option<&'a OptionSpec> {
    let spoken = normalize(transcript);
    if spoken.is_empty() {
        return None;
    }
    if let Some(index) = numeric_position(&spoken, options.len()) {
        debug!(index, "option chosen by position");
        return options.get(index);
    }

    let mut best: Option<(&OptionSpec, f32)> = None;
    for option in options {
        let terms = std::iter::once(&option.label).chain(option.search_terms.iter());
        for term in terms {
            let score = similarity(&term.trim().to_lowercase(), &spoken);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((option, score));
            }
        }
    }

    match best {
        Some((option, score)) if score > threshold => {
            debug!(label = %option.label, score, "fuzzy option match");
            Some(option)
        }
        _ => None,
    }
}

/// Option picked by an ordinal word anywhere in the transcript ("second account").
pub fn ordinal_match<'a>(transcript: &str, options: &'a [OptionSpec]) -> Option<&'a OptionSpec> {
    let spoken = normalize(transcript);
    let position = spoken
        .split_whitespace()
        .find_map(|word| ORDINALS.iter().find(|(w, _)| *w == word).map(|(_, n)| *n))
        .or_else(|| spoken.split_whitespace().any(|w| w == "last").then_some(options.len()))?;
    options.get(position.checked_sub(1)?)
}

pub(crate) fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ','))
        .trim()
        .to_lowercase()
}
