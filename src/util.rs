//! Shared text utilities
//!
//! Title normalization, token stemming, whole-word search and short hashes,
//! used by the normalizers, the orchestrator and the deduplicator.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Words ignored when comparing titles
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "its", "of", "on", "or", "that", "the", "this", "to", "with",
];

/// Suffixes stripped in order, at most once each
const SUFFIXES: &[&str] = &["ly", "ful", "ness", "ing", "ed", "es", "s"];

/// Minimum token length for prefix matching
const MIN_PREFIX_LEN: usize = 3;

/// Lowercase, strip punctuation, collapse whitespace
///
/// # Examples
/// ```
/// use tcgen::util::normalize_title;
/// assert_eq!(normalize_title("  User  logs-in, successfully! "), "user logs in successfully");
/// ```
pub fn normalize_title(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Crude suffix stemmer: `successfully` → `success`, `logs` → `log`
pub fn stem(word: &str) -> String {
    let mut w = word.to_string();
    for suffix in SUFFIXES {
        if w.len() > suffix.len() + 2 && w.ends_with(suffix) {
            // "success", "pass": keep the double s
            if *suffix == "s" && w.ends_with("ss") {
                continue;
            }
            w.truncate(w.len() - suffix.len());
        }
    }
    w
}

/// Stemmed, stop-word-free token set of a title
pub fn title_tokens(title: &str) -> BTreeSet<String> {
    normalize_title(title)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(stem)
        .collect()
}

fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= MIN_PREFIX_LEN && long.starts_with(short)
}

/// Token-overlap similarity of two titles, in `[0, 1]`
///
/// Soft Jaccard: tokens match when equal or when one is a prefix of the
/// other. `m` is the smaller of the two directional match counts so the
/// measure is symmetric; the score is `m / (|A| + |B| - m)`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let ta = title_tokens(a);
    let tb = title_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return if normalize_title(a) == normalize_title(b) {
            1.0
        } else {
            0.0
        };
    }
    let a_to_b = ta
        .iter()
        .filter(|x| tb.iter().any(|y| tokens_match(x, y)))
        .count();
    let b_to_a = tb
        .iter()
        .filter(|y| ta.iter().any(|x| tokens_match(x, y)))
        .count();
    let m = a_to_b.min(b_to_a) as f64;
    m / (ta.len() as f64 + tb.len() as f64 - m)
}

/// Whether `needle` occurs in `haystack` delimited by non-alphanumeric
/// characters. Case-insensitive.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    let bytes = hay.as_bytes();
    let mut start = 0;
    while let Some(pos) = hay[start..].find(&needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = begin + needle.len().max(1);
        if start >= hay.len() {
            break;
        }
        while !hay.is_char_boundary(start) {
            start += 1;
        }
    }
    false
}

/// Lowercase id-safe slug: `Login Button` → `login-button`
pub fn slugify(s: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// First 16 hex characters of the SHA-256 of `input`
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}
