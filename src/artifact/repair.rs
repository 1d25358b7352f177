//! Repair-path parsing
//!
//! When a generated file fails review, the collaborator is asked to send a
//! corrected version of that single file. The reply is either one fenced
//! code block or bare code; we take what we get and score how far it
//! drifted from the original. A low score is a warning, not an error -
//! callers decide whether a too-different "fix" is worth keeping.

use regex::Regex;
use std::sync::OnceLock;

/// Similarity below this threshold flags the fix as suspiciously different
const SIMILARITY_WARN_THRESHOLD: f64 = 0.5;

/// A corrected file extracted from a repair reply
#[derive(Debug, Clone)]
pub struct RepairedCode {
    pub content: String,
    /// Normalized edit-distance similarity against the original, 0.0..=1.0
    pub similarity: f64,
    pub warnings: Vec<String>,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z0-9+#-]*\s*\n(.*?)```").unwrap())
}

/// Parse a fixed-code reply: the first fenced block, or the raw text when
/// the collaborator skipped the fence.
pub fn parse_fixed_code(raw: &str, original: &str) -> RepairedCode {
    let content = fence_re()
        .captures(raw)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| raw.trim().to_string());

    let similarity = normalized_similarity(original, &content);

    let mut warnings = Vec::new();
    if content.trim().is_empty() {
        warnings.push("fixed code is empty".to_string());
    }
    if similarity < SIMILARITY_WARN_THRESHOLD {
        warnings.push(format!(
            "fixed code differs substantially from the original (similarity {:.2})",
            similarity
        ));
    }

    RepairedCode {
        content,
        similarity,
        warnings,
    }
}

/// Case- and whitespace-insensitive similarity: 1.0 minus the Levenshtein
/// distance over the longer normalized length.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    let longest = a.chars().count().max(b.chars().count());
    1.0 - distance as f64 / longest as f64
}

/// Lowercase and collapse every whitespace run to a single space
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two-row Levenshtein over chars
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
