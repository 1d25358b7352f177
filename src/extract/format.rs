//! Format detection for free-text blocks
//!
//! Acceptance criteria and reproduction steps arrive in whatever shape the
//! author typed. Detection is first-match-wins in a fixed order:
//! Given/When/Then clauses, then numbered lists, then bullet lists, then
//! free text. Text matching an earlier pattern is never re-classified, so
//! a block mixing clause lines and bullets always reports as clause-style.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextFormat {
    GivenWhenThen,
    Numbered,
    BulletPoints,
    FreeText,
}

impl TextFormat {
    pub fn label(&self) -> &'static str {
        match self {
            TextFormat::GivenWhenThen => "given_when_then",
            TextFormat::Numbered => "numbered",
            TextFormat::BulletPoints => "bullet_points",
            TextFormat::FreeText => "free_text",
        }
    }
}

/// A free-text block classified into a format plus its ordered items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBlock {
    pub format: TextFormat,
    pub items: Vec<String>,
}

impl ParsedBlock {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(given|when|then)\b").unwrap())
}

// "And" continues a clause once one exists, but never triggers the
// classification on its own
fn clause_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(given|when|then|and)\b").unwrap())
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)[.)]\s+(.*\S)").unwrap())
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+(.*\S)").unwrap())
}

/// Classify a text block and split it into ordered items
pub fn parse_block(text: &str) -> ParsedBlock {
    let lines: Vec<&str> = text.lines().collect();

    if lines.iter().any(|l| clause_re().is_match(l)) {
        let items = lines
            .iter()
            .filter(|l| clause_item_re().is_match(l))
            .map(|l| l.trim().to_string())
            .collect();
        return ParsedBlock {
            format: TextFormat::GivenWhenThen,
            items,
        };
    }

    if lines.iter().any(|l| numbered_re().is_match(l)) {
        let items = lines
            .iter()
            .filter_map(|l| numbered_re().captures(l))
            .map(|caps| caps[2].trim().to_string())
            .collect();
        return ParsedBlock {
            format: TextFormat::Numbered,
            items,
        };
    }

    if lines.iter().any(|l| bullet_re().is_match(l)) {
        let items = lines
            .iter()
            .filter_map(|l| bullet_re().captures(l))
            .map(|caps| caps[1].trim().to_string())
            .collect();
        return ParsedBlock {
            format: TextFormat::BulletPoints,
            items,
        };
    }

    ParsedBlock {
        format: TextFormat::FreeText,
        items: split_free_text(text),
    }
}

/// Best-effort item split for unstructured text: paragraphs first, falling
/// back to sentences when everything is one paragraph.
fn split_free_text(text: &str) -> Vec<String> {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(|p| p.trim().replace('\n', " "))
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.len() > 1 {
        return paragraphs;
    }

    let Some(paragraph) = paragraphs.into_iter().next() else {
        return Vec::new();
    };

    paragraph
        .split(". ")
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_given_when_then() {
        let block = parse_block("Given a logged-in user\nWhen they click save\nThen the form persists");
        assert_eq!(block.format, TextFormat::GivenWhenThen);
        assert_eq!(block.items.len(), 3);
    }

    #[test]
    fn test_and_lines_continue_clauses() {
        let block =
            parse_block("Given a logged-in user\nAnd a saved draft\nWhen they click publish\nThen the draft goes live");
        assert_eq!(block.format, TextFormat::GivenWhenThen);
        assert_eq!(block.items.len(), 4);
    }

    #[test]
    fn test_and_alone_is_not_a_clause() {
        let block = parse_block("And that is all we know about the failure");
        assert_eq!(block.format, TextFormat::FreeText);
    }

    #[test]
    fn test_clause_beats_bullets() {
        // Mixed input: clause lines win because detection never re-classifies
        let block = parse_block("Given a user\n- some bullet\nThen it works");
        assert_eq!(block.format, TextFormat::GivenWhenThen);
        assert_eq!(block.items.len(), 2);
    }

    #[test]
    fn test_numbered_beats_bullets() {
        let block = parse_block("1. First step\n- stray bullet\n2. Second step");
        assert_eq!(block.format, TextFormat::Numbered);
        assert_eq!(block.items, vec!["First step", "Second step"]);
    }

    #[test]
    fn test_detects_numbered_with_parenthesis() {
        let block = parse_block("1) Open app\n2) Click login\n3) See crash");
        assert_eq!(block.format, TextFormat::Numbered);
        assert_eq!(block.items.len(), 3);
    }

    #[test]
    fn test_detects_bullets() {
        let block = parse_block("- first\n* second");
        assert_eq!(block.format, TextFormat::BulletPoints);
        assert_eq!(block.items, vec!["first", "second"]);
    }

    #[test]
    fn test_free_text_paragraphs() {
        let block = parse_block("The login page is slow.\n\nIt also flickers on load.");
        assert_eq!(block.format, TextFormat::FreeText);
        assert_eq!(block.items.len(), 2);
    }

    #[test]
    fn test_free_text_sentences() {
        let block = parse_block("The page is slow. It flickers. Users complain.");
        assert_eq!(block.format, TextFormat::FreeText);
        assert_eq!(block.items.len(), 3);
    }

    #[test]
    fn test_empty_text() {
        let block = parse_block("");
        assert_eq!(block.format, TextFormat::FreeText);
        assert!(block.is_empty());
    }
}
