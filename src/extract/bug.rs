//! Bug extraction strategy
//!
//! Pulls reproduction steps, expected/actual behavior, literal error
//! messages, and component tags out of whatever text the reporter left us.

use super::format::{parse_block, ParsedBlock};
use super::{component_tags, tier_for, Tier, Urgency, ValidationFinding};
use crate::record::EnrichedRecord;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BugSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl BugSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            BugSeverity::Critical => "critical",
            BugSeverity::High => "high",
            BugSeverity::Medium => "medium",
            BugSeverity::Low => "low",
        }
    }
}

/// Parse the tracker's severity field. Values look like "1 - Critical" or
/// plain "High". Anything unrecognized falls back to Medium.
pub fn parse_severity(raw: &str) -> BugSeverity {
    let lowered = raw.to_lowercase();
    if lowered.contains("critical") || lowered.starts_with('1') {
        BugSeverity::Critical
    } else if lowered.contains("high") || lowered.starts_with('2') {
        BugSeverity::High
    } else if lowered.contains("low") || lowered.starts_with('4') {
        BugSeverity::Low
    } else {
        BugSeverity::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BugCategory {
    Functional,
    Ui,
    Data,
    Integration,
}

impl BugCategory {
    pub fn label(&self) -> &'static str {
        match self {
            BugCategory::Functional => "functional",
            BugCategory::Ui => "ui",
            BugCategory::Data => "data",
            BugCategory::Integration => "integration",
        }
    }
}

/// Structured fields derived from a bug report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BugFields {
    pub id: u64,
    pub title: String,
    pub repro_steps: Option<ParsedBlock>,
    /// What the reporter says should happen
    pub expected: Option<String>,
    /// What actually happens
    pub actual: Option<String>,
    /// Literal "Error:"/"Exception:" messages found in the description
    pub error_messages: Vec<String>,
    pub components: Vec<String>,
    pub severity: BugSeverity,
    pub category: BugCategory,
    pub tier: Tier,
    pub urgency: Urgency,
}

fn error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^.*?\b(?:error|exception):\s*(.+)$").unwrap())
}

fn expected_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^(?:expected:?\s*(.+)|.*?\bshould\s+(.+))$").unwrap()
    })
}

fn actual_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^(?:actual:?\s*(.+)|.*?\b(?:currently|instead)\b\s*,?\s*(.+))$").unwrap()
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().trim().trim_end_matches('.').to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Infer a coarse bug category from the component tags, defaulting to
/// functional when nothing narrower matches.
fn categorize(components: &[String]) -> BugCategory {
    let has = |name: &str| components.iter().any(|c| c == name);
    if has("ui") || has("frontend") {
        BugCategory::Ui
    } else if has("database") || has("cache") {
        BugCategory::Data
    } else if has("api") || has("service") || has("network") {
        BugCategory::Integration
    } else {
        BugCategory::Functional
    }
}

pub(super) fn extract(record: &EnrichedRecord, findings: &mut Vec<ValidationFinding>) -> BugFields {
    let repro_steps = record
        .repro_steps
        .as_deref()
        .map(parse_block)
        .filter(|block| !block.is_empty());
    if repro_steps.is_none() {
        findings.push(ValidationFinding::warning(
            "repro_steps",
            "No reproduction steps supplied; the fix cannot be verified against them",
        ));
    }

    let description = record.description.as_deref().unwrap_or_default();

    let error_messages: Vec<String> = error_re()
        .captures_iter(description)
        .map(|caps| caps[1].trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    let expected = first_capture(expected_re(), description);
    let actual = first_capture(actual_re(), description);
    if expected.is_none() && actual.is_none() {
        findings.push(ValidationFinding::info(
            "behavior",
            "No expected/actual behavior phrasing found in description",
        ));
    }

    let severity = record
        .severity_field()
        .map(parse_severity)
        .unwrap_or(BugSeverity::Medium);

    let searchable = format!("{} {}", record.title, description);
    let components = component_tags(&searchable);
    let category = categorize(&components);

    let (tier, urgency) = tier_for(record.priority, Some(severity));

    BugFields {
        id: record.id,
        title: record.title.clone(),
        repro_steps,
        expected,
        actual,
        error_messages,
        components,
        severity,
        category,
        tier,
        urgency,
    }
}
