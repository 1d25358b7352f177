//! Field extraction engine
//!
//! Turns an enriched record into a type-tagged structured field set plus a
//! list of validation findings. Extraction never fails on malformed input;
//! it always produces a best-effort field set. Only an unknown record type
//! is fatal, and that is caught earlier when the type tag is parsed.

pub mod bug;
pub mod format;
pub mod story;
pub mod task;

use crate::record::{EnrichedRecord, RecordType};
use serde::Serialize;

pub use bug::{BugCategory, BugFields, BugSeverity};
pub use format::{parse_block, ParsedBlock, TextFormat};
pub use story::StoryFields;
pub use task::TaskFields;

/// Severity of a validation finding. Only `Error` blocks prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingSeverity {
    Error,
    Warning,
    Info,
}

/// A single field-level validation result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFinding {
    pub field: String,
    pub severity: FindingSeverity,
    pub message: String,
}

impl ValidationFinding {
    pub fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: FindingSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: FindingSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn info(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: FindingSeverity::Info,
            message: message.into(),
        }
    }
}

/// True if any finding is a blocking error
pub fn has_errors(findings: &[ValidationFinding]) -> bool {
    findings
        .iter()
        .any(|f| f.severity == FindingSeverity::Error)
}

/// Derived priority bucket used to annotate generation instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Immediate,
}

impl Urgency {
    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Immediate => "immediate",
        }
    }
}

/// Combine numeric priority (1 = highest, clamped to 1..=4) and an optional
/// severity into a tier and urgency. The mapping is total: every input pair
/// lands on exactly one bucket. `Immediate` is reserved for the highest
/// combined pairing (Critical severity at priority 1).
pub fn tier_for(priority: u8, severity: Option<BugSeverity>) -> (Tier, Urgency) {
    let priority = priority.clamp(1, 4);
    let severity_score: u8 = match severity {
        Some(BugSeverity::Critical) => 4,
        Some(BugSeverity::High) => 3,
        // An absent severity is treated as the tracker's default, Medium
        Some(BugSeverity::Medium) | None => 2,
        Some(BugSeverity::Low) => 1,
    };

    if matches!(severity, Some(BugSeverity::Critical)) && priority == 1 {
        return (Tier::High, Urgency::Immediate);
    }

    // Range 2..=8: higher means more pressing
    let combined = severity_score + (5 - priority);
    let urgency = match combined {
        6..=8 => Urgency::High,
        4..=5 => Urgency::Medium,
        _ => Urgency::Low,
    };
    let tier = match urgency {
        Urgency::Immediate | Urgency::High => Tier::High,
        Urgency::Medium => Tier::Medium,
        Urgency::Low => Tier::Low,
    };
    (tier, urgency)
}

/// Fixed component vocabulary for keyword tagging. Iteration order doubles
/// as output order, keeping the tag set deterministic.
const COMPONENT_VOCABULARY: &[&str] = &[
    "api",
    "ui",
    "database",
    "service",
    "auth",
    "frontend",
    "backend",
    "cache",
    "network",
    "security",
    "performance",
];

/// Keyword-match component tags across a text blob. No matches is a valid
/// empty set, never an error.
pub fn component_tags(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    COMPONENT_VOCABULARY
        .iter()
        .filter(|word| {
            lowered
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == **word)
        })
        .map(|word| word.to_string())
        .collect()
}

/// The type-tagged structured field set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExtractedFields {
    Story(StoryFields),
    Bug(BugFields),
    Task(TaskFields),
}

impl ExtractedFields {
    pub fn id(&self) -> u64 {
        match self {
            ExtractedFields::Story(f) => f.id,
            ExtractedFields::Bug(f) => f.id,
            ExtractedFields::Task(f) => f.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ExtractedFields::Story(f) => &f.title,
            ExtractedFields::Bug(f) => &f.title,
            ExtractedFields::Task(f) => &f.title,
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            ExtractedFields::Story(_) => RecordType::UserStory,
            ExtractedFields::Bug(_) => RecordType::Bug,
            ExtractedFields::Task(_) => RecordType::Task,
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            ExtractedFields::Story(f) => f.tier,
            ExtractedFields::Bug(f) => f.tier,
            ExtractedFields::Task(f) => f.tier,
        }
    }

    pub fn urgency(&self) -> Urgency {
        match self {
            ExtractedFields::Story(f) => f.urgency,
            ExtractedFields::Bug(f) => f.urgency,
            ExtractedFields::Task(f) => f.urgency,
        }
    }
}

/// Validation applied before any type-specific extraction
fn common_validation(record: &EnrichedRecord) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    if record.title.trim().is_empty() {
        findings.push(ValidationFinding::error("title", "Title must not be empty"));
    }

    match record.description.as_deref() {
        None => findings.push(ValidationFinding::warning(
            "description",
            "Description is missing; generation will proceed with low confidence",
        )),
        Some(d) if d.trim().is_empty() => findings.push(ValidationFinding::warning(
            "description",
            "Description is empty; generation will proceed with low confidence",
        )),
        Some(_) => {}
    }

    if record.area_path.trim().is_empty() {
        findings.push(ValidationFinding::error(
            "area_path",
            "Area path must not be empty; no target destination can be derived",
        ));
    }

    findings
}

/// Extract a structured field set from an enriched record.
///
/// Dispatches on the record type to one of the three strategies. The same
/// input always yields the same output: no clock or randomness is consulted.
pub fn extract(record: &EnrichedRecord) -> (ExtractedFields, Vec<ValidationFinding>) {
    let mut findings = common_validation(record);

    let fields = match record.record_type {
        RecordType::UserStory => ExtractedFields::Story(story::extract(record, &mut findings)),
        RecordType::Bug => ExtractedFields::Bug(bug::extract(record, &mut findings)),
        RecordType::Task => ExtractedFields::Task(task::extract(record, &mut findings)),
    };

    (fields, findings)
}
