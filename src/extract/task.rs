//! Task extraction strategy

use super::format::{parse_block, ParsedBlock};
use super::{component_tags, tier_for, Tier, Urgency, ValidationFinding};
use crate::record::EnrichedRecord;
use serde::Serialize;

/// Vocabulary marking a line as a technical note rather than prose
const TECHNICAL_MARKERS: &[&str] = &[
    "refactor",
    "migrate",
    "migration",
    "config",
    "configuration",
    "dependency",
    "dependencies",
    "upgrade",
    "schema",
    "endpoint",
    "test",
    "deploy",
    "index",
    "query",
];

/// Structured fields derived from a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFields {
    pub id: u64,
    pub title: String,
    /// Work steps parsed from the description
    pub steps: Option<ParsedBlock>,
    /// Description lines that read as implementation notes
    pub technical_notes: Vec<String>,
    pub components: Vec<String>,
    pub tier: Tier,
    pub urgency: Urgency,
}

fn is_technical(line: &str) -> bool {
    let lowered = line.to_lowercase();
    TECHNICAL_MARKERS.iter().any(|marker| {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == *marker)
    })
}

pub(super) fn extract(
    record: &EnrichedRecord,
    findings: &mut Vec<ValidationFinding>,
) -> TaskFields {
    let description = record.description.as_deref().unwrap_or_default();

    let steps = Some(parse_block(description)).filter(|block| !block.is_empty());
    if steps.is_none() {
        findings.push(ValidationFinding::warning(
            "steps",
            "No work steps could be derived from the description",
        ));
    }

    let technical_notes: Vec<String> = description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && is_technical(line))
        .map(|line| line.to_string())
        .collect();

    let severity = record.severity_field().map(super::bug::parse_severity);
    let (tier, urgency) = tier_for(record.priority, severity);

    let searchable = format!("{} {}", record.title, description);

    TaskFields {
        id: record.id,
        title: record.title.clone(),
        steps,
        technical_notes,
        components: component_tags(&searchable),
        tier,
        urgency,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::record_from;
    use super::super::{extract as engine_extract, ExtractedFields, TextFormat};
    use super::*;
    use serde_json::json;

    fn task(fields: serde_json::Value) -> (TaskFields, Vec<ValidationFinding>) {
        let record = record_from(fields);
        let (extracted, findings) = engine_extract(&record);
        match extracted {
            ExtractedFields::Task(f) => (f, findings),
            other => panic!("expected task fields, got {:?}", other),
        }
    }

    #[test]
    fn test_numbered_steps() {
        let (fields, _) = task(json!({
            "System.WorkItemType": "Task",
            "System.Title": "Rotate signing keys",
            "System.AreaPath": "App\\Ops",
            "System.Description": "1. Generate new key\n2. Update config\n3. Restart service",
        }));
        let steps = fields.steps.unwrap();
        assert_eq!(steps.format, TextFormat::Numbered);
        assert_eq!(steps.items.len(), 3);
    }

    #[test]
    fn test_technical_notes_filtered() {
        let (fields, _) = task(json!({
            "System.WorkItemType": "Task",
            "System.Title": "Cleanup",
            "System.AreaPath": "App",
            "System.Description":
                "Refactor the session module.\nPlease be nice about it.\nUpdate the schema afterwards.",
        }));
        assert_eq!(fields.technical_notes.len(), 2);
        assert!(fields.technical_notes[0].contains("Refactor"));
    }

    #[test]
    fn test_missing_description_warns() {
        let (fields, findings) = task(json!({
            "System.WorkItemType": "Task",
            "System.Title": "Mystery task",
            "System.AreaPath": "App",
        }));
        assert!(fields.steps.is_none());
        assert!(findings.iter().any(|f| f.field == "steps"));
    }
}
