//! User story extraction strategy

use super::format::{parse_block, ParsedBlock, TextFormat};
use super::{component_tags, tier_for, Tier, Urgency, ValidationFinding};
use crate::record::EnrichedRecord;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Structured fields derived from a user story
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryFields {
    pub id: u64,
    pub title: String,
    pub acceptance_criteria: Option<ParsedBlock>,
    /// Actor from an "as a <role>" phrase, when one exists
    pub actor_role: Option<String>,
    /// Value from a "so that <value>" phrase, when one exists
    pub business_value: Option<String>,
    pub tier: Tier,
    pub urgency: Urgency,
    /// Functional requirements derived from the acceptance criteria
    pub requirements: Vec<String>,
    pub components: Vec<String>,
}

fn role_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bas an?\s+([^,.\n]+?)\s*(?:,|\.|\n|$|\s+i\s+want\b)").unwrap()
    })
}

fn value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bso that\s+([^.\n]+)").unwrap())
}

fn capture_first(re: &Regex, texts: &[Option<&str>]) -> Option<String> {
    for text in texts.iter().flatten() {
        if let Some(caps) = re.captures(text) {
            let found = caps[1].trim().to_string();
            if !found.is_empty() {
                return Some(found);
            }
        }
    }
    None
}

pub(super) fn extract(
    record: &EnrichedRecord,
    findings: &mut Vec<ValidationFinding>,
) -> StoryFields {
    let sources = [Some(record.title.as_str()), record.description.as_deref()];

    let actor_role = capture_first(role_re(), &sources);
    if actor_role.is_none() {
        findings.push(ValidationFinding::info(
            "actor_role",
            "No 'as a <role>' phrase found in title or description",
        ));
    }

    let business_value = capture_first(value_re(), &sources);
    if business_value.is_none() {
        findings.push(ValidationFinding::info(
            "business_value",
            "No 'so that <value>' phrase found in title or description",
        ));
    }

    let acceptance_criteria = record
        .acceptance_criteria
        .as_deref()
        .map(parse_block)
        .filter(|block| !block.is_empty());
    if acceptance_criteria.is_none() {
        findings.push(ValidationFinding::warning(
            "acceptance_criteria",
            "No acceptance criteria supplied; generated tests will be best-effort",
        ));
    }

    let requirements = acceptance_criteria
        .as_ref()
        .map(derive_requirements)
        .unwrap_or_default();

    let severity = record.severity_field().map(super::bug::parse_severity);
    let (tier, urgency) = tier_for(record.priority, severity);

    let searchable = format!(
        "{} {}",
        record.title,
        record.description.as_deref().unwrap_or_default()
    );

    StoryFields {
        id: record.id,
        title: record.title.clone(),
        acceptance_criteria,
        actor_role,
        business_value,
        tier,
        urgency,
        requirements,
        components: component_tags(&searchable),
    }
}

/// Turn acceptance-criteria items into a functional-requirement list. For
/// clause-style criteria only the "Then" outcomes become requirements; other
/// formats contribute every item.
fn derive_requirements(block: &ParsedBlock) -> Vec<String> {
    match block.format {
        TextFormat::GivenWhenThen => block
            .items
            .iter()
            .filter(|item| item.to_lowercase().starts_with("then"))
            .cloned()
            .collect(),
        _ => block.items.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::record_from;
    use super::super::{extract as engine_extract, ExtractedFields, FindingSeverity};
    use super::*;
    use serde_json::json;

    fn story(fields: serde_json::Value) -> (StoryFields, Vec<ValidationFinding>) {
        let record = record_from(fields);
        let (extracted, findings) = engine_extract(&record);
        match extracted {
            ExtractedFields::Story(f) => (f, findings),
            other => panic!("expected story fields, got {:?}", other),
        }
    }

    #[test]
    fn test_role_and_value_inference() {
        let (fields, _) = story(json!({
            "System.WorkItemType": "User Story",
            "System.Title": "As a customer, I want to export invoices so that I can file taxes",
            "System.AreaPath": "App\\Billing",
            "System.Description": "Export to CSV.",
        }));
        assert_eq!(fields.actor_role.as_deref(), Some("customer"));
        assert_eq!(fields.business_value.as_deref(), Some("I can file taxes"));
    }

    #[test]
    fn test_missing_role_is_info_not_error() {
        let (fields, findings) = story(json!({
            "System.WorkItemType": "User Story",
            "System.Title": "Export invoices",
            "System.AreaPath": "App\\Billing",
            "System.Description": "Some text.",
        }));
        assert!(fields.actor_role.is_none());
        assert!(findings
            .iter()
            .any(|f| f.field == "actor_role" && f.severity == FindingSeverity::Info));
        assert!(!super::super::has_errors(&findings));
    }

    #[test]
    fn test_requirements_from_then_clauses() {
        let (fields, _) = story(json!({
            "System.WorkItemType": "User Story",
            "System.Title": "As a user I want search",
            "System.AreaPath": "App",
            "System.Description": "Search things.",
            "Microsoft.VSTS.Common.AcceptanceCriteria":
                "Given a query\nWhen the user hits enter\nThen results appear\nThen the query is logged",
        }));
        assert_eq!(fields.requirements.len(), 2);
        assert!(fields.requirements[0].starts_with("Then results"));
    }

    #[test]
    fn test_requirements_from_bullets() {
        let (fields, _) = story(json!({
            "System.WorkItemType": "User Story",
            "System.Title": "As a user I want filters",
            "System.AreaPath": "App",
            "System.Description": "Filters.",
            "Microsoft.VSTS.Common.AcceptanceCriteria": "- filter by date\n- filter by owner",
        }));
        assert_eq!(fields.acceptance_criteria.as_ref().unwrap().format, TextFormat::BulletPoints);
        assert_eq!(fields.requirements, vec!["filter by date", "filter by owner"]);
    }

    #[test]
    fn test_component_tags_from_title_and_description() {
        let (fields, _) = story(json!({
            "System.WorkItemType": "User Story",
            "System.Title": "As an admin I want an API token page",
            "System.AreaPath": "App",
            "System.Description": "Tokens are stored in the database.",
        }));
        assert_eq!(fields.components, vec!["api", "database"]);
    }
}
