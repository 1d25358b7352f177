//! Work-item records from the external tracker
//!
//! The tracker hands us a numeric id plus a flat field map with dotted
//! string keys. We read a fixed set of keys and tolerate anything extra.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Field keys the tracker uses. Anything outside this list rides along in
// `custom_fields` untouched.
pub const FIELD_TYPE: &str = "System.WorkItemType";
pub const FIELD_TITLE: &str = "System.Title";
pub const FIELD_DESCRIPTION: &str = "System.Description";
pub const FIELD_AREA_PATH: &str = "System.AreaPath";
pub const FIELD_ITERATION_PATH: &str = "System.IterationPath";
pub const FIELD_STATE: &str = "System.State";
pub const FIELD_TAGS: &str = "System.Tags";
pub const FIELD_PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
pub const FIELD_SEVERITY: &str = "Microsoft.VSTS.Common.Severity";
pub const FIELD_ACCEPTANCE_CRITERIA: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";
pub const FIELD_REPRO_STEPS: &str = "Microsoft.VSTS.TCM.ReproSteps";

/// Record type as reported by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    UserStory,
    Bug,
    Task,
}

impl RecordType {
    /// Parse the tracker's type tag. An unknown tag is the one genuinely
    /// fatal input: there is no strategy to dispatch to.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim() {
            "User Story" | "UserStory" | "Story" => Ok(RecordType::UserStory),
            "Bug" => Ok(RecordType::Bug),
            "Task" => Ok(RecordType::Task),
            other => Err(anyhow!("Unknown work item type: '{}'", other)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordType::UserStory => "User Story",
            RecordType::Bug => "Bug",
            RecordType::Task => "Task",
        }
    }

    /// Prefix used when deriving branch names
    pub fn branch_prefix(&self) -> &'static str {
        match self {
            RecordType::UserStory => "story",
            RecordType::Bug => "bugfix",
            RecordType::Task => "task",
        }
    }
}

/// A record exactly as the tracker returned it
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: u64,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawRecord {
    fn text_field(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
    }
}

/// RawRecord normalized into a fixed shape. Built once per processing run
/// and immutable afterward.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRecord {
    pub id: u64,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub repro_steps: Option<String>,
    pub area_path: String,
    pub iteration_path: String,
    pub state: String,
    pub priority: u8,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, String>,
}

/// Normalize a raw record. Only an unknown type tag fails; every other
/// irregularity surfaces later as a validation finding.
pub fn enrich(raw: &RawRecord) -> Result<EnrichedRecord> {
    let type_tag = raw
        .fields
        .get(FIELD_TYPE)
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let record_type = RecordType::parse(type_tag)?;

    let priority = raw
        .fields
        .get(FIELD_PRIORITY)
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(|p| p.clamp(1, 4) as u8)
        .unwrap_or(2);

    // Tracker encodes tags as a single semicolon-separated string
    let tags: Vec<String> = raw
        .text_field(FIELD_TAGS)
        .map(|raw_tags| {
            raw_tags
                .split(';')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let known = [
        FIELD_TYPE,
        FIELD_TITLE,
        FIELD_DESCRIPTION,
        FIELD_AREA_PATH,
        FIELD_ITERATION_PATH,
        FIELD_STATE,
        FIELD_TAGS,
        FIELD_PRIORITY,
        FIELD_ACCEPTANCE_CRITERIA,
        FIELD_REPRO_STEPS,
    ];
    let mut custom_fields = BTreeMap::new();
    for (key, value) in &raw.fields {
        if known.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = value.as_str() {
            custom_fields.insert(key.clone(), text.to_string());
        } else if value.is_number() || value.is_boolean() {
            custom_fields.insert(key.clone(), value.to_string());
        }
    }

    Ok(EnrichedRecord {
        id: raw.id,
        record_type,
        title: raw.text_field(FIELD_TITLE).unwrap_or_default(),
        description: raw.text_field(FIELD_DESCRIPTION),
        acceptance_criteria: raw.text_field(FIELD_ACCEPTANCE_CRITERIA),
        repro_steps: raw.text_field(FIELD_REPRO_STEPS),
        area_path: raw.text_field(FIELD_AREA_PATH).unwrap_or_default(),
        iteration_path: raw.text_field(FIELD_ITERATION_PATH).unwrap_or_default(),
        state: raw
            .text_field(FIELD_STATE)
            .unwrap_or_else(|| "New".to_string()),
        priority,
        tags,
        custom_fields,
    })
}

impl EnrichedRecord {
    /// The severity custom field, when the tracker supplied one.
    /// Values look like "1 - Critical" or just "High".
    pub fn severity_field(&self) -> Option<&str> {
        self.custom_fields
            .get(FIELD_SEVERITY)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawRecord {
        serde_json::from_value(json!({ "id": 42, "fields": fields })).unwrap()
    }

    #[test]
    fn test_enrich_bug_record() {
        let record = raw(json!({
            "System.WorkItemType": "Bug",
            "System.Title": "Login fails",
            "System.AreaPath": "App\\Auth",
            "System.Tags": "auth; regression",
            "Microsoft.VSTS.Common.Priority": 1,
            "Microsoft.VSTS.TCM.ReproSteps": "1. Open app\n2. Click login",
        }));
        let enriched = enrich(&record).unwrap();
        assert_eq!(enriched.record_type, RecordType::Bug);
        assert_eq!(enriched.title, "Login fails");
        assert_eq!(enriched.priority, 1);
        assert_eq!(enriched.tags, vec!["auth", "regression"]);
        assert!(enriched.repro_steps.is_some());
    }

    #[test]
    fn test_enrich_unknown_type_is_fatal() {
        let record = raw(json!({
            "System.WorkItemType": "Epic",
            "System.Title": "Big thing",
        }));
        assert!(enrich(&record).is_err());
    }

    #[test]
    fn test_enrich_tolerates_extra_fields() {
        let record = raw(json!({
            "System.WorkItemType": "Task",
            "System.Title": "Tidy config",
            "Custom.TeamColor": "blue",
            "System.Watermark": 17,
        }));
        let enriched = enrich(&record).unwrap();
        assert_eq!(
            enriched.custom_fields.get("Custom.TeamColor").map(String::as_str),
            Some("blue")
        );
    }

    #[test]
    fn test_enrich_defaults() {
        let record = raw(json!({ "System.WorkItemType": "User Story" }));
        let enriched = enrich(&record).unwrap();
        assert_eq!(enriched.priority, 2);
        assert!(enriched.title.is_empty());
        assert!(enriched.tags.is_empty());
        assert_eq!(enriched.state, "New");
    }

    #[test]
    fn test_severity_field_lookup() {
        let record = raw(json!({
            "System.WorkItemType": "Bug",
            "System.Title": "Crash",
            "Microsoft.VSTS.Common.Severity": "2 - High",
        }));
        let enriched = enrich(&record).unwrap();
        assert_eq!(enriched.severity_field(), Some("2 - High"));
    }
}
