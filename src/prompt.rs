//! Generation prompt assembly
//!
//! Combines the enriched record, the extracted field set, the repository's
//! type-filtered templates, and coding standards into a single immutable
//! prompt. Assembly is pure - no network, no filesystem.

use crate::config::{CodingStandards, PromptTemplate, RepoConfig};
use crate::extract::ExtractedFields;
use crate::record::{EnrichedRecord, RecordType};

/// System prompt sent with every generation request. The JSON shape at the
/// end is the contract the artifact parser validates against.
pub const GENERATION_SYSTEM: &str = r#"You are a senior developer implementing a work item. You receive the item's structured details and repository conventions; produce complete, working code.

RULES:
- Implement exactly what the work item asks for, nothing speculative
- Every source file must be complete and compilable, never a fragment
- Include tests for the behavior you add or fix
- Use relative paths from the repository root
- Respect the coding standards and preferred dependencies you are given

OUTPUT FORMAT (reply with ONLY this JSON, inside a ```json fence):
{
  "files": [
    {
      "path": "src/example.rs",
      "content": "full file content",
      "language": "rust",
      "type": "source"
    }
  ],
  "tests": [
    {
      "path": "tests/example_test.rs",
      "content": "full file content",
      "language": "rust",
      "type": "test"
    }
  ],
  "documentation": "short description of the change",
  "dependencies": ["crate-or-package-names"],
  "build_instructions": "how to build and run the tests"
}"#;

/// Baseline guidance present in every prompt regardless of record type
const BASELINE_REQUIREMENTS: &[&str] = &[
    "Keep changes minimal and focused on the work item",
    "Handle error paths explicitly; no silent failures",
    "Match the existing code style of the repository",
];

/// Immutable value combining everything the generation collaborator needs.
/// Built fresh per record and never mutated afterward.
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub record: EnrichedRecord,
    pub fields: ExtractedFields,
    /// Templates applicable to this record's type (may be empty)
    pub templates: Vec<PromptTemplate>,
    pub standards: CodingStandards,
    pub language: String,
    pub requirements: Vec<String>,
    pub patterns: Vec<String>,
    pub dependencies: Vec<String>,
    pub style_notes: Vec<String>,
}

fn template_applies(template: &PromptTemplate, record_type: RecordType) -> bool {
    template
        .applies_to
        .iter()
        .any(|t| RecordType::parse(t).map(|rt| rt == record_type).unwrap_or(false))
}

/// Type-specific guidance derived from the extracted fields
fn type_guidance(fields: &ExtractedFields) -> Vec<String> {
    match fields {
        ExtractedFields::Story(story) => {
            let mut guidance = vec![format!(
                "Implement the user story end to end ({} priority, {} urgency)",
                story.tier.label(),
                story.urgency.label()
            )];
            if let Some(role) = &story.actor_role {
                guidance.push(format!("Design the interface for the '{}' role", role));
            }
            if let Some(value) = &story.business_value {
                guidance.push(format!("The change exists so that {}", value));
            }
            guidance.extend(story.requirements.iter().cloned());
            guidance
        }
        ExtractedFields::Bug(bug) => {
            let mut guidance = vec![format!(
                "Fix the root cause, not the symptom, and include a regression test ({} severity, {} category)",
                bug.severity.label(),
                bug.category.label()
            )];
            if let (Some(expected), Some(actual)) = (&bug.expected, &bug.actual) {
                guidance.push(format!("Expected: {}. Actual: {}", expected, actual));
            }
            for message in &bug.error_messages {
                guidance.push(format!("Observed error: {}", message));
            }
            guidance
        }
        ExtractedFields::Task(task) => {
            let mut guidance = vec![format!(
                "Complete the task as specified ({} priority)",
                task.tier.label()
            )];
            guidance.extend(task.technical_notes.iter().cloned());
            guidance
        }
    }
}

/// Assemble a generation prompt. Zero applicable templates is a valid
/// result; downstream must tolerate it.
pub fn assemble(
    record: &EnrichedRecord,
    fields: &ExtractedFields,
    repo: &RepoConfig,
) -> GenerationPrompt {
    let templates: Vec<PromptTemplate> = repo
        .templates
        .iter()
        .filter(|t| template_applies(t, record.record_type))
        .cloned()
        .collect();

    let mut requirements: Vec<String> = BASELINE_REQUIREMENTS
        .iter()
        .map(|s| s.to_string())
        .collect();
    requirements.extend(type_guidance(fields));

    GenerationPrompt {
        record: record.clone(),
        fields: fields.clone(),
        templates,
        standards: repo.standards.clone(),
        language: repo.language.clone(),
        requirements,
        patterns: repo.standards.patterns.clone(),
        dependencies: repo.standards.preferred_dependencies.clone(),
        style_notes: repo.standards.style_notes.clone(),
    }
}

impl GenerationPrompt {
    /// Render the user message: titled natural-language sections ending in
    /// the structured-reply instruction.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "WORK ITEM #{} ({})\nTitle: {}\nArea: {}\nIteration: {}\nState: {}\nPriority: {}",
            self.record.id,
            self.record.record_type.label(),
            self.record.title,
            self.record.area_path,
            self.record.iteration_path,
            self.record.state,
            self.record.priority,
        ));

        if let Some(description) = &self.record.description {
            sections.push(format!("DESCRIPTION\n{}", description));
        }

        sections.push(format!("EXTRACTED DETAILS\n{}", self.details_section()));

        if !self.templates.is_empty() {
            let bodies: Vec<String> = self
                .templates
                .iter()
                .map(|t| format!("[{}]\n{}", t.name, t.body))
                .collect();
            sections.push(format!("REPOSITORY TEMPLATES\n{}", bodies.join("\n\n")));
        }

        let mut standards = vec![format!("Target language: {}", self.language)];
        standards.extend(self.style_notes.iter().cloned());
        standards.extend(
            self.patterns
                .iter()
                .map(|p| format!("Preferred pattern: {}", p)),
        );
        standards.extend(
            self.dependencies
                .iter()
                .map(|d| format!("Preferred dependency: {}", d)),
        );
        sections.push(format!(
            "CODING STANDARDS\n{}",
            bullet_list(&standards)
        ));

        sections.push(format!("INSTRUCTIONS\n{}", bullet_list(&self.requirements)));

        sections.push(
            "Reply with ONLY the JSON object described in the system prompt, inside a ```json fence."
                .to_string(),
        );

        sections.join("\n\n")
    }

    fn details_section(&self) -> String {
        let mut lines = Vec::new();
        match &self.fields {
            ExtractedFields::Story(story) => {
                lines.push(format!(
                    "Actor role: {}",
                    story.actor_role.as_deref().unwrap_or("(not stated)")
                ));
                lines.push(format!(
                    "Business value: {}",
                    story.business_value.as_deref().unwrap_or("(not stated)")
                ));
                if let Some(criteria) = &story.acceptance_criteria {
                    lines.push(format!(
                        "Acceptance criteria ({}):",
                        criteria.format.label()
                    ));
                    lines.extend(criteria.items.iter().map(|i| format!("  - {}", i)));
                }
                if !story.components.is_empty() {
                    lines.push(format!("Components: {}", story.components.join(", ")));
                }
            }
            ExtractedFields::Bug(bug) => {
                lines.push(format!("Severity: {}", bug.severity.label()));
                lines.push(format!("Category: {}", bug.category.label()));
                lines.push(format!("Urgency: {}", bug.urgency.label()));
                if let Some(steps) = &bug.repro_steps {
                    lines.push(format!("Reproduction steps ({}):", steps.format.label()));
                    lines.extend(
                        steps
                            .items
                            .iter()
                            .enumerate()
                            .map(|(i, s)| format!("  {}. {}", i + 1, s)),
                    );
                }
                if let Some(expected) = &bug.expected {
                    lines.push(format!("Expected: {}", expected));
                }
                if let Some(actual) = &bug.actual {
                    lines.push(format!("Actual: {}", actual));
                }
                if !bug.components.is_empty() {
                    lines.push(format!("Components: {}", bug.components.join(", ")));
                }
            }
            ExtractedFields::Task(task) => {
                if let Some(steps) = &task.steps {
                    lines.push(format!("Steps ({}):", steps.format.label()));
                    lines.extend(
                        steps
                            .items
                            .iter()
                            .enumerate()
                            .map(|(i, s)| format!("  {}. {}", i + 1, s)),
                    );
                }
                if !task.technical_notes.is_empty() {
                    lines.push("Technical notes:".to_string());
                    lines.extend(task.technical_notes.iter().map(|n| format!("  - {}", n)));
                }
                if !task.components.is_empty() {
                    lines.push(format!("Components: {}", task.components.join(", ")));
                }
            }
        }
        lines.join("\n")
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}
