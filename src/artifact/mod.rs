//! Generated artifact bundle types
//!
//! The generation collaborator replies with free text that should embed a
//! JSON object holding files, tests, documentation, dependencies, and build
//! instructions. These are the validated shapes that object parses into.

pub mod parse;
pub mod repair;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use parse::{parse_response, ParseOptions, ParsedResponse};
pub use repair::{parse_fixed_code, RepairedCode};

/// One generated file. `path`, `content`, `language`, and `kind` come off
/// the wire; `metadata` is derived locally during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    pub language: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip)]
    pub metadata: FileMetadata,
}

/// Derived per-file metadata, never trusted from the wire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub bytes: usize,
    pub lines: usize,
    /// Control-flow keyword count plus one; a rough shape indicator only
    pub complexity: Option<usize>,
    pub dependencies: Vec<String>,
}

/// Bundle-level metadata filled in by the pipeline after a successful parse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<u64>,
}

impl BundleMetadata {
    pub fn is_empty(&self) -> bool {
        self.generated_at.is_none() && self.model.is_none() && self.work_item_id.is_none()
    }
}

/// The validated artifact bundle handed to downstream collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub tests: Vec<GeneratedFile>,
    #[serde(default)]
    pub documentation: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_instructions: String,
    #[serde(default, skip_serializing_if = "BundleMetadata::is_empty")]
    pub metadata: BundleMetadata,
}

impl ArtifactBundle {
    pub fn file_count(&self) -> usize {
        self.files.len() + self.tests.len()
    }

    /// Serialize into the documented fenced-block reply shape. Feeding the
    /// result back through `parse_response` yields an equal bundle.
    pub fn to_fenced_block(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize artifact bundle")?;
        Ok(format!("```json\n{}\n```", json))
    }
}
