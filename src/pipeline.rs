//! Processing pipeline
//!
//! One record runs extract → assemble → invoke → parse as a sequential
//! chain; the only suspension points are the outbound calls inside the
//! retry layer. Pipelines share nothing mutable, so independent records can
//! run side by side without coordination.

use crate::artifact::{parse_response, ArtifactBundle, ParseOptions};
use crate::branch::branch_name;
use crate::config::{Config, RepoConfig};
use crate::extract::{extract, has_errors, ValidationFinding};
use crate::generate::{GenerationClient, Usage};
use crate::prompt::{assemble, GENERATION_SYSTEM};
use crate::record::{enrich, RawRecord};
use crate::retry::InvokeFailure;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Cache of configured generation clients keyed by language+environment.
///
/// Passed by reference into the pipeline; purely advisory. Clearing it is
/// always safe and affects only the cost of rebuilding clients.
#[derive(Debug, Default)]
pub struct ServiceCache {
    entries: Mutex<HashMap<String, Arc<GenerationClient>>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(&self, language: &str, environment: &str, build: F) -> Arc<GenerationClient>
    where
        F: FnOnce() -> GenerationClient,
    {
        let key = format!("{}|{}", language, environment);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key).or_insert_with(|| Arc::new(build())).clone()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Terminal result of processing one record
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The full chain succeeded; the bundle and branch name are ready for
    /// the version-control collaborator
    Completed {
        branch: String,
        bundle: ArtifactBundle,
        findings: Vec<ValidationFinding>,
        warnings: Vec<String>,
        usage: Option<Usage>,
    },
    /// Field-level validation errors blocked prompt assembly
    ValidationBlocked { findings: Vec<ValidationFinding> },
    /// The generation call failed after retries; `failure.attempts` carries
    /// the retry count
    InvocationFailed {
        failure: InvokeFailure,
        findings: Vec<ValidationFinding>,
    },
    /// The reply could not be parsed into a bundle; no partial output is
    /// fabricated
    ParseFailed {
        errors: Vec<String>,
        warnings: Vec<String>,
        findings: Vec<ValidationFinding>,
    },
}

/// The per-record processing pipeline. Holds only shared read-only
/// configuration plus the advisory client cache.
pub struct Pipeline<'a> {
    config: &'a Config,
    repo: &'a RepoConfig,
    cache: &'a ServiceCache,
    options: ParseOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, repo: &'a RepoConfig, cache: &'a ServiceCache) -> Self {
        Self {
            config,
            repo,
            cache,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full chain for one raw record. Only an unknown record type
    /// or missing configuration escapes as an error; every downstream
    /// failure is reported through the outcome.
    pub async fn process(&self, raw: &RawRecord) -> Result<ProcessOutcome> {
        let record = enrich(raw)?;
        info!(
            id = record.id,
            record_type = record.record_type.label(),
            "processing work item"
        );

        let (fields, findings) = extract(&record);
        if has_errors(&findings) {
            warn!(id = record.id, "validation blocked prompt assembly");
            return Ok(ProcessOutcome::ValidationBlocked { findings });
        }

        let prompt = assemble(&record, &fields, self.repo);
        let user_message = prompt.render();

        let endpoint = self
            .config
            .generation_url
            .as_deref()
            .ok_or_else(|| anyhow!("generation endpoint is not configured"))?;
        let api_key = self
            .config
            .generation_api_key()
            .ok_or_else(|| anyhow!("generation API key is not configured"))?;

        let client = self.cache.get_or_create(&self.repo.language, &self.repo.environment, || {
            GenerationClient::new(endpoint, &api_key, self.config.model.as_deref())
        });

        let policy = self.config.retry.policy();
        let reply = match client.generate(GENERATION_SYSTEM, &user_message, &policy).await {
            Ok(reply) => reply,
            Err(failure) => {
                warn!(id = record.id, attempts = failure.attempts, "generation failed");
                return Ok(ProcessOutcome::InvocationFailed { failure, findings });
            }
        };

        let parsed = parse_response(&reply.content, &self.repo.language, &self.options);
        let Some(mut bundle) = parsed.content else {
            return Ok(ProcessOutcome::ParseFailed {
                errors: parsed.errors,
                warnings: parsed.warnings,
                findings,
            });
        };

        bundle.metadata.generated_at = Some(Utc::now());
        bundle.metadata.model = Some(reply.model);
        bundle.metadata.work_item_id = Some(record.id);

        let branch = branch_name(record.record_type, record.id, &record.title);
        info!(
            id = record.id,
            branch = %branch,
            files = bundle.file_count(),
            "work item processed"
        );

        Ok(ProcessOutcome::Completed {
            branch,
            bundle,
            findings,
            warnings: parsed.warnings,
            usage: reply.usage,
        })
    }
}
