//! Configuration management for workforge
//!
//! Two layers: app settings (endpoints, credentials, retry policy) stored in
//! ~/.config/workforge/config.json with environment-variable overrides for
//! secrets, and a repo-local workforge.toml supplying prompt templates and
//! coding standards.

use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per outbound call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Per-attempt deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the work tracker API
    pub tracker_url: Option<String>,
    pub tracker_token: Option<String>,
    /// Chat-completions endpoint of the generation service
    pub generation_url: Option<String>,
    pub generation_api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("workforge"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). Defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir().context("Could not determine config directory")?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;
        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config")?;
        Ok(())
    }

    /// Generation API key; the environment variable takes precedence
    pub fn generation_api_key(&self) -> Option<String> {
        std::env::var("WORKFORGE_API_KEY")
            .ok()
            .or_else(|| self.generation_api_key.clone())
    }

    /// Tracker access token; the environment variable takes precedence
    pub fn tracker_token(&self) -> Option<String> {
        std::env::var("WORKFORGE_TRACKER_TOKEN")
            .ok()
            .or_else(|| self.tracker_token.clone())
    }
}

/// A prompt template declared by the repository, applicable to a subset of
/// record types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    /// Record-type labels this template applies to ("User Story", "Bug", "Task")
    #[serde(default)]
    pub applies_to: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodingStandards {
    #[serde(default)]
    pub style_notes: Vec<String>,
    #[serde(default)]
    pub preferred_dependencies: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Repo-local configuration read from workforge.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub templates: Vec<PromptTemplate>,
    #[serde(default)]
    pub standards: CodingStandards,
}

fn default_language() -> String {
    "rust".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            environment: default_environment(),
            templates: Vec::new(),
            standards: CodingStandards::default(),
        }
    }
}

impl RepoConfig {
    /// Load workforge.toml from the given directory; a missing file yields
    /// the defaults, a malformed one is an error worth surfacing.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join("workforge.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_settings_defaults() {
        let settings = RetrySettings::default();
        let policy = settings.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_settings_floor_at_one_attempt() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(settings.policy().max_attempts, 1);
    }

    #[test]
    fn test_repo_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepoConfig::load(dir.path()).unwrap();
        assert_eq!(config.language, "rust");
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_repo_config_parses_templates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("workforge.toml"),
            r#"
language = "python"
environment = "staging"

[[templates]]
name = "bug-fix"
applies_to = ["Bug"]
body = "Always include a regression test."

[standards]
style_notes = ["four-space indent"]
preferred_dependencies = ["pytest"]
"#,
        )
        .unwrap();
        let config = RepoConfig::load(dir.path()).unwrap();
        assert_eq!(config.language, "python");
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates[0].applies_to, vec!["Bug"]);
        assert_eq!(config.standards.preferred_dependencies, vec!["pytest"]);
    }

    #[test]
    fn test_repo_config_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("workforge.toml"), "language = [not toml").unwrap();
        assert!(RepoConfig::load(dir.path()).is_err());
    }
}
