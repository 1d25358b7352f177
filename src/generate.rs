//! Generation collaborator client
//!
//! Thin chat-completions client. All network calls run through the retry
//! layer; this module only builds requests and classifies responses.

use crate::retry::{invoke, InvokeError, InvokeFailure, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

/// Token usage reported by the generation service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Raw reply from the generation service
#[derive(Debug)]
pub struct GenerationReply {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Client for one generation endpoint + model pairing
#[derive(Debug, Clone)]
pub struct GenerationClient {
    endpoint: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl GenerationClient {
    pub fn new(endpoint: &str, api_key: &str, model: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system+user exchange under the retry policy
    pub async fn generate(
        &self,
        system: &str,
        user: &str,
        policy: &RetryPolicy,
    ) -> Result<GenerationReply, InvokeFailure> {
        invoke(policy, "generation", || self.request(system, user)).await
    }

    async fn request(&self, system: &str, user: &str) -> Result<GenerationReply, InvokeError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| InvokeError::from_message(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InvokeError::retryable(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(InvokeError::from_status(
                status.as_u16(),
                format!("generation service returned {}: {}", status, truncate(&text, 200)),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            InvokeError::retryable(format!("malformed generation response: {}", e))
        })?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(InvokeError::retryable("generation response had no content"));
        }

        debug!(model = %self.model, chars = content.len(), "generation reply received");

        Ok(GenerationReply {
            content,
            usage: parsed.usage,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Truncate a string for error messages (Unicode-safe)
fn truncate(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}
