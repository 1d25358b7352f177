//! Work-tracker collaborator client
//!
//! Fetches one record by numeric id. The tracker owns the record shape; we
//! read a fixed set of dotted field keys and ignore the rest. Posting
//! comments and updating state stay on the tracker's side of the boundary.

use crate::record::RawRecord;
use crate::retry::{invoke, InvokeError, InvokeFailure, RetryPolicy};
use tracing::debug;

const API_VERSION: &str = "7.1";

/// Client for one tracker instance
#[derive(Debug, Clone)]
pub struct TrackerClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl TrackerClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch a raw record by id under the retry policy
    pub async fn fetch_record(
        &self,
        id: u64,
        policy: &RetryPolicy,
    ) -> Result<RawRecord, InvokeFailure> {
        invoke(policy, "tracker fetch", || self.request(id)).await
    }

    async fn request(&self, id: u64) -> Result<RawRecord, InvokeError> {
        let url = format!(
            "{}/_apis/wit/workitems/{}?api-version={}",
            self.base_url, id, API_VERSION
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
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
                format!("tracker returned {} for work item {}", status, id),
            ));
        }

        let record: RawRecord = serde_json::from_str(&text)
            .map_err(|e| InvokeError::fatal(format!("malformed tracker response: {}", e)))?;

        debug!(id = record.id, fields = record.fields.len(), "fetched work item");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = TrackerClient::new("https://tracker.test/org/project/", "t");
        assert_eq!(client.base_url, "https://tracker.test/org/project");
    }

    #[test]
    fn test_record_deserializes_from_tracker_shape() {
        let json = r#"{
            "id": 42,
            "rev": 3,
            "fields": {
                "System.WorkItemType": "Bug",
                "System.Title": "Login fails",
                "Some.Unknown.Key": {"nested": true}
            }
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 42);
        assert!(record.fields.contains_key("System.Title"));
    }
}
