//! HTTP transport for an AnkiConnect-compatible record store.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{Action, ActionResponse, ClientError, RecordStoreClient};

/// Protocol version sent with every request.
const API_VERSION: u32 = 6;

/// Client for a record store listening on HTTP.
#[derive(Clone)]
pub struct AnkiConnectClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl AnkiConnectClient {
    /// Create a new client.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request_body(&self, action: &Action) -> Result<Value, ClientError> {
        let mut body =
            serde_json::to_value(action).map_err(|e| ClientError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("version".to_string(), Value::from(API_VERSION));
            if let Some(key) = &self.api_key {
                map.insert("key".to_string(), Value::String(key.clone()));
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl RecordStoreClient for AnkiConnectClient {
    async fn invoke(&self, action: &Action) -> Result<ActionResponse, ClientError> {
        let body = self.request_body(action)?;
        tracing::debug!(action = action.name(), "sending request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Backend { status, message });
        }

        resp.json()
            .await
            .map_err(|e| ClientError::Decode(format!("{}: {}", action.name(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_carries_version_and_key() {
        let client = AnkiConnectClient::new(
            "http://127.0.0.1:8765/",
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.url, "http://127.0.0.1:8765");
        assert_eq!(
            client.request_body(&Action::ModelNames).unwrap(),
            json!({ "action": "modelNames", "version": 6, "key": "secret" })
        );
    }

    #[test]
    fn body_without_key() {
        let client =
            AnkiConnectClient::new("http://localhost:8765", None, Duration::from_secs(5)).unwrap();
        let body = client
            .request_body(&Action::FindNotes {
                query: "tag:md-flashcard".to_string(),
            })
            .unwrap();
        assert!(body.get("key").is_none());
        assert_eq!(body["params"]["query"], "tag:md-flashcard");
    }
}
