//! Client side of the sensor adapter HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Default address of the local adapter service.
pub const DEFAULT_ADAPTER_URL: &str = "http://127.0.0.1:8765";

/// An adapter advertised by `GET /adapters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

/// The adapter service operations the coordinator needs.
///
/// Response bodies are returned verbatim regardless of status code; the
/// service reports adapter-level problems as `{"error": ...}` bodies.
#[async_trait]
pub trait AdapterApi: Send + Sync {
    /// `GET /adapters`. A body that is not an array yields an empty list.
    async fn list_adapters(&self) -> Result<Vec<AdapterDescriptor>, AdapterError>;

    /// `POST /adapters/{id}/discover`.
    async fn discover(&self, adapter_id: &str) -> Result<Value, AdapterError>;

    /// `POST /adapters/{id}/connect` with a JSON config body.
    async fn connect(&self, adapter_id: &str, config: &Value) -> Result<Value, AdapterError>;

    /// `GET /adapters/{id}/read`.
    async fn read(&self, adapter_id: &str) -> Result<Value, AdapterError>;
}

/// [`AdapterApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAdapterApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAdapterApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, url: String, request: reqwest::RequestBuilder) -> Result<Value, AdapterError> {
        let res = request.send().await.map_err(|e| AdapterError::Transport {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        res.json::<Value>().await.map_err(|e| AdapterError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AdapterApi for HttpAdapterApi {
    async fn list_adapters(&self) -> Result<Vec<AdapterDescriptor>, AdapterError> {
        let url = self.url("/adapters");
        let body = self.send(url.clone(), self.client.get(&url)).await?;
        Ok(descriptors_from(body))
    }

    async fn discover(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        let url = self.url(&format!("/adapters/{adapter_id}/discover"));
        self.send(url.clone(), self.client.post(&url)).await
    }

    async fn connect(&self, adapter_id: &str, config: &Value) -> Result<Value, AdapterError> {
        let url = self.url(&format!("/adapters/{adapter_id}/connect"));
        self.send(url.clone(), self.client.post(&url).json(config)).await
    }

    async fn read(&self, adapter_id: &str) -> Result<Value, AdapterError> {
        let url = self.url(&format!("/adapters/{adapter_id}/read"));
        self.send(url.clone(), self.client.get(&url)).await
    }
}

/// Parse a `GET /adapters` body. Non-arrays and entries without an id are
/// dropped.
pub fn descriptors_from(body: Value) -> Vec<AdapterDescriptor> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptors_from_array() {
        let list = descriptors_from(json!([
            {"id": "a", "name": "A", "version": "1", "capabilities": {"read": []}},
            {"id": "b"},
            {"name": "no id"}
        ]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "A");
        assert!(list[0].capabilities.is_some());
        assert_eq!(list[1].version, "");
    }

    #[test]
    fn descriptors_from_non_array_is_empty() {
        assert!(descriptors_from(json!({"error": "boom"})).is_empty());
        assert!(descriptors_from(Value::Null).is_empty());
    }

    #[test]
    fn base_url_is_normalized() {
        let api = HttpAdapterApi::new("http://127.0.0.1:8765/");
        assert_eq!(api.url("/adapters"), "http://127.0.0.1:8765/adapters");
    }
}
