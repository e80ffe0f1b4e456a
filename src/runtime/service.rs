/// External service invocation
///
/// `serviceTask` nodes reach external systems through adapters: named
/// connection configurations (base URL, auth, default headers). The interpreter
/// resolves the adapter, builds a `ServiceRequest` and hands it to a
/// `ServiceInvoker`. `HttpServiceInvoker` is the reqwest implementation.

use crate::error::WorkflowError;
use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    #[default]
    Rest,
    Soap,
    Graphql,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdapterAuth {
    #[default]
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
    #[serde(rename_all = "camelCase")]
    ApiKey { header: String, key: String },
}

/// Connection configuration for one external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    pub id: String,
    #[serde(default, rename = "type")]
    pub adapter_type: AdapterType,
    pub base_url: String,
    #[serde(default)]
    pub auth: AdapterAuth,
    /// Sent with every call; node headers override them
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// One call to an external system
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub timeout: Duration,
}

#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    /// Perform the call and return the parsed response body.
    async fn invoke(&self, adapter: &AdapterConfig, request: ServiceRequest) -> Result<Value>;
}

/// Lock-free adapter lookup
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: ArcSwap<HashMap<String, Arc<AdapterConfig>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_adapters(adapters: impl IntoIterator<Item = AdapterConfig>) -> Self {
        let registry = Self::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    /// Load an array of adapter configurations from a JSON file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read adapter file {}: {}", path.display(), e))?;
        let adapters: Vec<AdapterConfig> = serde_json::from_str(&text)?;
        let count = adapters.len();
        for adapter in adapters {
            self.register(adapter);
        }
        Ok(count)
    }

    pub fn register(&self, adapter: AdapterConfig) {
        let current = self.adapters.load();
        let mut next = (**current).clone();
        tracing::info!("Registered adapter: {} ({})", adapter.id, adapter.base_url);
        next.insert(adapter.id.clone(), Arc::new(adapter));
        self.adapters.store(Arc::new(next));
    }

    pub fn get(&self, adapter_id: &str) -> Option<Arc<AdapterConfig>> {
        self.adapters.load().get(adapter_id).cloned()
    }
}

/// reqwest-backed invoker
#[derive(Debug, Clone, Default)]
pub struct HttpServiceInvoker {
    client: reqwest::Client,
}

impl HttpServiceInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[async_trait]
impl ServiceInvoker for HttpServiceInvoker {
    async fn invoke(&self, adapter: &AdapterConfig, request: ServiceRequest) -> Result<Value> {
        let url = join_url(&adapter.base_url, &request.path);
        let method = request.method.to_uppercase();

        tracing::debug!("🌍 Service request: {} {} via adapter '{}'", method, url, adapter.id);

        let mut request_builder = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            "PATCH" => self.client.patch(&url),
            _ => return Err(anyhow::anyhow!("Unsupported HTTP method: {}", request.method)),
        };
        request_builder = request_builder.timeout(request.timeout);

        request_builder = match &adapter.auth {
            AdapterAuth::None => request_builder,
            AdapterAuth::Bearer { token } => request_builder.bearer_auth(token),
            AdapterAuth::Basic { username, password } => request_builder.basic_auth(username, Some(password)),
            AdapterAuth::ApiKey { header, key } => request_builder.header(header.as_str(), key.as_str()),
        };

        for (key, value) in adapter.headers.iter().chain(request.headers.iter()) {
            request_builder = request_builder.header(key.as_str(), value.as_str());
        }

        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            request_builder = request_builder.json(&request.body);
        }

        let timeout_ms = request.timeout.as_millis() as u64;
        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::Error::from(WorkflowError::ServiceTimeout { adapter_id: adapter.id.clone(), timeout_ms })
            } else {
                anyhow::anyhow!("HTTP request failed: {}", e)
            }
        })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?;

        tracing::debug!("📡 Response status: {}", status);

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Service '{}' returned {}: {}",
                adapter.id,
                status,
                response_text
            ));
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response_text)
            .map_err(|e| anyhow::anyhow!("Service '{}' returned a non-JSON response: {}", adapter.id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_urls() {
        assert_eq!(join_url("http://h/api/", "/score"), "http://h/api/score");
        assert_eq!(join_url("http://h/api", "score"), "http://h/api/score");
        assert_eq!(join_url("http://h", ""), "http://h");
        assert_eq!(join_url("http://h", "https://other/x"), "https://other/x");
    }

    #[test]
    fn parses_adapter_configs() {
        let adapters: Vec<AdapterConfig> = serde_json::from_value(json!([
            { "id": "crm", "baseUrl": "http://crm", "auth": { "type": "bearer", "token": "t" } },
            { "id": "legacy", "type": "soap", "baseUrl": "http://soap",
              "auth": { "type": "apiKey", "header": "X-Key", "key": "k" } },
            { "id": "odd", "type": "ftp", "baseUrl": "ftp://x" }
        ]))
        .unwrap();

        assert_eq!(adapters[0].adapter_type, AdapterType::Rest);
        assert_eq!(adapters[0].auth, AdapterAuth::Bearer { token: "t".into() });
        assert_eq!(adapters[1].adapter_type, AdapterType::Soap);
        assert_eq!(adapters[1].auth, AdapterAuth::ApiKey { header: "X-Key".into(), key: "k".into() });
        assert_eq!(adapters[2].adapter_type, AdapterType::Other);
        assert_eq!(adapters[2].auth, AdapterAuth::None);

        let registry = AdapterRegistry::from_adapters(adapters);
        assert_eq!(registry.get("crm").unwrap().base_url, "http://crm");
        assert!(registry.get("nope").is_none());
    }
}
