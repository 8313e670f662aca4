//! External analysis providers
//!
//! Every provider implements [`AnalysisProvider`]: take a minimized
//! [`ProviderRequest`] (redacted text plus a fixed instruction) and return
//! the model's raw completion text. Parsing that text into an analysis is
//! shared across providers in [`response`].
//!
//! Providers make exactly one HTTP attempt. Retries and timeouts are owned
//! by the orchestrator.

mod anthropic;
mod openai;
pub mod response;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use response::{extract_json_block, parse_analysis, ParsedAnalysis};

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::redact::SessionId;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A string wrapper that redacts its value in Debug and Display output.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (only for HTTP headers)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// Minimized outbound payload.
///
/// Holds only redacted text and fixed instruction text. It has no field
/// that could carry the original document or the token map.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub session_id: SessionId,
    pub instruction: &'static str,
    pub redacted_text: String,
    pub zero_retention: bool,
}

impl ProviderRequest {
    /// Single user message sent to chat-style APIs
    pub fn user_message(&self) -> String {
        format!(
            "{}\n\nDocument text:\n{}",
            self.instruction, self.redacted_text
        )
    }
}

/// An external analysis backend.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Registry key (e.g., "anthropic", "openai")
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Whether an API key is configured; providers without one are never called.
    fn has_credentials(&self) -> bool;

    /// Send one request and return the completion text.
    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError>;
}

/// Providers available to the orchestrator, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Arc<dyn AnalysisProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anthropic and OpenAI clients built from config.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnthropicProvider::from_settings(&config.anthropic)));
        registry.register(Arc::new(OpenAiProvider::from_settings(&config.openai)));
        registry
    }

    /// Register a provider; replaces any provider with the same name.
    pub fn register(&mut self, provider: Arc<dyn AnalysisProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisProvider>> {
        self.providers
            .get(name.trim().to_lowercase().as_str())
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .trim_end_matches("/v1")
        .trim_end_matches('/')
        .to_string()
}

/// POST a JSON body and return the response text on 2xx.
///
/// Bodies are never logged or attached to errors: the request carries
/// document text and the response may echo it.
async fn http_post_json(
    client: &reqwest::Client,
    url: &str,
    headers: Vec<(&str, &str)>,
    body: &serde_json::Value,
) -> Result<String, ProviderError> {
    tracing::debug!(url = %url, "HTTP POST to provider");

    let mut request = client.post(url);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request = request.json(body);

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}
