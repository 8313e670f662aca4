//! Anthropic Messages API client

use super::{http_post_json, normalize_base_url, AnalysisProvider, ProviderRequest, SecretString};
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::Instrument;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 500,
            temperature: 0.1,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let mut provider = Self::new(settings.api_key.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature);
        if let Some(model) = &settings.model {
            provider = provider.with_model(model);
        }
        if let Some(url) = &settings.base_url {
            provider = provider.with_base_url(url);
        }
        provider
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, request: &ProviderRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": request.user_message(),
            }],
        })
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl AnalysisProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::MissingCredentials {
                provider: "anthropic",
            })?;

        let span = tracing::info_span!(
            "docguard.provider.http",
            provider = "anthropic",
            model = %self.model,
        );
        async {
            let url = format!("{}/v1/messages", self.base_url);
            let mut headers = vec![
                ("x-api-key", api_key.expose()),
                ("anthropic-version", API_VERSION),
            ];
            if request.zero_retention {
                headers.push(("anthropic-data-retention", "none"));
            }

            let body = http_post_json(&self.client, &url, headers, &self.build_request(request))
                .await?;
            let response: MessagesResponse = serde_json::from_str(&body)
                .map_err(|_| ProviderError::MalformedResponse("unexpected Messages API body"))?;

            response
                .content
                .into_iter()
                .next()
                .and_then(|block| block.text)
                .ok_or(ProviderError::MalformedResponse("no text content block"))
        }
        .instrument(span)
        .await
    }
}
