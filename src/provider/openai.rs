//! OpenAI Chat Completions client

use super::{http_post_json, normalize_base_url, AnalysisProvider, ProviderRequest, SecretString};
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::Instrument;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiProvider {
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
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": request.user_message(),
            }],
            "user": format!("secure-session-{}", request.session_id),
        });
        if request.zero_retention {
            body["store"] = serde_json::json!(false);
        }
        body
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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
            .ok_or(ProviderError::MissingCredentials { provider: "openai" })?;

        let span = tracing::info_span!(
            "docguard.provider.http",
            provider = "openai",
            model = %self.model,
        );
        async {
            let url = format!("{}/v1/chat/completions", self.base_url);
            let auth = format!("Bearer {}", api_key.expose());
            let headers = vec![("Authorization", auth.as_str())];

            let body = http_post_json(&self.client, &url, headers, &self.build_request(request))
                .await?;
            let response: ChatResponse = serde_json::from_str(&body)
                .map_err(|_| ProviderError::MalformedResponse("unexpected chat completion body"))?;

            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or(ProviderError::MalformedResponse("no message content"))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::{header, request_body, serve_once};
    use crate::redact::SessionId;

    fn request(zero_retention: bool) -> ProviderRequest {
        ProviderRequest {
            session_id: SessionId::parse("feed0001").unwrap(),
            instruction: "Return JSON only.",
            redacted_text: "SSN: [SSN-feed0001-0]".to_string(),
            zero_retention,
        }
    }

    #[test]
    fn test_build_request_body() {
        let provider = OpenAiProvider::new(Some("k".into())).with_model("gpt-4o");
        let body = provider.build_request(&request(true));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["user"], "secure-session-feed0001");
        assert_eq!(body["store"], false);
        assert_eq!(body["max_tokens"], 500);

        let body = provider.build_request(&request(false));
        assert!(body.get("store").is_none());
    }

    #[test]
    fn test_from_settings() {
        let settings = ProviderSettings {
            model: Some("gpt-4.1-mini".into()),
            api_key: Some("sk".into()),
            base_url: Some("http://localhost:4000/v1".into()),
            max_tokens: 256,
            temperature: 0.0,
        };
        let provider = OpenAiProvider::from_settings(&settings);
        assert_eq!(provider.model(), "gpt-4.1-mini");
        assert_eq!(provider.base_url, "http://localhost:4000");
        assert_eq!(provider.max_tokens, 256);
        assert!(provider.has_credentials());
    }

    #[tokio::test]
    async fn test_complete_uses_bearer_auth() {
        let reply = r#"{"choices":[{"message":{"role":"assistant","content":"{\"status\":\"Complete\"}"}}]}"#;
        let (base_url, handle) = serve_once(200, reply).await;
        let provider = OpenAiProvider::new(Some("sk-test".into())).with_base_url(&base_url);

        let text = provider.complete(&request(true)).await.unwrap();
        assert_eq!(text, "{\"status\":\"Complete\"}");

        let raw = handle.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert_eq!(header(&raw, "authorization"), Some("Bearer sk-test"));
        let body = request_body(&raw);
        assert_eq!(body["messages"][0]["content"], request(true).user_message());
        assert!(!body.to_string().contains("123-45"));
    }

    #[tokio::test]
    async fn test_null_content_is_malformed() {
        let reply = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let (base_url, handle) = serve_once(200, reply).await;
        let provider = OpenAiProvider::new(Some("k".into())).with_base_url(&base_url);
        let err = provider.complete(&request(true)).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (base_url, handle) = serve_once(401, r#"{"error":{"message":"bad key"}}"#).await;
        let provider = OpenAiProvider::new(Some("k".into())).with_base_url(&base_url);
        let err = provider.complete(&request(true)).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        handle.await.unwrap();
    }
}
