//! Error types for a3s-docguard

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by configuration loading and the standalone components.
///
/// The analysis pipeline itself never returns these to its caller; every
/// failure inside `SecureAnalyzer::analyze` resolves to an `AnalysisResult`.
#[derive(Debug, Error)]
pub enum DocGuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse failure
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Page content could not be read for fingerprinting
    #[error("Document read error: {0}")]
    Document(String),

    /// External provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Failure of a single external provider attempt.
///
/// Variants deliberately carry no response bodies: a provider may echo the
/// submitted document back in an error payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// No API key configured for the provider
    #[error("No credentials configured for provider '{provider}'")]
    MissingCredentials { provider: &'static str },

    /// The call did not complete within the configured timeout
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Network or TLS failure before a response was received
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("Provider returned HTTP {status}")]
    Http { status: u16 },

    /// Response did not contain the expected JSON shape
    #[error("Malformed provider response: {0}")]
    MalformedResponse(&'static str),
}

impl ProviderError {
    /// Stable label used in audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => "missing_credentials",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Http { .. } => "http_status",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// HTTP status code, when the provider answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(Duration::ZERO);
        }
        if let Some(status) = e.status() {
            return Self::Http {
                status: status.as_u16(),
            };
        }
        // Strip the URL: base URLs may embed credentials for self-hosted gateways.
        Self::Transport(e.without_url().to_string())
    }
}

/// Result type alias for docguard operations
pub type Result<T> = std::result::Result<T, DocGuardError>;
