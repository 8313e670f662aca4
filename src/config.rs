//! Runtime configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.
//! Every field has a default so an empty file (or no file) is valid.

use crate::error::{DocGuardError, Result};
use crate::provider::SecretString;
use crate::redact::{CategorySet, PiiCategory};
use crate::types::DocumentType;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level settings for the analysis pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct DocGuardConfig {
    /// Characters of extracted text kept before any processing (default: 5000)
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Pages fingerprinted by the tamper detector (default: 50)
    #[serde(default = "default_max_fingerprint_pages")]
    pub max_fingerprint_pages: usize,

    /// Entries kept by the analyzer's built-in audit log (default: 10000)
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

fn default_max_text_length() -> usize {
    5000
}

fn default_max_fingerprint_pages() -> usize {
    crate::tamper::DEFAULT_MAX_PAGES
}

fn default_audit_capacity() -> usize {
    crate::audit::DEFAULT_AUDIT_CAPACITY
}

impl Default for DocGuardConfig {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            max_fingerprint_pages: default_max_fingerprint_pages(),
            audit_capacity: default_audit_capacity(),
            providers: ProvidersConfig::default(),
            policy: PolicyConfig::default(),
            redaction: RedactionConfig::default(),
        }
    }
}

/// External analysis providers
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Provider used when the caller does not name one (default: "anthropic")
    #[serde(default = "default_preferred")]
    pub preferred: String,

    /// Per-call timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub anthropic: ProviderSettings,

    #[serde(default)]
    pub openai: ProviderSettings,
}

fn default_preferred() -> String {
    "anthropic".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred(),
            timeout_secs: default_timeout_secs(),
            anthropic: ProviderSettings::default(),
            openai: ProviderSettings::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for one provider; unset model and base URL fall back to the
/// provider's own defaults.
#[derive(Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Response token limit (default: 500)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (default: 0.1)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Deployment-level privacy switches
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Never send HIGH-sensitivity documents to an external provider
    #[serde(default)]
    pub local_only_for_high: bool,

    /// Ask providers not to retain request data (default: true)
    #[serde(default = "default_true")]
    pub request_zero_retention: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            local_only_for_high: false,
            request_zero_retention: true,
        }
    }
}

/// Per-document-type redaction settings.
///
/// Names, SSN, account, routing and EIN/TIN are always redacted; only the
/// optional categories are configurable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub bank_statement: DocumentRedaction,
    #[serde(default)]
    pub pay_stub: DocumentRedaction,
    #[serde(default)]
    pub tax_return: DocumentRedaction,
    #[serde(default)]
    pub other: DocumentRedaction,
}

impl RedactionConfig {
    pub fn for_type(&self, doc_type: DocumentType) -> &DocumentRedaction {
        match doc_type {
            DocumentType::BankStatement => &self.bank_statement,
            DocumentType::PayStub => &self.pay_stub,
            DocumentType::TaxReturn => &self.tax_return,
            DocumentType::Other => &self.other,
        }
    }

    /// Mandatory categories plus the type's optional ones.
    pub fn categories_for(&self, doc_type: DocumentType) -> CategorySet {
        let mut set = CategorySet::mandatory();
        set.extend(self.for_type(doc_type).optional.iter().copied());
        set
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRedaction {
    /// Enabled optional categories (default: phone, email, address)
    #[serde(default = "default_optional")]
    pub optional: Vec<PiiCategory>,
}

fn default_optional() -> Vec<PiiCategory> {
    vec![PiiCategory::Phone, PiiCategory::Email, PiiCategory::Address]
}

impl Default for DocumentRedaction {
    fn default() -> Self {
        Self {
            optional: default_optional(),
        }
    }
}

impl DocGuardConfig {
    /// Parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocGuardError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: DocGuardConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// File (if given) or defaults, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment:
    ///
    /// - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`
    /// - `DOCGUARD_PREFERRED_PROVIDER`
    /// - `DOCGUARD_LOCAL_ONLY_HIGH` (`1`/`true`/`yes` or `0`/`false`/`no`)
    /// - `DOCGUARD_PROVIDER_TIMEOUT_SECS`
    /// - `DOCGUARD_AUDIT_CAPACITY`
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = set("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(SecretString::new(key));
        }
        if let Some(key) = set("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(SecretString::new(key));
        }
        if let Some(name) = set("DOCGUARD_PREFERRED_PROVIDER") {
            self.providers.preferred = name.trim().to_lowercase();
        }
        if let Some(flag) = set("DOCGUARD_LOCAL_ONLY_HIGH") {
            self.policy.local_only_for_high = parse_flag(&flag).ok_or_else(|| {
                DocGuardError::Config(format!("DOCGUARD_LOCAL_ONLY_HIGH: invalid flag '{}'", flag))
            })?;
        }
        if let Some(secs) = set("DOCGUARD_PROVIDER_TIMEOUT_SECS") {
            self.providers.timeout_secs = secs.trim().parse().map_err(|_| {
                DocGuardError::Config(format!(
                    "DOCGUARD_PROVIDER_TIMEOUT_SECS: not a number '{}'",
                    secs
                ))
            })?;
        }
        if let Some(n) = set("DOCGUARD_AUDIT_CAPACITY") {
            self.audit_capacity = n.trim().parse().map_err(|_| {
                DocGuardError::Config(format!("DOCGUARD_AUDIT_CAPACITY: not a number '{}'", n))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_text_length == 0 {
            return Err(DocGuardError::Config(
                "max_text_length must be greater than zero".to_string(),
            ));
        }
        if self.providers.timeout_secs == 0 {
            return Err(DocGuardError::Config(
                "providers.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.audit_capacity == 0 {
            return Err(DocGuardError::Config(
                "audit_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
