//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::ProviderArgs;
use crate::constants::{
    DEFAULT_API_VERSION, DEFAULT_DIAL_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE, DEFAULT_TEXT_MODEL,
    PLACEHOLDER_API_KEY,
};
use crate::providers::ProviderKind;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Provider configuration problems. Reported at startup, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No API key, or still the `.env` placeholder.
    MissingApiKey,
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(
                f,
                "No API key configured; set AZURE_OPENAI_API_KEY or pass --api-key"
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Everything the provider adapters need to make requests. Built once and
/// handed to the adapters, nothing reads the environment after this.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Which API family to speak.
    pub kind: ProviderKind,
    /// API key, empty when unconfigured.
    pub api_key: String,
    /// Base URL requests are built from.
    pub base_url: String,
    /// Azure-style `api-version` query value.
    pub api_version: String,
    /// Text model or deployment name.
    pub text_model: String,
    /// Image model or deployment name.
    pub image_model: String,
    /// Caption sampling temperature.
    pub temperature: f32,
    /// Caption max output tokens.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Defaults for `kind` with the given key.
    pub fn new(kind: ProviderKind, api_key: &str) -> Self {
        Self {
            kind,
            api_key: api_key.to_string(),
            base_url: kind.default_base_url().to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build from parsed CLI arguments.
    pub fn from_args(args: &ProviderArgs) -> Self {
        Self {
            kind: args.provider,
            api_key: args.api_key.clone().unwrap_or_default(),
            base_url: args
                .base_url
                .as_ref()
                .map(Url::to_string)
                .unwrap_or_else(|| args.provider.default_base_url().to_string()),
            api_version: args.api_version.clone(),
            text_model: args.text_model.clone(),
            image_model: args.image_model.clone(),
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            request_timeout: Duration::from_secs(args.timeout_secs.max(1)),
        }
    }

    /// Point requests somewhere else, eg a mock server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Check the config is usable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let key = self.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            return Err(ConfigurationError::MissingApiKey);
        }
        Ok(())
    }

    /// `base_url` joined with `path`, keeping any path prefix on the base.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))
    }
}

impl ProviderKind {
    /// Where this provider lives unless told otherwise.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Dial => DEFAULT_DIAL_BASE_URL,
            ProviderKind::OpenAi => DEFAULT_OPENAI_BASE_URL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_configuration_error() {
        let config = ProviderConfig::new(ProviderKind::Dial, "");
        assert_eq!(config.validate(), Err(ConfigurationError::MissingApiKey));

        let config = ProviderConfig::new(ProviderKind::Dial, "XXX");
        assert_eq!(config.validate(), Err(ConfigurationError::MissingApiKey));

        let config = ProviderConfig::new(ProviderKind::OpenAi, "  ");
        assert!(config.validate().is_err());

        let config = ProviderConfig::new(ProviderKind::Dial, "dial-123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let config = ProviderConfig::new(ProviderKind::Dial, "key")
            .with_base_url("http://localhost:9999/proxy/");
        let url = config
            .endpoint("/openai/deployments/gpt-4o/chat/completions")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://localhost:9999/proxy/openai/deployments/gpt-4o/chat/completions"
        );
    }

    #[test]
    fn bad_base_url_fails_at_endpoint() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "key").with_base_url("not a url");
        assert!(config.endpoint("v1/chat/completions").is_err());
    }

    #[test]
    fn default_endpoints() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "key");
        assert_eq!(
            config.endpoint("v1/images/generations").expect("endpoint").as_str(),
            "https://api.openai.com/v1/images/generations"
        );
    }
}
