//! Text and image generation providers.
//!
//! The pipeline only sees [`TextGenerator`] and [`ImageGenerator`]; the
//! adapters in here turn those into HTTP calls against a concrete API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;

mod dial;
mod openai;

pub use dial::DialClient;
pub use openai::OpenAiClient;

/// Max bytes of an error body kept in [`ProviderError::Status`].
const ERROR_BODY_SNIPPET: usize = 500;

/// Which API family to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ProviderKind {
    /// DIAL / Azure OpenAI proxy. Images come back as attachments to fetch, then delete.
    Dial,
    /// The public OpenAI API.
    #[value(name = "openai")]
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dial => write!(f, "dial"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// A provider call that didn't produce a result.
#[derive(Debug)]
pub enum ProviderError {
    /// Connection failure, timeout, or unreadable body.
    Transport(reqwest::Error),
    /// The provider answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },
    /// The response didn't have the shape we expected.
    Envelope(String),
    /// Inline image data wasn't valid base64.
    Decode(String),
    /// The configured base URL can't be turned into a request URL.
    InvalidUrl(url::ParseError),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "Provider request failed: {err}"),
            Self::Status { status, body } => write!(f, "Provider returned {status}: {body}"),
            Self::Envelope(message) => write!(f, "Unexpected provider response: {message}"),
            Self::Decode(message) => write!(f, "Failed to decode image data: {message}"),
            Self::InvalidUrl(err) => write!(f, "Invalid provider URL: {err}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err)
    }
}

impl From<url::ParseError> for ProviderError {
    fn from(err: url::ParseError) -> Self {
        ProviderError::InvalidUrl(err)
    }
}

impl From<base64::DecodeError> for ProviderError {
    fn from(err: base64::DecodeError) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

/// Turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Turns a prompt into encoded image bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ProviderError>;
}

/// The pair of capabilities the pipeline needs.
#[derive(Clone)]
pub struct Providers {
    /// Caption text source.
    pub text: Arc<dyn TextGenerator>,
    /// Base image source.
    pub image: Arc<dyn ImageGenerator>,
}

/// Build the adapters `config` asks for.
pub fn build_providers(config: &ProviderConfig) -> Result<Providers, ProviderError> {
    debug!(
        "Using {} provider at {} (text: {}, image: {})",
        config.kind, config.base_url, config.text_model, config.image_model
    );
    Ok(match config.kind {
        ProviderKind::Dial => {
            let client = Arc::new(DialClient::new(config.clone())?);
            Providers {
                text: client.clone(),
                image: client,
            }
        }
        ProviderKind::OpenAi => {
            let client = Arc::new(OpenAiClient::new(config.clone())?);
            Providers {
                text: client.clone(),
                image: client,
            }
        }
    })
}

/// Shared HTTP client with the configured timeout.
fn http_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?)
}

/// Body bytes of a successful response, or a [`ProviderError::Status`].
async fn success_bytes(resp: Response) -> Result<Vec<u8>, ProviderError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        let mut body = String::from_utf8_lossy(&bytes).to_string();
        if body.len() > ERROR_BODY_SNIPPET {
            let mut end = ERROR_BODY_SNIPPET;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(bytes.to_vec())
}

/// Chat completion envelope, shared by OpenAI and DIAL.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    /// DIAL puts generated files here.
    #[serde(default)]
    custom_content: Option<CustomContent>,
}

#[derive(Debug, Deserialize)]
struct CustomContent {
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

impl ChatCompletion {
    fn parse(bytes: &[u8]) -> Result<Self, ProviderError> {
        serde_json::from_slice(bytes)
            .map_err(|err| ProviderError::Envelope(format!("invalid chat completion JSON: {err}")))
    }

    fn into_first_message(self) -> Result<ChatMessage, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ProviderError::Envelope("response has no choices".to_string()))
    }

    /// Text of the first completion.
    fn first_text(self) -> Result<String, ProviderError> {
        let text = self
            .into_first_message()?
            .content
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::Envelope("completion has no text".to_string()));
        }
        Ok(text)
    }
}
