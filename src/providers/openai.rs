//! Public OpenAI API adapter.
//!
//! Text: POST /v1/chat/completions
//! Images: POST /v1/images/generations
//! Docs: https://platform.openai.com/docs/api-reference/images

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{ChatCompletion, ImageGenerator, ProviderError, TextGenerator, http_client, success_bytes};
use crate::config::ProviderConfig;

/// Talks to api.openai.com (or anything speaking the same API).
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

/// Request body for POST /v1/images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,

    // For GPT image models.
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output_format: Option<&'a str>,

    // For dall-e models.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,
}

impl<'a> ImagesGenerateRequest<'a> {
    /// GPT image models always return base64 and take `output_format`,
    /// DALL·E models need `response_format` to skip the URL round trip.
    fn for_model(model: &'a str, prompt: &'a str) -> Self {
        let is_gpt_image = model.starts_with("gpt-image");
        Self {
            model,
            prompt,
            n: 1,
            size: "1024x1024",
            quality: match model {
                "dall-e-3" => Some("hd"),
                _ if is_gpt_image => Some("high"),
                _ => None,
            },
            output_format: is_gpt_image.then_some("png"),
            response_format: (!is_gpt_image).then_some("b64_json"),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

impl OpenAiClient {
    /// Build a client with the configured timeout.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(&config)?,
            config,
        })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.config.endpoint(path)?;
        debug!("POST {url}");
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;
        success_bytes(resp).await
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.text_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        let bytes = self.post_json("v1/chat/completions", &body).await?;
        ChatCompletion::parse(&bytes)?.first_text()
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let body = ImagesGenerateRequest::for_model(&self.config.image_model, prompt);
        let bytes = self.post_json("v1/images/generations", &body).await?;
        let parsed: ImagesGenerateResponse = serde_json::from_slice(&bytes).map_err(|err| {
            ProviderError::Envelope(format!("invalid images response JSON: {err}"))
        })?;

        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Envelope("no image data returned".to_string()))?;

        if let Some(revised_prompt) = first.revised_prompt {
            info!("Revised prompt: {revised_prompt}");
        }

        if let Some(b64_json) = first.b64_json {
            Ok(general_purpose::STANDARD.decode(b64_json)?)
        } else if let Some(url) = first.url {
            debug!("GET {url}");
            let resp = self.client.get(url).send().await?;
            success_bytes(resp).await
        } else {
            Err(ProviderError::Envelope(
                "image response missing b64_json and url fields".to_string(),
            ))
        }
    }
}
