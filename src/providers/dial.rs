//! DIAL (Azure OpenAI proxy) adapter.
//!
//! Both text and images go through `chat/completions` on a deployment. Image
//! deployments answer with attachments: a revised prompt and either inline
//! data or a file URL, which we download and then delete from the proxy.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    Attachment, ChatCompletion, ImageGenerator, ProviderError, TextGenerator, http_client,
    success_bytes,
};
use crate::config::ProviderConfig;

const API_KEY_HEADER: &str = "api-key";
const REVISED_PROMPT_TITLE: &str = "Revised prompt";
const IMAGE_TITLE: &str = "Image";

/// Talks to a DIAL deployment.
#[derive(Clone, Debug)]
pub struct DialClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl DialClient {
    /// Build a client with the configured timeout.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(&config)?,
            config,
        })
    }

    fn deployment_url(&self, deployment: &str) -> Result<Url, ProviderError> {
        let mut url = self
            .config
            .endpoint(&format!("openai/deployments/{deployment}/chat/completions"))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    async fn chat(
        &self,
        deployment: &str,
        body: serde_json::Value,
    ) -> Result<ChatCompletion, ProviderError> {
        let url = self.deployment_url(deployment)?;
        debug!("POST {url}");
        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        ChatCompletion::parse(&success_bytes(resp).await?)
    }

    /// Download an attachment, then remove it from the proxy. A failed delete
    /// only costs server space, so it is logged and ignored.
    async fn fetch_then_delete(&self, file_url: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.config.endpoint(&format!("v1/{}", file_url.trim_start_matches('/')))?;

        debug!("GET {url}");
        let resp = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        let bytes = success_bytes(resp).await?;

        debug!("DELETE {url}");
        let deleted = match self
            .client
            .delete(url.clone())
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
        {
            Ok(resp) => success_bytes(resp).await.map(|_| ()),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = deleted {
            warn!("Failed to delete {url} from DIAL: {err}");
        }

        Ok(bytes)
    }
}

#[async_trait]
impl TextGenerator for DialClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        self.chat(&self.config.text_model, body).await?.first_text()
    }
}

#[async_trait]
impl ImageGenerator for DialClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let body = json!({
            "messages": [{"role": "user", "content": prompt}],
        });
        let message = self
            .chat(&self.config.image_model, body)
            .await?
            .into_first_message()?;
        let attachments = message
            .custom_content
            .map(|content| content.attachments)
            .unwrap_or_default();

        let mut image: Option<Attachment> = None;
        for attachment in attachments {
            match attachment.title.as_deref() {
                Some(REVISED_PROMPT_TITLE) => {
                    if let Some(revised) = attachment.data.as_deref() {
                        info!("Revised prompt: {revised}");
                    }
                }
                Some(IMAGE_TITLE) => image = Some(attachment),
                _ => {}
            }
        }

        let image = image
            .ok_or_else(|| ProviderError::Envelope("no image attachment in response".to_string()))?;
        match (image.url, image.data) {
            (Some(url), _) => self.fetch_then_delete(&url).await,
            (None, Some(data)) => Ok(general_purpose::STANDARD.decode(data.trim())?),
            (None, None) => Err(ProviderError::Envelope(
                "image attachment has neither url nor data".to_string(),
            )),
        }
    }
}
