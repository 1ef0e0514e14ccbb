//! The meme pipeline: caption text, base image, composite, save.
//!
//! Steps run strictly in order and the first failure ends that request. In a
//! batch every request runs to completion or failure on its own, and the
//! report records each outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::caption::Caption;
use crate::cli::{OutputArgs, ProviderArgs};
use crate::compositor::{ComposeOptions, Compositor};
use crate::config::ProviderConfig;
use crate::constants::{DEFAULT_MOOD, DEFAULT_STYLE};
use crate::prompts::{caption_prompt, image_prompt};
use crate::providers::{ProviderError, Providers, build_providers};
use crate::storage::{MemeFile, MemeStore, StorageError};

/// What to make a meme about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeRequest {
    /// The workplace situation.
    pub situation: String,
    /// Visual style for the image.
    pub style: String,
    /// Tone for both caption and image.
    pub mood: String,
}

impl MemeRequest {
    /// Request with the default style and mood.
    pub fn new(situation: &str) -> Self {
        Self {
            situation: situation.trim().to_string(),
            style: DEFAULT_STYLE.to_string(),
            mood: DEFAULT_MOOD.to_string(),
        }
    }

    /// Override the style; `None` or blank keeps the default.
    pub fn with_style(mut self, style: Option<&str>) -> Self {
        if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
            self.style = style.to_string();
        }
        self
    }

    /// Override the mood; `None` or blank keeps the default.
    pub fn with_mood(mut self, mood: Option<&str>) -> Self {
        if let Some(mood) = mood.map(str::trim).filter(|s| !s.is_empty()) {
            self.mood = mood.to_string();
        }
        self
    }
}

/// A finished meme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemeRecord {
    /// The situation it was made for.
    pub situation: String,
    /// Image style used.
    pub style: String,
    /// Mood used.
    pub mood: String,
    /// Raw text from the text provider.
    pub text: String,
    /// Parsed caption, original casing.
    pub caption: Caption,
    /// Stored filename.
    pub filename: String,
    /// Path on disk.
    pub image_path: String,
    /// Where the HTTP server serves it.
    pub url: String,
    /// PNG size in bytes.
    pub size: u64,
    /// When it was saved.
    pub created_at: DateTime<Utc>,
}

/// Why a single meme couldn't be made.
#[derive(Debug)]
pub enum PipelineError {
    /// The caption text call failed.
    TextGeneration(ProviderError),
    /// The image call failed.
    ImageGeneration(ProviderError),
    /// The provider's bytes aren't an image we can read.
    ImageDecode(image::ImageError),
    /// Writing the meme failed.
    Storage(StorageError),
    /// The rendering task panicked or was cancelled.
    Render(tokio::task::JoinError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextGeneration(err) => write!(f, "Failed to generate meme text: {err}"),
            Self::ImageGeneration(err) => write!(f, "Failed to generate meme image: {err}"),
            Self::ImageDecode(err) => write!(f, "Failed to decode generated image: {err}"),
            Self::Storage(err) => write!(f, "Failed to save meme: {err}"),
            Self::Render(err) => write!(f, "Meme rendering task failed: {err}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// One batch entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    /// The meme was made.
    Generated(MemeRecord),
    /// It wasn't, and why.
    Failed {
        /// Error message.
        error: String,
        /// The situation that failed.
        situation: String,
    },
}

impl BatchItem {
    /// True for a made meme.
    pub fn is_generated(&self) -> bool {
        matches!(self, BatchItem::Generated(_))
    }
}

/// Outcome of a batch, as returned over HTTP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Situations requested.
    pub total: usize,
    /// Memes made.
    pub generated: usize,
    /// One entry per situation, in request order.
    pub results: Vec<BatchItem>,
}

/// Outcome of a batch, as written to `batch_summary.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Situations requested.
    pub total_requested: usize,
    /// Memes made.
    pub total_generated: usize,
    /// One entry per situation.
    pub memes: Vec<BatchItem>,
}

impl From<&BatchReport> for BatchSummary {
    fn from(report: &BatchReport) -> Self {
        Self {
            total_requested: report.total,
            total_generated: report.generated,
            memes: report.results.clone(),
        }
    }
}

/// One situation per line. Blank lines and `#` comments are skipped.
pub fn parse_situations(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Runs the pipeline against a pair of providers.
pub struct MemeForge {
    providers: Providers,
    compositor: Compositor,
    store: Arc<MemeStore>,
}

impl MemeForge {
    /// Wire up the pipeline.
    pub fn new(providers: Providers, compositor: Compositor, store: MemeStore) -> Self {
        Self {
            providers,
            compositor,
            store: Arc::new(store),
        }
    }

    /// Build the pipeline from command-line settings. A missing API key is
    /// logged and left for the provider calls to fail on.
    pub fn from_args(provider: &ProviderArgs, output: &OutputArgs) -> Result<Self, ProviderError> {
        let config = ProviderConfig::from_args(provider);
        if let Err(err) = config.validate() {
            warn!("{err}");
        }
        info!(
            "Using {} at {} (text: {}, image: {})",
            config.kind, config.base_url, config.text_model, config.image_model
        );

        let compositor = Compositor::new(ComposeOptions {
            font_family: output.font.clone(),
            ..ComposeOptions::default()
        });
        Ok(Self::new(
            build_providers(&config)?,
            compositor,
            MemeStore::new(&output.output_dir),
        ))
    }

    /// Where memes are written.
    pub fn store(&self) -> &MemeStore {
        &self.store
    }

    /// Make one meme.
    pub async fn create_meme(&self, request: &MemeRequest) -> Result<MemeRecord, PipelineError> {
        info!("Creating meme for: '{}'", request.situation);

        let text = self
            .providers
            .text
            .generate_text(&caption_prompt(request))
            .await
            .map_err(|err| {
                error!("Failed to generate meme text: {err}");
                PipelineError::TextGeneration(err)
            })?;
        let caption = Caption::parse(&text);
        info!("Meme text generated: '{}' / '{}'", caption.top, caption.bottom);

        let bytes = self
            .providers
            .image
            .generate_image(&image_prompt(request, &caption))
            .await
            .map_err(|err| {
                error!("Failed to generate meme image: {err}");
                PipelineError::ImageGeneration(err)
            })?;
        info!("Meme image generated ({} bytes)", bytes.len());

        let stored = self.render_and_store(bytes, &caption, &request.situation).await?;
        info!("Meme creation complete: {}", stored.filename);

        Ok(MemeRecord {
            situation: request.situation.clone(),
            style: request.style.clone(),
            mood: request.mood.clone(),
            text,
            caption,
            image_path: self.store.dir().join(&stored.filename).display().to_string(),
            filename: stored.filename,
            url: stored.url,
            size: stored.size,
            created_at: Utc::now(),
        })
    }

    /// Decode, caption and save off the async workers. All of it is CPU or
    /// blocking filesystem work.
    async fn render_and_store(
        &self,
        bytes: Vec<u8>,
        caption: &Caption,
        situation: &str,
    ) -> Result<MemeFile, PipelineError> {
        let compositor = self.compositor.clone();
        let store = Arc::clone(&self.store);
        let caption = caption.clone();
        let situation = situation.to_string();

        tokio::task::spawn_blocking(move || {
            let base = image::load_from_memory(&bytes).map_err(|err| {
                error!("Failed to decode meme image: {err}");
                PipelineError::ImageDecode(err)
            })?;
            let meme = compositor.compose_caption(&base, &caption);
            store.save(&meme, &situation).map_err(|err| {
                error!("Failed to save meme: {err}");
                PipelineError::Storage(err)
            })
        })
        .await
        .map_err(|err| {
            error!("Meme rendering task failed: {err}");
            PipelineError::Render(err)
        })?
    }

    /// Make a meme per situation, one at a time. Failures are recorded and
    /// the batch carries on.
    pub async fn create_batch(&self, situations: &[String]) -> BatchReport {
        let total = situations.len();
        let mut results = Vec::with_capacity(total);

        for (index, situation) in situations.iter().enumerate() {
            info!("[{}/{}] Processing '{}'", index + 1, total, situation);
            let request = MemeRequest::new(situation);
            let item = match self.create_meme(&request).await {
                Ok(record) => BatchItem::Generated(record),
                Err(err) => BatchItem::Failed {
                    error: err.to_string(),
                    situation: request.situation,
                },
            };
            results.push(item);
        }

        let generated = results.iter().filter(|item| item.is_generated()).count();
        info!("Batch complete: generated {generated}/{total} memes");
        BatchReport {
            total,
            generated,
            results,
        }
    }
}
