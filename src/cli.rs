//! CLI parser
use clap::{Args, Parser};
use std::num::NonZeroU16;
use std::path::PathBuf;
use url::Url;

use crate::constants::{
    DEFAULT_API_VERSION, DEFAULT_FONT_FAMILY, DEFAULT_IMAGE_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE, DEFAULT_TEXT_MODEL, GENERATED_DIR,
};
use crate::providers::ProviderKind;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MEMEFORGE_DEBUG")]
    /// Enable debug logging. Env: MEMEFORGE_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "5000", env = "MEMEFORGE_PORT")]
    /// http listener, defaults to `5000`.
    /// Env: MEMEFORGE_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MEMEFORGE_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: MEMEFORGE_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(flatten)]
    /// Where memes go and how captions look
    pub output: OutputArgs,

    #[clap(flatten)]
    /// Text and image provider settings
    pub provider: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
/// Output directory and caption font
pub struct OutputArgs {
    #[clap(long, short, default_value_os_t = GENERATED_DIR.to_path_buf(), env = "MEMEFORGE_OUTPUT_DIR")]
    /// Directory generated memes are written to and served from.
    /// Env: MEMEFORGE_OUTPUT_DIR
    pub output_dir: PathBuf,

    #[clap(long, default_value = DEFAULT_FONT_FAMILY, env = "MEMEFORGE_FONT")]
    /// Caption font family, or a path to a TTF/OTF file. Falls back to a
    /// built-in font if nothing loads.
    /// Env: MEMEFORGE_FONT
    pub font: String,
}

#[derive(Args, Debug, Clone)]
/// Provider settings shared by every binary that generates memes
pub struct ProviderArgs {
    #[clap(long, value_enum, default_value_t = ProviderKind::Dial, env = "MEMEFORGE_PROVIDER")]
    /// Which API to talk to.
    /// Env: MEMEFORGE_PROVIDER
    pub provider: ProviderKind,

    #[clap(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    /// API key for the provider.
    /// Env: AZURE_OPENAI_API_KEY
    pub api_key: Option<String>,

    #[clap(long, env = "MEMEFORGE_BASE_URL")]
    /// Override the provider's base URL.
    /// Env: MEMEFORGE_BASE_URL
    pub base_url: Option<Url>,

    #[clap(long, default_value = DEFAULT_API_VERSION, env = "MEMEFORGE_API_VERSION")]
    /// API version for Azure-style deployments.
    /// Env: MEMEFORGE_API_VERSION
    pub api_version: String,

    #[clap(long, default_value = DEFAULT_TEXT_MODEL, env = "MEMEFORGE_TEXT_MODEL")]
    /// Model (or deployment) used for caption text.
    /// Env: MEMEFORGE_TEXT_MODEL
    pub text_model: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "MEMEFORGE_IMAGE_MODEL")]
    /// Model (or deployment) used for images.
    /// Env: MEMEFORGE_IMAGE_MODEL
    pub image_model: String,

    #[clap(long, default_value_t = DEFAULT_TEMPERATURE)]
    /// Sampling temperature for caption text.
    pub temperature: f32,

    #[clap(long, default_value_t = DEFAULT_MAX_TOKENS)]
    /// Max output tokens for caption text.
    pub max_tokens: u32,

    #[clap(long, default_value = "120", env = "MEMEFORGE_TIMEOUT_SECS")]
    /// Timeout for each provider request, in seconds.
    /// Env: MEMEFORGE_TIMEOUT_SECS
    pub timeout_secs: u64,
}
