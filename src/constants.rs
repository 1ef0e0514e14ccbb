//! Shared constants/setters for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// The default place we put generated memes
pub static GENERATED_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| PathBuf::from("./static/generated"));

/// URL prefix generated memes are served under
pub const GENERATED_URL_PREFIX: &str = "/static/generated";

/// Name of the JSON file a batch run leaves next to its memes.
pub const BATCH_SUMMARY_FILENAME: &str = "batch_summary.json";

/// Splits the top line from the bottom line in provider text.
pub const CAPTION_DELIMITER: &str = "---";

/// Max length of the situation slug in a meme filename.
pub const FILENAME_SLUG_MAX_LEN: usize = 40;

/// Default style when a request doesn't name one.
pub const DEFAULT_STYLE: &str = "cartoon/animation";

/// Default mood when a request doesn't name one.
pub const DEFAULT_MOOD: &str = "funny";

/// The DIAL proxy the generator talks to by default.
pub const DEFAULT_DIAL_BASE_URL: &str = "https://ai-proxy.lab.epam.com";

/// Public OpenAI API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// API version sent to Azure-style deployments.
pub const DEFAULT_API_VERSION: &str = "2025-04-01-preview";

/// Text model (or DIAL deployment) for caption generation.
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o";

/// Image model (or DIAL deployment) for image generation.
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Sampling temperature for caption generation.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Max output tokens for caption generation.
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Outbound request timeout. Image generation is slow.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// What an unconfigured `.env` template holds instead of a key.
pub const PLACEHOLDER_API_KEY: &str = "XXX";

/// Font family captions are drawn with when nothing else is asked for.
pub const DEFAULT_FONT_FAMILY: &str = "Impact";

/// Image height at which the configured outline thickness applies unscaled.
pub const OUTLINE_REFERENCE_HEIGHT: f32 = 1024.0;

/// Max age (in seconds) for image cache entries.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Shared cache max age (in seconds) for image cache entries.
pub const IMAGE_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24;

/// Cache-Control value for image responses.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}",
        IMAGE_CACHE_MAX_AGE_SECONDS, IMAGE_CACHE_S_MAXAGE_SECONDS,
    )
});

/// Situations `batch_generator` runs when no file is given.
pub const WORKPLACE_SITUATIONS: [&str; 10] = [
    "When you fix a bug but create three new ones",
    "When the client says 'quick change' on Friday at 5pm",
    "When you're the only one in a meeting who read the agenda",
    "When the internet goes down and you realize how much you depend on it",
    "When someone schedules a meeting that could have been an email",
    "When you finally understand a complex piece of legacy code",
    "When deployment works in dev but fails in production",
    "When you're asked to give an estimate without any requirements",
    "When the coffee machine breaks on Monday morning",
    "When you spend 3 hours debugging and the issue is a missing semicolon",
];
