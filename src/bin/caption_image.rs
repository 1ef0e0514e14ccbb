//! Burn a caption into a local image, no providers involved.

use anyhow::{Context, Result};
use clap::Parser;
use memeforge::compositor::{ComposeOptions, Compositor};
use memeforge::config::setup_logging;
use memeforge::constants::DEFAULT_FONT_FAMILY;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "caption_image", about = "Add meme text to an image file")]
struct Args {
    /// Image to caption
    input: PathBuf,

    /// Caption as `top---bottom`, or two lines
    caption: String,

    /// Where to write the result; format follows the extension
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Font family or path to a TTF/OTF file
    #[arg(long, default_value = DEFAULT_FONT_FAMILY, env = "MEMEFORGE_FONT")]
    font: String,

    /// Outline thickness at 1024px image height
    #[arg(long, default_value_t = 2)]
    outline: u32,

    /// Enable debug logging
    #[arg(long, env = "MEMEFORGE_DEBUG")]
    debug: bool,
}

fn default_output(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}_meme.png"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug)?;

    let image = image::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let compositor = Compositor::new(ComposeOptions {
        font_family: args.font.clone(),
        outline: args.outline,
        ..ComposeOptions::default()
    });
    let meme = compositor.compose(&image, &args.caption);

    let output = args.output.unwrap_or_else(|| default_output(&args.input));
    meme.save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} ({}x{}, font {})",
        output.display(),
        meme.width(),
        meme.height(),
        compositor.typeface().name()
    );
    Ok(())
}
