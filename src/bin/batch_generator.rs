//! Generate a meme for each of a list of situations and write
//! `batch_summary.json` next to them.

use anyhow::{Context, Result};
use clap::Parser;
use memeforge::cli::{OutputArgs, ProviderArgs};
use memeforge::config::setup_logging;
use memeforge::constants::WORKPLACE_SITUATIONS;
use memeforge::pipeline::{BatchItem, BatchSummary, MemeForge, parse_situations};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "batch_generator", about = "Generate memes for a list of workplace situations")]
struct Args {
    /// File with one situation per line. Uses the built-in list when omitted.
    situations: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "MEMEFORGE_DEBUG")]
    debug: bool,

    #[clap(flatten)]
    output: OutputArgs,

    #[clap(flatten)]
    provider: ProviderArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug)?;

    let situations = match &args.situations {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_situations(&text)
        }
        None => WORKPLACE_SITUATIONS.iter().map(|s| s.to_string()).collect(),
    };
    if situations.is_empty() {
        anyhow::bail!("No situations to generate memes for");
    }

    let forge = MemeForge::from_args(&args.provider, &args.output)?;
    println!("Batch meme generation started: {} memes", situations.len());
    println!("{}", "=".repeat(50));

    let report = forge.create_batch(&situations).await;
    for (index, item) in report.results.iter().enumerate() {
        match item {
            BatchItem::Generated(record) => {
                println!("[{}/{}] ok     {}", index + 1, report.total, record.filename)
            }
            BatchItem::Failed { error, situation } => {
                println!("[{}/{}] failed '{}': {}", index + 1, report.total, situation, error)
            }
        }
    }

    let path = forge
        .store()
        .write_batch_summary(&BatchSummary::from(&report))?;
    println!("\nGenerated: {}/{} memes", report.generated, report.total);
    println!("Summary saved to: {}", path.display());
    Ok(())
}
