//! List generated memes, newest first.

use anyhow::Result;
use clap::Parser;
use memeforge::cli::OutputArgs;
use memeforge::pipeline::BatchSummary;
use memeforge::storage::MemeStore;

#[derive(Parser, Debug)]
#[command(name = "list_memes", about = "List generated memes")]
struct Args {
    #[clap(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let store = MemeStore::new(&args.output.output_dir);

    let memes = store.list()?;
    if memes.is_empty() {
        println!("No memes generated yet in {}", store.dir().display());
        return Ok(());
    }

    println!("Generated memes:");
    println!("{}", "=".repeat(40));
    for (index, meme) in memes.iter().enumerate() {
        println!("{}. {} ({} bytes)", index + 1, meme.filename, meme.size);
    }

    if let Some(summary) = store.read_batch_summary::<BatchSummary>()? {
        println!(
            "\nBatch summary: {}/{} memes generated",
            summary.total_generated, summary.total_requested
        );
    }
    Ok(())
}
