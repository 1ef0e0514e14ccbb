//! Interactive meme maker: type a situation, get a meme.

use anyhow::Result;
use clap::Parser;
use memeforge::cli::{OutputArgs, ProviderArgs};
use memeforge::config::setup_logging;
use memeforge::pipeline::{MemeForge, MemeRequest};
use std::io::{self, BufRead, Write};

const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

#[derive(Parser, Debug)]
#[command(name = "forge", about = "Describe a work situation, get a meme")]
struct Args {
    /// Enable debug logging
    #[arg(long, env = "MEMEFORGE_DEBUG")]
    debug: bool,

    /// Image style for every meme this session
    #[arg(long)]
    style: Option<String>,

    /// Mood for every meme this session
    #[arg(long)]
    mood: Option<String>,

    #[clap(flatten)]
    output: OutputArgs,

    #[clap(flatten)]
    provider: ProviderArgs,
}

fn prompt_line(stdin: &mut impl BufRead) -> Result<Option<String>> {
    println!("\nDescribe your work situation for a meme:");
    println!("(or type 'quit' to exit)");
    print!("Situation: ");
    io::stdout().flush()?;

    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug)?;
    let forge = MemeForge::from_args(&args.provider, &args.output)?;

    println!("Welcome to Meme Forge!");
    println!("AI-powered workplace meme generator");
    println!("{}", "=".repeat(40));

    let mut stdin = io::stdin().lock();
    while let Some(situation) = prompt_line(&mut stdin)? {
        if QUIT_WORDS.contains(&situation.to_ascii_lowercase().as_str()) {
            break;
        }
        if situation.is_empty() {
            println!("Please enter a situation description!");
            continue;
        }

        let request = MemeRequest::new(&situation)
            .with_style(args.style.as_deref())
            .with_mood(args.mood.as_deref());
        match forge.create_meme(&request).await {
            Ok(record) => {
                println!("\nYour meme is ready!");
                println!("Top:    {}", record.caption.top);
                println!("Bottom: {}", record.caption.bottom);
                println!("Image saved to: {}", record.image_path);
            }
            Err(err) => println!("Error creating meme: {err}"),
        }
        println!("\n{}", "=".repeat(50));
    }

    println!("Thanks for using Meme Forge!");
    Ok(())
}
