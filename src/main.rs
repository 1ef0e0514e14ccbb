use std::sync::Arc;

use clap::Parser;
use memeforge::config::setup_logging;
use memeforge::pipeline::MemeForge;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread", worker_threads = 32)]
async fn main() {
    let cli = memeforge::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let forge = match MemeForge::from_args(&cli.provider, &cli.output) {
        Ok(forge) => forge,
        Err(err) => {
            error!("Provider setup error: {}", err);
            return;
        }
    };
    info!("Memes are saved to {}", forge.store().dir().display());

    if let Err(err) =
        memeforge::web::setup_server(&cli.listen_address, cli.port, Arc::new(forge)).await
    {
        error!("Application error: {}", err);
    }
}
