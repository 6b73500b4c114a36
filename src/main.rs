//! Mender CLI entry point.

use clap::Parser;

use mender::cli::{Cli, Commands};
use mender::infrastructure::{logging, ConfigLoader};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => mender::cli::handle_error(err.into(), cli.json),
    };

    logging::init(&config.logging);

    let result = match cli.command {
        Commands::Serve { port } => mender::cli::commands::serve::execute(config, port).await,
        Commands::Run {
            repository_url,
            team,
            leader,
            retries,
        } => {
            mender::cli::commands::run::execute(
                config,
                repository_url,
                team,
                leader,
                retries,
                cli.json,
            )
            .await
        }
    };

    if let Err(err) = result {
        mender::cli::handle_error(err, cli.json);
    }
}
