mod cli;
mod commands;
mod error;
mod logging;

use crate::cli::Cli;
use clap::Parser;
use docshelf_library::Notice;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, retryable = err.is_retryable(), "Command failed");
            eprintln!("{}", Notice::error(err.to_string()));
            ExitCode::FAILURE
        },
    }
}
