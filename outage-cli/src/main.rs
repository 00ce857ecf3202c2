//! Binary crate for the `outage-checker` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Resolving the address to check (argument, saved default, or prompt)
//! - Human-friendly output formatting and exit codes

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};

mod cli;
mod logging;
mod render;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cmd = match cli::Cli::try_parse() {
        Ok(cmd) => cmd,
        Err(err) => {
            err.print().ok();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    logging::init(cmd.verbose);

    match cmd.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {err:#}");
            if let Some(hint) = cli::hint(&err) {
                eprintln!("{hint}");
            }
            ExitCode::from(cli::exit_code(&err))
        }
    }
}
