//! s3util CLI - Main entry point

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use s3util_cli::{Cli, CliError};
use s3util_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Parse command-line arguments; clap exits with status 2 on usage errors
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("s3util")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn")
        .build();

    // Environment variables take precedence over flags
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {}", e);
            log_config
        }
    };

    // The CLI works without logging
    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {}", e);
            None
        }
    };

    let result = s3util_cli::run(&cli).await;

    let code = match result {
        Ok(()) => 0,
        Err(CliError::Usage(message)) => {
            drop(guard);
            Cli::command().error(ErrorKind::ArgumentConflict, message).exit()
        }
        Err(e) => {
            if e.needs_report() {
                error!(error = %e, "Command failed");
                eprintln!("Error: {}", e);
            }
            e.exit_code()
        }
    };

    // Flush file logs before exiting
    drop(guard);
    process::exit(code);
}
