//! s3util CLI library
//!
//! Copies files and directory trees between the local filesystem and
//! S3-compatible object storage.
//!
//! ```text
//! s3util ./images s3://mybucket/images        # upload a directory
//! s3util s3://mybucket/logs/* ./logs          # download every key under a prefix
//! s3util s3://mybucket/report.csv .           # download a single object
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod report;

pub use error::{CliError, Result};

use clap::Parser;
use s3util_core::config::DEFAULT_PARALLELISM;
use s3util_core::{
    check_arguments, S3Store, StorageConfig, TransferConfig, TransferError, TransferOrchestrator,
};
use std::io;
use std::sync::Arc;
use tracing::{debug, info};

/// s3util - copy files to and from S3
#[derive(Parser, Debug)]
#[command(name = "s3util")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source: a local path or s3://bucket[/key]
    pub input: String,

    /// Destination: a local path or s3://bucket[/key]
    ///
    /// A source key ending in `*` downloads every object under that prefix
    /// into this directory.
    pub output: String,

    /// Maximum number of concurrent transfers
    #[arg(short = 'j', long, env = "S3UTIL_PARALLELISM", default_value_t = DEFAULT_PARALLELISM, value_parser = parse_parallelism)]
    pub parallelism: usize,

    /// Storage region (falls back to AWS_REGION, then us-east-1)
    #[arg(long, env = "S3UTIL_REGION")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint, e.g. http://localhost:9000
    #[arg(long, env = "S3UTIL_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub path_style: bool,

    /// Print the planned transfers without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the plan or outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_parallelism(value: &str) -> std::result::Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("parallelism must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    /// Effective transfer configuration: flags over environment over defaults
    pub fn transfer_config(&self) -> Result<TransferConfig> {
        let mut storage = StorageConfig::from_env();
        if let Some(region) = &self.region {
            storage = storage.with_region(region.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            storage = storage.with_endpoint(endpoint.clone());
        }
        if self.path_style {
            storage = storage.with_path_style(true);
        }

        let config = TransferConfig::new()
            .with_parallelism(self.parallelism)
            .with_storage(storage);

        config
            .validate()
            .map_err(|e| CliError::config(format!("{:#}", e)))?;

        Ok(config)
    }
}

/// Execute a parsed command line
pub async fn run(cli: &Cli) -> Result<()> {
    let direction = check_arguments(&cli.input, &cli.output)?;
    debug!(?direction, "Checked arguments");

    let config = cli.transfer_config()?;
    debug!(?config, "Resolved configuration");

    let store = S3Store::new(&config.storage)
        .await
        .map_err(TransferError::StorageInit)?;
    let orchestrator = TransferOrchestrator::new(config, Arc::new(store));

    if cli.dry_run {
        let jobs = orchestrator.plan_only(&cli.input, &cli.output).await?;
        info!(jobs = jobs.len(), "Dry run complete");
        return report::write_plan(&mut io::stdout().lock(), &jobs, cli.json);
    }

    let outcome = orchestrator.run(&cli.input, &cli.output).await?;
    report::write_outcome(
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
        &outcome,
        cli.json,
    )?;

    if outcome.is_success() {
        Ok(())
    } else {
        Err(CliError::JobsFailed {
            failed: outcome.failed.len(),
            total: outcome.total(),
        })
    }
}
