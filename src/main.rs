//! pg-rowcheck - PostgreSQL upgrade verification
//!
//! Captures a per-table fingerprint (row count, order-independent content
//! checksum, sorted primary keys) before an upgrade and reports what differs
//! afterwards:
//! - `backup`: optional `pg_dump`, then snapshot to a JSON file
//! - `compare`: fresh snapshot, reconciliation, `.xlsx` report

mod backup;
mod cli;
mod commands;
mod config;
mod connection;
mod error;
mod introspection;
mod pipeline;
mod report;
mod snapshot;

use crate::cli::{Cli, Commands};
use crate::config::{BackupConfig, Settings};
use crate::error::format_detailed;
use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format_detailed(&*e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Backup {
            connection,
            snapshot_file,
            dump_file,
            skip_dump,
            backup_mode,
            container,
        } => {
            let settings = Settings::new(
                &connection.db_url,
                &connection.db_name,
                connection.threads,
                snapshot_file,
            )?;
            let dump = (!skip_dump).then(|| BackupConfig {
                mode: backup_mode,
                container,
                dump_file,
            });

            info!("Starting pre-upgrade backup of {}", settings.database.display_url());
            commands::backup_command(&settings, dump.as_ref())
                .await
                .context("backup command failed")?;
        }
        Commands::Compare {
            connection,
            snapshot_file,
            output,
        } => {
            let settings = Settings::new(
                &connection.db_url,
                &connection.db_name,
                connection.threads,
                snapshot_file,
            )?;

            info!("Starting post-upgrade comparison of {}", settings.database.display_url());
            commands::compare_command(&settings, &output)
                .await
                .context("compare command failed")?;
        }
    }

    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,pg_rowcheck=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_level(true)
                .compact(),
        )
        .init();
}
