//! Command implementations
//!
//! Each command connects the pool before doing anything else, and closes it
//! on every exit path before returning.

use crate::backup;
use crate::config::{BackupConfig, Settings};
use crate::connection::ConnectionPool;
use crate::error::AppResult;
use crate::pipeline::{PostgresScanner, SnapshotOrchestrator};
use crate::report;
use crate::snapshot::{DiffEngine, Snapshot, SnapshotStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Optional physical dump, then a scan saved as the before-snapshot
pub async fn backup_command(settings: &Settings, dump: Option<&BackupConfig>) -> AppResult<()> {
    let pool = connect(settings).await?;
    let result = backup_steps(&pool, settings, dump).await;
    pool.close_all();
    result
}

/// Load the before-snapshot, scan again, and write the comparison report
pub async fn compare_command(settings: &Settings, output: &Path) -> AppResult<()> {
    let pool = connect(settings).await?;
    let result = compare_steps(&pool, settings, output).await;
    pool.close_all();
    result
}

/// The pool is a precondition for every command, so it comes first
async fn connect(settings: &Settings) -> AppResult<Arc<ConnectionPool>> {
    let pool = ConnectionPool::connect(&settings.database, settings.threads).await?;
    Ok(Arc::new(pool))
}

async fn backup_steps(
    pool: &Arc<ConnectionPool>,
    settings: &Settings,
    dump: Option<&BackupConfig>,
) -> AppResult<()> {
    match dump {
        Some(config) => {
            if let Err(e) = backup::run_backup(config, &settings.database).await {
                error!("Error running backup: {}", e);
                error!("Ensure pg_dump (or the '{}' container) is available.", config.container);
            }
        }
        None => info!("Skipping physical backup"),
    }

    info!("Taking pre-upgrade snapshot (with PKs)...");
    let snapshot = take_snapshot(pool).await?;
    SnapshotStore::save(&settings.snapshot_file, &snapshot)?;
    Ok(())
}

async fn compare_steps(
    pool: &Arc<ConnectionPool>,
    settings: &Settings,
    output: &Path,
) -> AppResult<()> {
    info!("Loading previous snapshot...");
    let before = SnapshotStore::load(&settings.snapshot_file)?;

    info!("Taking post-upgrade snapshot...");
    let after = take_snapshot(pool).await?;

    let records = DiffEngine::reconcile(&before, &after);
    report::write_report(&records, output)?;

    let summary = DiffEngine::summarize(&records);
    info!(
        "Compared {} tables: {} changed ({} count mismatches, {} content mismatches, {} with missing IDs, {} with added IDs)",
        summary.tables_compared,
        summary.tables_changed,
        summary.count_mismatches,
        summary.content_mismatches,
        summary.tables_with_missing_ids,
        summary.tables_with_added_ids
    );
    if summary.scan_errors > 0 {
        warn!("{} tables had scan errors; see the report for details", summary.scan_errors);
    }

    Ok(())
}

async fn take_snapshot(pool: &Arc<ConnectionPool>) -> AppResult<Snapshot> {
    let scanner = Arc::new(PostgresScanner::new(Arc::clone(pool)));
    SnapshotOrchestrator::new(scanner, pool.max_size())
        .scan()
        .await
}
