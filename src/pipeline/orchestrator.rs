//! Snapshot orchestrator
//!
//! Fans the enumerated tables out to a fixed number of concurrent fingerprint
//! tasks and assembles their results into a snapshot as they complete.

use crate::error::{AppResult, FingerprintError};
use crate::pipeline::worker::TableScanner;
use crate::snapshot::{Snapshot, TableFingerprint};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs one full scan of the database
pub struct SnapshotOrchestrator<S: TableScanner + 'static> {
    scanner: Arc<S>,
    threads: usize,
}

impl<S: TableScanner + 'static> SnapshotOrchestrator<S> {
    /// `threads` should match the connection pool size
    pub fn new(scanner: Arc<S>, threads: usize) -> Self {
        Self {
            scanner,
            threads: threads.max(1),
        }
    }

    /// Fingerprint every enumerated table.
    ///
    /// The result holds exactly one entry per enumerated table. A table whose
    /// fingerprint failed carries the failure in its `error` field.
    pub async fn scan(&self) -> AppResult<Snapshot> {
        let started = Instant::now();
        let tables = self.scanner.list_tables().await?;
        let total = tables.len();

        info!("Scanning {} tables with {} workers...", total, self.threads);

        let semaphore = Arc::new(Semaphore::new(self.threads));
        let mut tasks = JoinSet::new();

        for table in tables.iter().cloned() {
            let scanner = Arc::clone(&self.scanner);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => scanner.fingerprint(&table).await,
                    Err(e) => Err(FingerprintError::task(e)),
                };
                (table, result)
            });
        }

        let mut snapshot = Snapshot::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((table, Ok(fingerprint))) => {
                    debug!("[{}/{}] {} done", snapshot.len() + 1, total, table);
                    snapshot.insert(table.key(), fingerprint);
                }
                Ok((table, Err(e))) => {
                    warn!("Error processing {}: {}", table, e);
                    snapshot.insert(table.key(), TableFingerprint::failed(e.to_string()));
                }
                Err(e) => {
                    // Identity is recovered below from the enumerated list
                    warn!("Fingerprint task did not complete: {}", e);
                }
            }
        }

        for table in &tables {
            snapshot.entry(table.key()).or_insert_with(|| {
                TableFingerprint::failed(
                    FingerprintError::task("task panicked or was cancelled").to_string(),
                )
            });
        }

        let failures = snapshot.values().filter(|f| f.is_failed()).count();
        info!(
            "Scanned {} tables ({} failed) in {:.1}s",
            snapshot.len(),
            failures,
            started.elapsed().as_secs_f64()
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ContentChecksum, TableIdentity};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Outcome {
        Rows(Vec<&'static str>),
        Fail(&'static str),
        Panic,
    }

    struct FakeScanner {
        tables: Vec<TableIdentity>,
        outcomes: HashMap<String, Outcome>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeScanner {
        fn new(entries: Vec<(&str, &str, Outcome)>) -> Self {
            let mut tables = Vec::new();
            let mut outcomes = HashMap::new();
            for (schema, table, outcome) in entries {
                let id = TableIdentity::new(schema, table);
                outcomes.insert(id.key(), outcome);
                tables.push(id);
            }
            Self {
                tables,
                outcomes,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TableScanner for FakeScanner {
        async fn list_tables(&self) -> AppResult<Vec<TableIdentity>> {
            Ok(self.tables.clone())
        }

        async fn fingerprint(&self, table: &TableIdentity) -> Result<TableFingerprint, FingerprintError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match &self.outcomes[&table.key()] {
                Outcome::Rows(rows) => {
                    let mut keys: Vec<String> = (1..=rows.len()).map(|i| i.to_string()).collect();
                    keys.sort();
                    Ok(TableFingerprint {
                        row_count: rows.len() as u64,
                        checksum: rows.iter().copied().collect(),
                        primary_keys: keys,
                        primary_key_column: Some("id".to_string()),
                        error: None,
                    })
                }
                Outcome::Fail(msg) => Err(FingerprintError::task(msg)),
                Outcome::Panic => panic!("scanner blew up"),
            }
        }
    }

    #[tokio::test]
    async fn one_entry_per_enumerated_table() {
        let scanner = Arc::new(FakeScanner::new(vec![
            ("public", "users", Outcome::Rows(vec!["(1,a)", "(2,b)"])),
            ("public", "orders", Outcome::Rows(vec![])),
            ("audit", "log", Outcome::Rows(vec!["(1,x)"])),
        ]));

        let snapshot = SnapshotOrchestrator::new(scanner, 2).scan().await.unwrap();

        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["audit.log", "public.orders", "public.users"]);
        assert_eq!(snapshot["public.users"].row_count, 2);
        assert_eq!(
            snapshot["public.users"].checksum,
            ["(2,b)", "(1,a)"].iter().copied().collect::<ContentChecksum>()
        );
        assert!(snapshot["public.orders"].checksum.is_zero());
    }

    #[tokio::test]
    async fn failed_table_does_not_abort_scan() {
        let scanner = Arc::new(FakeScanner::new(vec![
            ("public", "good", Outcome::Rows(vec!["(1)"])),
            ("public", "bad", Outcome::Fail("permission denied for table bad")),
        ]));

        let snapshot = SnapshotOrchestrator::new(scanner, 4).scan().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot["public.good"].is_failed());
        let bad = &snapshot["public.bad"];
        assert_eq!(bad.error.as_deref(), Some("worker task failed: permission denied for table bad"));
        assert_eq!(bad.row_count, 0);
        assert!(bad.primary_keys.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_as_failure() {
        let scanner = Arc::new(FakeScanner::new(vec![
            ("public", "fine", Outcome::Rows(vec!["(1)"])),
            ("public", "boom", Outcome::Panic),
        ]));

        let snapshot = SnapshotOrchestrator::new(scanner, 2).scan().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot["public.boom"].is_failed());
        assert!(!snapshot["public.fine"].is_failed());
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_thread_count() {
        let names: Vec<String> = (0..12).map(|i| format!("t{:02}", i)).collect();
        let entries = names
            .iter()
            .map(|name| ("public", name.as_str(), Outcome::Rows(vec!["(1)"])))
            .collect();
        let scanner = Arc::new(FakeScanner::new(entries));

        let snapshot = SnapshotOrchestrator::new(Arc::clone(&scanner), 3).scan().await.unwrap();

        assert_eq!(snapshot.len(), 12);
        let peak = scanner.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {} exceeded 3", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn empty_database_yields_empty_snapshot() {
        let scanner = Arc::new(FakeScanner::new(vec![]));
        let snapshot = SnapshotOrchestrator::new(scanner, 4).scan().await.unwrap();
        assert!(snapshot.is_empty());
    }
}
