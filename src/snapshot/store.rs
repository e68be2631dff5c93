//! Snapshot Store
//!
//! Persists the before-snapshot between the `backup` and `compare` runs as a
//! pretty-printed JSON object keyed by `schema.table`.

use super::types::{Snapshot, TableFingerprint};
use crate::error::{AppError, AppResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Decode one stored entry. Older files stored a bare row count.
fn decode_entry(key: &str, value: Value) -> Result<TableFingerprint, String> {
    match value {
        Value::Number(count) => count
            .as_u64()
            .map(|row_count| TableFingerprint {
                row_count,
                ..TableFingerprint::default()
            })
            .ok_or_else(|| format!("table '{}': row count {} is not a non-negative integer", key, count)),
        value => serde_json::from_value(value).map_err(|e| format!("table '{}': {}", key, e)),
    }
}

/// File-backed store for scan snapshots
pub struct SnapshotStore;

impl SnapshotStore {
    /// Write the snapshot, replacing any existing file
    pub fn save(path: &Path, snapshot: &Snapshot) -> AppResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!("Snapshot saved to {} ({} tables)", path.display(), snapshot.len());
        Ok(())
    }

    /// Read a snapshot written by `save`, or by older versions of the tool
    pub fn load(path: &Path) -> AppResult<Snapshot> {
        if !path.exists() {
            return Err(AppError::SnapshotNotFound {
                path: path.to_path_buf(),
            });
        }

        let reader = BufReader::new(File::open(path)?);
        let entries: BTreeMap<String, Value> = serde_json::from_reader(reader)
            .map_err(|e| AppError::invalid_snapshot(path, e))?;

        let snapshot = entries
            .into_iter()
            .map(|(key, value)| {
                let fingerprint = decode_entry(&key, value)?;
                Ok((key, fingerprint))
            })
            .collect::<Result<Snapshot, String>>()
            .map_err(|e| AppError::invalid_snapshot(path, e))?;

        debug!("Loaded {} tables from {}", snapshot.len(), path.display());
        Ok(snapshot)
    }
}
