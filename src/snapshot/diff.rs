//! Snapshot Diff Engine
//!
//! Reconciles a before-snapshot with an after-snapshot into one classified
//! record per table. A table missing from either side is compared as if it
//! were empty, so created and dropped tables need no special handling.

use super::checksum::ContentChecksum;
use super::types::{Snapshot, TableFingerprint, TableIdentity};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Reason a table is reported as changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTag {
    CountMismatch,
    ContentMismatch,
    MissingIds,
    AddedIds,
}

impl ChangeTag {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeTag::CountMismatch => "Count Mismatch",
            ChangeTag::ContentMismatch => "Content Mismatch",
            ChangeTag::MissingIds => "Missing IDs",
            ChangeTag::AddedIds => "Added IDs",
        }
    }
}

impl fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category of a detail line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKind {
    MissingIds,
    AddedIds,
    CountMismatch,
    ContentMismatch,
    ScanError,
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetailKind::MissingIds => ChangeTag::MissingIds.label(),
            DetailKind::AddedIds => ChangeTag::AddedIds.label(),
            DetailKind::CountMismatch => ChangeTag::CountMismatch.label(),
            DetailKind::ContentMismatch => ChangeTag::ContentMismatch.label(),
            DetailKind::ScanError => "Scan Error",
        };
        f.write_str(label)
    }
}

/// One finding for a table, as shown in the details sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    pub kind: DetailKind,
    pub text: String,
}

impl DiffDetail {
    fn new(kind: DetailKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Comparison result for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub schema: String,
    pub table: String,
    pub count_before: u64,
    pub count_after: u64,
    pub checksum_before: ContentChecksum,
    pub checksum_after: ContentChecksum,
    pub is_changed: bool,
    pub change_tags: BTreeSet<ChangeTag>,
    /// Keys present before and gone after, sorted ascending
    pub missing_keys: Vec<String>,
    /// Keys new after, sorted ascending
    pub added_keys: Vec<String>,
    pub details: Vec<DiffDetail>,
}

impl DiffRecord {
    pub fn has_tag(&self, tag: ChangeTag) -> bool {
        self.change_tags.contains(&tag)
    }

    /// Tags joined for display, in fixed order
    pub fn tags_label(&self) -> String {
        self.change_tags
            .iter()
            .map(ChangeTag::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Summary statistics for a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub tables_compared: usize,
    pub tables_changed: usize,
    pub count_mismatches: usize,
    pub content_mismatches: usize,
    pub tables_with_missing_ids: usize,
    pub tables_with_added_ids: usize,
    pub scan_errors: usize,
}

/// The diff engine that reconciles data snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// One record per key in the union of both snapshots, ordered by key
    pub fn reconcile(before: &Snapshot, after: &Snapshot) -> Vec<DiffRecord> {
        let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

        keys.into_iter()
            .map(|key| Self::diff_table(key, before.get(key), after.get(key)))
            .collect()
    }

    fn diff_table(
        key: &str,
        before: Option<&TableFingerprint>,
        after: Option<&TableFingerprint>,
    ) -> DiffRecord {
        let absent = TableFingerprint::default();
        let before = before.unwrap_or(&absent);
        let after = after.unwrap_or(&absent);
        let identity = TableIdentity::from_key(key);

        let before_keys: BTreeSet<&str> = before.primary_keys.iter().map(String::as_str).collect();
        let after_keys: BTreeSet<&str> = after.primary_keys.iter().map(String::as_str).collect();

        let missing_keys: Vec<String> = before_keys
            .difference(&after_keys)
            .map(|k| k.to_string())
            .collect();
        let added_keys: Vec<String> = after_keys
            .difference(&before_keys)
            .map(|k| k.to_string())
            .collect();

        let count_differs = before.row_count != after.row_count;
        let checksum_differs = before.checksum != after.checksum;
        let no_key_delta = missing_keys.is_empty() && added_keys.is_empty();

        let mut change_tags = BTreeSet::new();
        if count_differs {
            change_tags.insert(ChangeTag::CountMismatch);
        }
        // Only when the key sets cannot already explain the difference
        if !count_differs && checksum_differs && no_key_delta {
            change_tags.insert(ChangeTag::ContentMismatch);
        }
        if !missing_keys.is_empty() {
            change_tags.insert(ChangeTag::MissingIds);
        }
        if !added_keys.is_empty() {
            change_tags.insert(ChangeTag::AddedIds);
        }

        let is_changed = count_differs || checksum_differs || !no_key_delta;

        let mut details = Vec::new();
        if !missing_keys.is_empty() {
            details.push(DiffDetail::new(DetailKind::MissingIds, missing_keys.join(", ")));
        }
        if !added_keys.is_empty() {
            details.push(DiffDetail::new(DetailKind::AddedIds, added_keys.join(", ")));
        }
        if count_differs && no_key_delta {
            details.push(DiffDetail::new(
                DetailKind::CountMismatch,
                "No PK differences found (possibly duplicate PKs or no PK)",
            ));
        }
        if change_tags.contains(&ChangeTag::ContentMismatch) {
            details.push(DiffDetail::new(
                DetailKind::ContentMismatch,
                format!(
                    "Row count identical ({}), but content checksum differs.",
                    before.row_count
                ),
            ));
        }
        for (side, fingerprint) in [("before", before), ("after", after)] {
            if let Some(error) = &fingerprint.error {
                details.push(DiffDetail::new(
                    DetailKind::ScanError,
                    format!("{} scan failed: {}", side, error),
                ));
            }
        }

        DiffRecord {
            schema: identity.schema,
            table: identity.table,
            count_before: before.row_count,
            count_after: after.row_count,
            checksum_before: before.checksum.clone(),
            checksum_after: after.checksum.clone(),
            is_changed,
            change_tags,
            missing_keys,
            added_keys,
            details,
        }
    }

    /// Calculate summary statistics
    pub fn summarize(records: &[DiffRecord]) -> DiffSummary {
        let mut summary = DiffSummary {
            tables_compared: records.len(),
            ..DiffSummary::default()
        };

        for record in records {
            if record.is_changed {
                summary.tables_changed += 1;
            }
            if record.has_tag(ChangeTag::CountMismatch) {
                summary.count_mismatches += 1;
            }
            if record.has_tag(ChangeTag::ContentMismatch) {
                summary.content_mismatches += 1;
            }
            if record.has_tag(ChangeTag::MissingIds) {
                summary.tables_with_missing_ids += 1;
            }
            if record.has_tag(ChangeTag::AddedIds) {
                summary.tables_with_added_ids += 1;
            }
            if record.details.iter().any(|d| d.kind == DetailKind::ScanError) {
                summary.scan_errors += 1;
            }
        }

        summary
    }
}
