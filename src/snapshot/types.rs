//! Snapshot data model

use super::checksum::ContentChecksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableIdentity {
    pub schema: String,
    pub table: String,
}

impl TableIdentity {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Canonical `schema.table` key used in snapshot files
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Split a canonical key on its first dot. A key without a dot is
    /// treated as a bare table name with an empty schema.
    pub fn from_key(key: &str) -> Self {
        match key.split_once('.') {
            Some((schema, table)) => Self::new(schema, table),
            None => Self::new("", key),
        }
    }

    /// Double-quoted `"schema"."table"` for embedding in SQL
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Row count, content checksum and primary-key set of one table at one point
/// in time. A failed scan keeps the zero values and carries `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFingerprint {
    #[serde(rename = "count", default)]
    pub row_count: u64,
    #[serde(default)]
    pub checksum: ContentChecksum,
    /// Sorted ascending; duplicates are kept
    #[serde(rename = "pks", default)]
    pub primary_keys: Vec<String>,
    #[serde(rename = "pk_col", default)]
    pub primary_key_column: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TableFingerprint {
    /// Fingerprint recorded for a table whose scan failed
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Every table of one scan, keyed by canonical `schema.table`
pub type Snapshot = BTreeMap<String, TableFingerprint>;
