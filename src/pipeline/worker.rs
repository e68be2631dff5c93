//! Table fingerprint worker
//!
//! Computes one table's fingerprint on a single pooled connection inside a
//! read-only repeatable-read transaction, so the row scan and the key scan
//! see the same version of the table.

use crate::connection::ConnectionPool;
use crate::error::{AppResult, FingerprintError};
use crate::introspection::PostgresIntrospector;
use crate::snapshot::{quote_ident, ContentChecksum, TableFingerprint, TableIdentity};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, IsolationLevel};
use tracing::debug;

/// Source of tables and their fingerprints
#[async_trait]
pub trait TableScanner: Send + Sync {
    /// All user tables, ordered by (schema, table)
    async fn list_tables(&self) -> AppResult<Vec<TableIdentity>>;

    /// Fingerprint a single table
    async fn fingerprint(&self, table: &TableIdentity) -> Result<TableFingerprint, FingerprintError>;
}

/// Scanner backed by the shared connection pool
pub struct PostgresScanner {
    pool: Arc<ConnectionPool>,
}

impl PostgresScanner {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Stream every row as text, counting rows and summing digests
    async fn count_and_checksum<C: GenericClient>(
        client: &C,
        table: &TableIdentity,
    ) -> Result<(u64, ContentChecksum), tokio_postgres::Error> {
        let sql = format!("SELECT t::text FROM {} t", table.quoted());
        let rows = client
            .query_raw(sql.as_str(), std::iter::empty::<&(dyn ToSql + Sync)>())
            .await?;
        tokio::pin!(rows);

        let mut row_count = 0u64;
        let mut checksum = ContentChecksum::new();
        while let Some(row) = rows.next().await {
            let text: Option<String> = row?.try_get(0)?;
            checksum.add_row(text.as_deref().unwrap_or_default());
            row_count += 1;
        }

        Ok((row_count, checksum))
    }

    /// Every key value as text, sorted ascending, duplicates kept
    async fn primary_keys<C: GenericClient>(
        client: &C,
        table: &TableIdentity,
        column: &str,
    ) -> Result<Vec<String>, tokio_postgres::Error> {
        let sql = format!("SELECT {}::text FROM {}", quote_ident(column), table.quoted());
        let rows = client.query(sql.as_str(), &[]).await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(key) = row.try_get::<_, Option<String>>(0)? {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}

#[async_trait]
impl TableScanner for PostgresScanner {
    async fn list_tables(&self) -> AppResult<Vec<TableIdentity>> {
        PostgresIntrospector::list_tables(&self.pool).await
    }

    async fn fingerprint(&self, table: &TableIdentity) -> Result<TableFingerprint, FingerprintError> {
        let mut client = self.pool.acquire().await?;
        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await?;

        let (row_count, checksum) = Self::count_and_checksum(&*tx, table).await?;

        let primary_key_column = PostgresIntrospector::primary_key_column(&*tx, table).await?;
        let primary_keys = match &primary_key_column {
            Some(column) => Self::primary_keys(&*tx, table, column).await?,
            None => {
                debug!("{} has no primary key; key diff unavailable", table);
                Vec::new()
            }
        };

        tx.commit().await?;

        debug!(
            "{}: {} rows, checksum {}, {} keys",
            table,
            row_count,
            checksum,
            primary_keys.len()
        );

        Ok(TableFingerprint {
            row_count,
            checksum,
            primary_keys,
            primary_key_column,
            error: None,
        })
    }
}
