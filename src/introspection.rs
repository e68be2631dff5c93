//! Schema Introspection Module
//!
//! Catalog queries: which user tables exist, and which column (if any)
//! carries each table's primary key.

use crate::connection::ConnectionPool;
use crate::error::AppResult;
use crate::snapshot::TableIdentity;
use tokio_postgres::GenericClient;
use tracing::debug;

const LIST_TABLES_QUERY: &str = r#"
    SELECT n.nspname AS schema_name, c.relname AS table_name
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind = 'r'
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
      AND n.nspname NOT LIKE 'pg\_temp\_%'
    ORDER BY n.nspname, c.relname
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT kcu.column_name::text AS column_name
    FROM information_schema.table_constraints tco
    JOIN information_schema.key_column_usage kcu
        ON kcu.constraint_name = tco.constraint_name
        AND kcu.constraint_schema = tco.constraint_schema
    WHERE tco.constraint_type = 'PRIMARY KEY'
      AND kcu.table_schema = $1
      AND kcu.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

/// Schema introspector for PostgreSQL
pub struct PostgresIntrospector;

impl PostgresIntrospector {
    /// List every ordinary user table, ordered by (schema, table).
    ///
    /// Holds exactly one pooled connection for the duration of the call.
    pub async fn list_tables(pool: &ConnectionPool) -> AppResult<Vec<TableIdentity>> {
        let client = pool.acquire().await?;
        let rows = client.query(LIST_TABLES_QUERY, &[]).await?;
        drop(client);

        let mut tables: Vec<TableIdentity> = rows
            .iter()
            .map(|row| TableIdentity::new(row.get::<_, String>("schema_name"), row.get::<_, String>("table_name")))
            .collect();

        // Server collation may differ from byte order
        tables.sort();

        debug!("Enumerated {} user tables", tables.len());
        Ok(tables)
    }

    /// First column of the table's primary-key constraint, if it has one.
    ///
    /// Composite keys are reduced to their leading column.
    pub async fn primary_key_column<C: GenericClient>(
        client: &C,
        table: &TableIdentity,
    ) -> Result<Option<String>, tokio_postgres::Error> {
        let rows = client
            .query(PRIMARY_KEY_QUERY, &[&table.schema, &table.table])
            .await?;

        if rows.len() > 1 {
            debug!(
                "{} has a composite primary key ({} columns); using the first",
                table,
                rows.len()
            );
        }

        Ok(rows.first().map(|row| row.get("column_name")))
    }
}
