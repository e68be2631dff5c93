//! Database Connection Manager
//!
//! Owns the bounded pool shared by the schema enumerator and every
//! fingerprint worker. A pooled client goes back to the pool when its
//! handle is dropped, so acquisition is always scoped to one unit of work.

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, PoolError, RecyclingMethod};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Bounded pool of connections to the database under verification
pub struct ConnectionPool {
    pool: Pool,
    max_size: usize,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Build the pool and establish one connection eagerly.
    ///
    /// Any failure here is a precondition failure for the whole run.
    pub async fn connect(config: &DatabaseConfig, max_size: usize) -> AppResult<Self> {
        let max_size = max_size.max(1);
        info!(
            "Initializing connection pool ({} connections) to: {}...",
            max_size,
            config.display_url()
        );

        let pool = Self::create_pool(config, max_size)?;

        // Verify the first connection before any work is scheduled
        let client = pool.get().await.map_err(AppError::pool_init)?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(AppError::pool_init)?;
        drop(client);

        info!("Connection pool initialized (TLS: {})", config.use_tls);

        Ok(Self {
            pool,
            max_size,
            closed: AtomicBool::new(false),
        })
    }

    /// Create a connection pool for the given target
    fn create_pool(config: &DatabaseConfig, max_size: usize) -> AppResult<Pool> {
        let pg_config = config.pg_config()?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = if config.use_tls {
            let certs = rustls_native_certs::load_native_certs();
            let mut root_store = rustls::RootCertStore::empty();
            for cert in certs.certs {
                root_store.add(cert).ok();
            }

            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
            Manager::from_config(pg_config, tls, mgr_config)
        } else {
            Manager::from_config(pg_config, NoTls, mgr_config)
        };

        Pool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(AppError::pool_init)
    }

    /// Wait for a pooled connection.
    ///
    /// Dropping the returned client releases it to the next waiter.
    pub async fn acquire(&self) -> Result<Client, PoolError> {
        let client = self.pool.get().await?;
        debug!("Acquired pooled connection ({} available)", self.pool.status().available);
        Ok(client)
    }

    /// Configured upper bound on concurrent connections
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Close every connection. Safe to call more than once.
    pub fn close_all(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close();
        info!("Connection pool closed");
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close_all();
    }
}
