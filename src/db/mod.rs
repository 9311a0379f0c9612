//! Connection pooling for the PostgreSQL backend.
//!
//! [`Database`] owns the sqlx pool behind [`PgStore`]; embedded and test
//! setups use [`MemoryStore`] instead and never open one.
//!
//! [`MemoryStore`]: crate::store::MemoryStore

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::store::PgStore;

pub mod config;

pub use config::DatabaseConfig;

/// A pooled PostgreSQL connection, sized from [`DatabaseConfig`].
///
/// ```no_run
/// use courtbook::db::{Database, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), sqlx::Error> {
///     let db = Database::connect(&DatabaseConfig::from_env()).await?;
///     let _store = db.store();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Open the pool and verify the server answers before returning.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// A [`PgStore`] backed by this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(Arc::clone(&self.pool))
    }

    /// The raw pool, for schema seeding and ad hoc queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to finish.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
