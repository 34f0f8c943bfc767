use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use tracing::info;

use crate::config::DbConfig;
use crate::db::tenant::{TenantId, TENANT_TABLE_BASES};
use crate::error::WalletError;
use crate::retry::{with_db_retry, RetryPolicy};

/// Process-lifetime database handle, the one singleton this crate allows —
/// everything else (store, config, RPC client) is injected into worker
/// constructors instead of read from a global.
#[derive(Clone)]
pub struct Store {
    pub pool: PgPool,
}

impl Store {
    pub async fn connect(config: &DbConfig) -> Result<Self, WalletError> {
        let policy = RetryPolicy::default();
        let dsn = config.dsn();
        let pool = with_db_retry(policy, || {
            let dsn = dsn.clone();
            async move {
                PgPoolOptions::new()
                    .max_connections(16)
                    .connect(&dsn)
                    .await
                    .map_err(WalletError::from)
            }
        })
        .await?;
        Ok(Store { pool })
    }

    /// Walks `migrations_dir` in lexical order and executes each `.sql`
    /// file's content directly, rather than `sqlx::migrate!`'s tracked
    /// migration table.
    pub async fn run_migrations(&self, migrations_dir: &str) -> Result<(), WalletError> {
        let mut entries: Vec<_> = std::fs::read_dir(migrations_dir)
            .map_err(|e| WalletError::Config(format!("reading migrations dir {migrations_dir}: {e}")))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "sql").unwrap_or(false))
            .collect();
        entries.sort();

        for path in entries {
            let sql = std::fs::read_to_string(&path)
                .map_err(|e| WalletError::Config(format!("reading {}: {e}", path.display())))?;
            info!(file = %path.display(), "applying migration");
            sqlx::raw_sql(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Instantiates the per-tenant table family from the template tables.
    pub async fn create_tenant_tables(&self, tenant: &TenantId) -> Result<(), WalletError> {
        let mut tx = self.pool.begin().await?;
        for base in TENANT_TABLE_BASES {
            let real = tenant.table(base);
            let sql = format!("CREATE TABLE IF NOT EXISTS {real} (LIKE {base}_template INCLUDING ALL)");
            sqlx::raw_sql(&sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Checked by the `migrate` CLI command before connecting, so a bad
    /// path fails with a clear message instead of a `read_dir` error.
    pub fn migrations_dir_exists(dir: &str) -> bool {
        Path::new(dir).is_dir()
    }
}
