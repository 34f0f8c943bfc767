use std::collections::HashMap;

use tracing::{info, warn};

use crate::db::{business, notify_rows, tenant::TenantId, Store};
use crate::error::WalletError;
use crate::notify::NotifyClient;
use crate::types::TxStatus;
use crate::worker::tenant_cache::TenantCache;

const NOTIFY_TABLES: [&str; 3] = ["deposits", "withdraws", "internals"];

/// Pushes confirmed events to each tenant's webhook under a pre/post
/// status protocol: rows flip to `notified` before the POST so a crash
/// mid-request can never double-report, and revert to `wallet_done` on
/// any failure so the next tick retries.
///
/// The tenant→client map isn't a one-time startup snapshot — it refreshes
/// alongside the shared tenant cache, so a business registered after boot
/// gets its own client within one cache window instead of requiring a
/// restart.
pub struct Notifier {
    store: Store,
    tenants: TenantCache,
    clients: HashMap<TenantId, NotifyClient>,
}

impl Notifier {
    pub fn new(store: Store) -> Self {
        Self { store, tenants: TenantCache::new(), clients: HashMap::new() }
    }

    pub async fn tick(&mut self) -> Result<(), WalletError> {
        let tenants = self.tenants.get(&self.store).await?.to_vec();
        for tenant in &tenants {
            if let Err(e) = self.tick_tenant(tenant).await {
                warn!(tenant = tenant.as_str(), error = %e, "notifier tick failed for tenant");
            }
        }
        Ok(())
    }

    async fn client_for(&mut self, tenant: &TenantId) -> Result<&NotifyClient, WalletError> {
        if !self.clients.contains_key(tenant) {
            let business = business::query_business_by_uid(&self.store.pool, tenant.as_str())
                .await?
                .ok_or_else(|| WalletError::Config(format!("no business row for tenant {}", tenant.as_str())))?;
            self.clients.insert(tenant.clone(), NotifyClient::new(business.notify_url));
        }
        Ok(self.clients.get(tenant).expect("just inserted"))
    }

    async fn tick_tenant(&mut self, tenant: &TenantId) -> Result<(), WalletError> {
        let mut rows = Vec::new();
        for table_base in NOTIFY_TABLES {
            let table = tenant.table(table_base);
            let mut table_rows = notify_rows::list_by_status(&self.store.pool, &table, TxStatus::WalletDone).await?;
            rows.append(&mut table_rows);
        }
        if rows.is_empty() {
            return Ok(());
        }

        let guids: Vec<_> = rows.iter().map(|r| r.guid).collect();
        let mut tx = self.store.pool.begin().await?;
        for table_base in NOTIFY_TABLES {
            let table = tenant.table(table_base);
            notify_rows::set_status_by_guids(&mut tx, &table, &guids, TxStatus::Notified).await?;
        }
        tx.commit().await?;

        let client = self.client_for(tenant).await?;
        let result = client.notify(&rows).await;

        let final_status = match result {
            Ok(true) => TxStatus::Success,
            Ok(false) => TxStatus::WalletDone,
            Err(e) => {
                warn!(tenant = tenant.as_str(), error = %e, "webhook post failed, reverting to wallet_done");
                TxStatus::WalletDone
            }
        };

        let mut tx = self.store.pool.begin().await?;
        for table_base in NOTIFY_TABLES {
            let table = tenant.table(table_base);
            notify_rows::set_status_by_guids(&mut tx, &table, &guids, final_status).await?;
        }
        tx.commit().await?;

        crate::metrics::NOTIFY_RESULTS
            .with_label_values(&[if final_status == TxStatus::Success { "success" } else { "retry" }])
            .inc();
        info!(tenant = tenant.as_str(), count = rows.len(), status = %final_status, "notifier tick complete");
        Ok(())
    }
}
