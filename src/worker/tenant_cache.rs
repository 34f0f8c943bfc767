use std::time::{Duration, Instant};

use crate::db::{business, tenant::TenantId, Store};
use crate::error::WalletError;

const TENANT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Tenant list cached for a short TTL rather than queried on every tick —
/// the business table changes rarely, and each worker would otherwise pay
/// a query per tick just to find out what tenants exist. Refreshing on a
/// TTL, rather than only once at startup, means a tenant registered
/// mid-run is picked up within one cache window instead of requiring a
/// restart.
pub struct TenantCache {
    tenants: Vec<TenantId>,
    fetched_at: Option<Instant>,
}

impl TenantCache {
    pub fn new() -> Self {
        Self { tenants: vec![], fetched_at: None }
    }

    pub async fn get(&mut self, store: &Store) -> Result<&[TenantId], WalletError> {
        let stale = match self.fetched_at {
            Some(at) => at.elapsed() > TENANT_CACHE_TTL,
            None => true,
        };
        if stale {
            let businesses = business::query_business_list(&store.pool).await?;
            self.tenants = businesses
                .into_iter()
                .filter_map(|b| TenantId::parse(&b.business_uid).ok())
                .collect();
            self.fetched_at = Some(Instant::now());
        }
        Ok(&self.tenants)
    }
}

impl Default for TenantCache {
    fn default() -> Self {
        Self::new()
    }
}
