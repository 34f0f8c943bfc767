use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::now_unix;
use crate::db::{tenant::TenantId, withdraws, Store};
use crate::error::WalletError;
use crate::retry::{with_db_retry, RetryPolicy};
use crate::rpc::ChainRpcClient;
use crate::types::{Address, AddressType, BalanceDelta, DeltaKind};
use crate::worker::tenant_cache::TenantCache;

/// Broadcasts signed withdraw transactions and locks the sending hot
/// wallet's funds. Identical skeleton to [`crate::worker::internal`];
/// they differ only in which table they read and how many sides of the
/// transfer they lock.
pub struct WithdrawWorker {
    rpc: Arc<dyn ChainRpcClient>,
    store: Store,
    tenants: TenantCache,
}

impl WithdrawWorker {
    pub fn new(rpc: Arc<dyn ChainRpcClient>, store: Store) -> Self {
        Self { rpc, store, tenants: TenantCache::new() }
    }

    pub async fn tick(&mut self) -> Result<(), WalletError> {
        let tenants = self.tenants.get(&self.store).await?.to_vec();
        for tenant in &tenants {
            if let Err(e) = self.tick_tenant(tenant).await {
                warn!(tenant = tenant.as_str(), error = %e, "withdraw tick failed for tenant");
            }
        }
        Ok(())
    }

    async fn tick_tenant(&self, tenant: &TenantId) -> Result<(), WalletError> {
        let rows = withdraws::list_signed(&self.store.pool, tenant).await?;
        for row in rows {
            let hash = match self.rpc.send_raw_tx(&row.tx_sign_hex).await {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(guid = %row.guid, error = %e, "send_raw_tx failed, retrying next tick");
                    continue;
                }
            };

            let policy = RetryPolicy::default();
            let from = Address::from_hex(&row.from_address);
            let token_address = Address::from_hex(&row.token_address);
            let amount: num_bigint::BigUint = row
                .amount
                .parse()
                .map_err(|_| WalletError::Config(format!("malformed withdraw amount {:?}", row.amount)))?;

            let timestamp = now_unix();
            with_db_retry(policy, || async {
                let mut tx = self.store.pool.begin().await?;
                withdraws::mark_broadcasted(&mut tx, tenant, row.guid, hash.as_str()).await?;
                let delta = BalanceDelta {
                    address: from.clone(),
                    token_address: token_address.clone(),
                    address_type: AddressType::Hot,
                    kind: DeltaKind::LockUp,
                    amount: amount.clone().into(),
                };
                crate::db::balances::apply_delta(&mut tx, tenant, &delta, timestamp).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

            info!(guid = %row.guid, hash = %hash, "withdraw broadcast");
        }
        Ok(())
    }
}
