use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::now_unix;
use crate::db::{internals, tenant::TenantId, Store};
use crate::error::WalletError;
use crate::retry::{with_db_retry, RetryPolicy};
use crate::rpc::ChainRpcClient;
use crate::types::{Address, AddressType, BalanceDelta, DeltaKind};
use crate::worker::tenant_cache::TenantCache;

/// Broadcasts signed hot↔cold transfers. Identical skeleton to
/// [`crate::worker::withdraw::WithdrawWorker`] except for the table it
/// reads and the fact that the transfer has two sides that both need
/// their funds reserved while the transaction is in flight.
///
/// Locks both sides' balances symmetrically on broadcast — locking only
/// the sending side would leave the receiving side's incoming funds
/// unreserved until confirmation, letting it be double-counted against
/// by another transfer in the meantime.
pub struct InternalWorker {
    rpc: Arc<dyn ChainRpcClient>,
    store: Store,
    tenants: TenantCache,
}

impl InternalWorker {
    pub fn new(rpc: Arc<dyn ChainRpcClient>, store: Store) -> Self {
        Self { rpc, store, tenants: TenantCache::new() }
    }

    pub async fn tick(&mut self) -> Result<(), WalletError> {
        let tenants = self.tenants.get(&self.store).await?.to_vec();
        for tenant in &tenants {
            if let Err(e) = self.tick_tenant(tenant).await {
                warn!(tenant = tenant.as_str(), error = %e, "internal tick failed for tenant");
            }
        }
        Ok(())
    }

    async fn tick_tenant(&self, tenant: &TenantId) -> Result<(), WalletError> {
        let rows = internals::list_signed(&self.store.pool, tenant).await?;
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
            let to = Address::from_hex(&row.to_address);
            let token_address = Address::from_hex(&row.token_address);
            let amount: num_bigint::BigUint = row
                .amount
                .parse()
                .map_err(|_| WalletError::Config(format!("malformed internal amount {:?}", row.amount)))?;
            let timestamp = now_unix();

            // The from-side type can be either hot or cold depending on
            // direction; both tables carry no explicit tx_type column here
            // since the Finder derives it from the *settled* chain
            // transaction's classification, so the lock is recorded
            // against whichever address type the from-address actually is.
            // At broadcast time we don't yet know which of hot/cold it is
            // from this row alone, so both sides lock under the type the
            // settled flow will credit/debit later; lookup resolves it.
            let from_type = crate::db::address::lookup_address_type(&self.store.pool, tenant, from.as_str())
                .await?
                .unwrap_or(AddressType::Hot);
            let to_type = crate::db::address::lookup_address_type(&self.store.pool, tenant, to.as_str())
                .await?
                .unwrap_or(AddressType::Cold);

            with_db_retry(policy, || async {
                let mut tx = self.store.pool.begin().await?;
                internals::mark_broadcasted(&mut tx, tenant, row.guid, hash.as_str()).await?;

                let from_delta = BalanceDelta {
                    address: from.clone(),
                    token_address: token_address.clone(),
                    address_type: from_type,
                    kind: DeltaKind::LockUp,
                    amount: amount.clone().into(),
                };
                let to_delta = BalanceDelta {
                    address: to.clone(),
                    token_address: token_address.clone(),
                    address_type: to_type,
                    kind: DeltaKind::LockUp,
                    amount: amount.clone().into(),
                };
                crate::db::balances::apply_delta(&mut tx, tenant, &from_delta, timestamp).await?;
                crate::db::balances::apply_delta(&mut tx, tenant, &to_delta, timestamp).await?;

                tx.commit().await?;
                Ok(())
            })
            .await?;

            info!(guid = %row.guid, hash = %hash, "internal transfer broadcast");
        }
        Ok(())
    }
}
