use num_bigint::BigUint;
use tokio::sync::mpsc;
use tracing::info;

use crate::db::tenant::TenantId;
use crate::db::{deposits, internals, transactions, withdraws};
use crate::db::{balances, Store};
use crate::error::WalletError;
use crate::fee::DynamicFee;
use crate::retry::{with_db_retry, RetryPolicy};
use crate::rpc::ChainRpcClient;
use crate::types::{BalanceDelta, TxStatus, TxType};
use crate::worker::balance_rules::balance_deltas;
use crate::worker::batch::{BatchMessage, ClassifiedTx};
use std::sync::Arc;

/// Sole consumer of the synchronizer's channel. Persists every
/// deposit/withdraw/internal/flow row plus balance deltas for a batch in
/// one DB transaction per tenant.
pub struct Finder {
    rpc: Arc<dyn ChainRpcClient>,
    store: Store,
    receiver: mpsc::Receiver<BatchMessage>,
    confirmations: i64,
}

impl Finder {
    pub fn new(rpc: Arc<dyn ChainRpcClient>, store: Store, receiver: mpsc::Receiver<BatchMessage>, confirmations: i64) -> Self {
        Self { rpc, store, receiver, confirmations }
    }

    /// Runs until the synchronizer closes the channel on shutdown.
    pub async fn run(mut self) -> Result<(), WalletError> {
        while let Some(message) = self.receiver.recv().await {
            self.handle_batch(message).await?;
        }
        Ok(())
    }

    async fn handle_batch(&self, message: BatchMessage) -> Result<(), WalletError> {
        let block_height = message.headers.iter().map(|h| h.number).max().unwrap_or(0);
        for (tenant, txs) in &message.by_tenant {
            if txs.is_empty() {
                continue;
            }
            self.handle_tenant_batch(tenant, txs, block_height).await?;
        }
        Ok(())
    }

    async fn handle_tenant_batch(&self, tenant: &TenantId, txs: &[ClassifiedTx], block_height: i64) -> Result<(), WalletError> {
        let policy = RetryPolicy::default();
        with_db_retry(policy, || async {
            let mut tx = self.store.pool.begin().await?;
            let mut new_deposits = Vec::new();
            let mut flows = Vec::new();
            let mut deltas: Vec<BalanceDelta> = Vec::new();

            for classified in txs {
                let detail = self.rpc.get_tx_by_hash(&classified.chain_tx.hash).await.ok().flatten();
                let chain_tx = detail.unwrap_or_else(|| classified.chain_tx.clone());
                let to = chain_tx.to.clone();
                let token_address = chain_tx
                    .token_address
                    .clone()
                    .unwrap_or_else(|| crate::types::Address::from_hex("0x0000000000000000000000000000000000000000"));

                deltas.extend(balance_deltas(
                    classified.tx_type,
                    &chain_tx.from,
                    to.as_ref(),
                    &token_address,
                    &chain_tx.value,
                ));

                match classified.tx_type {
                    TxType::Deposit => {
                        new_deposits.push(deposits::NewDeposit {
                            timestamp: classified.header.timestamp,
                            block_hash: classified.header.hash.clone(),
                            block_number: classified.header.number,
                            tx_hash: chain_tx.hash.clone(),
                            from_address: chain_tx.from.as_str().to_string(),
                            to_address: to.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default(),
                            amount: chain_tx.value.to_string(),
                            gas_limit: 0,
                            fee: DynamicFee { max_fee_per_gas: chain_tx.fee.clone(), max_priority_fee_per_gas: BigUint::from(0u32) },
                            token_type: String::new(),
                            token_address: token_address.as_str().to_string(),
                            token_id: classified.chain_tx.token_id.clone().unwrap_or_default(),
                            token_meta: classified.chain_tx.token_meta.clone().unwrap_or_default(),
                        });
                    }
                    TxType::Withdraw => {
                        withdraws::mark_wallet_done_by_hash(
                            &mut tx,
                            tenant,
                            chain_tx.hash.as_str(),
                            classified.header.hash.as_str(),
                            classified.header.number,
                        )
                        .await?;
                    }
                    TxType::Collection | TxType::HotToCold | TxType::ColdToHot => {
                        internals::mark_wallet_done_by_hash(
                            &mut tx,
                            tenant,
                            chain_tx.hash.as_str(),
                            classified.header.hash.as_str(),
                            classified.header.number,
                        )
                        .await?;
                        // Clears the symmetric lock the internal worker placed on
                        // both sides at broadcast time.
                        if let (Some(to), Some(from_type), Some(to_type)) = (&to, classified.from_type, classified.to_type) {
                            deltas.push(crate::types::BalanceDelta {
                                address: chain_tx.from.clone(),
                                token_address: token_address.clone(),
                                address_type: from_type,
                                kind: crate::types::DeltaKind::LockDown,
                                amount: chain_tx.value.clone().into(),
                            });
                            deltas.push(crate::types::BalanceDelta {
                                address: to.clone(),
                                token_address: token_address.clone(),
                                address_type: to_type,
                                kind: crate::types::DeltaKind::LockDown,
                                amount: chain_tx.value.clone().into(),
                            });
                        }
                    }
                }

                flows.push(transactions::NewFlow {
                    block_hash: classified.header.hash.clone(),
                    block_number: classified.header.number,
                    hash: chain_tx.hash.clone(),
                    from_address: chain_tx.from.as_str().to_string(),
                    to_address: to.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default(),
                    token_address: token_address.as_str().to_string(),
                    token_id: classified.chain_tx.token_id.clone().unwrap_or_default(),
                    token_meta: classified.chain_tx.token_meta.clone().unwrap_or_default(),
                    fee: chain_tx.fee.to_string(),
                    amount: chain_tx.value.to_string(),
                    status: TxStatus::Success,
                    tx_type: classified.tx_type,
                    timestamp: classified.header.timestamp,
                });
            }

            deposits::store_deposits(&mut tx, tenant, &new_deposits).await?;
            deposits::update_deposit_confirms(&mut tx, tenant, block_height, self.confirmations).await?;
            balances::apply_deltas(&mut tx, tenant, &deltas, block_height).await?;
            transactions::store_transactions(&mut tx, tenant, &flows).await?;

            tx.commit().await?;
            Ok(())
        })
        .await?;

        info!(tenant = tenant.as_str(), count = txs.len(), "finder persisted batch");
        Ok(())
    }
}
