use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::db::{balances, blocks, reorg_blocks, tenant::TenantId, transactions, Store};
use crate::error::WalletError;
use crate::retry::{with_db_retry, RetryPolicy};
use crate::rpc::ChainRpcClient;
use crate::types::{Address, BlockHeader, TxType};
use crate::worker::balance_rules::balance_deltas;
use crate::worker::tenant_cache::TenantCache;

/// Timer-fired; a no-op unless the synchronizer has flagged a reorg. Walks
/// backward from the mismatched header to the common ancestor, archives
/// and deletes the orphaned range, reverses its balance effects, and
/// reseats the cursor so the synchronizer can resume from solid ground.
pub struct FallbackWorker {
    rpc: Arc<dyn ChainRpcClient>,
    store: Store,
    tenants: TenantCache,
    is_fallback: Arc<AtomicBool>,
    fallback_header: Arc<Mutex<Option<BlockHeader>>>,
}

impl FallbackWorker {
    pub fn new(
        rpc: Arc<dyn ChainRpcClient>,
        store: Store,
        is_fallback: Arc<AtomicBool>,
        fallback_header: Arc<Mutex<Option<BlockHeader>>>,
    ) -> Self {
        Self { rpc, store, tenants: TenantCache::new(), is_fallback, fallback_header }
    }

    pub async fn tick(&mut self) -> Result<(), WalletError> {
        if !self.is_fallback.load(Ordering::SeqCst) {
            return Ok(());
        }
        let fb = {
            let guard = self.fallback_header.lock().unwrap();
            guard.clone()
        };
        let Some(fb) = fb else { return Ok(()) };

        info!(height = fb.number, hash = %fb.hash, "fallback worker walking back to find divergence");

        let (archived, divergence_height) = self.walk_back_to_divergence(&fb).await?;
        let range_start = divergence_height + 1;
        let range_end = fb.number;

        if archived.is_empty() {
            info!("nothing to roll back, clearing fallback flag");
            self.clear_fallback(divergence_height).await?;
            return Ok(());
        }

        let tenants = self.tenants.get(&self.store).await?.to_vec();
        self.rollback(&archived, range_start, range_end, &tenants).await?;
        self.clear_fallback(divergence_height).await?;

        info!(range_start, range_end, "fallback rollback complete, cursor reseated");
        Ok(())
    }

    /// Walks backward one block at a time starting at `fb`'s parent,
    /// returning the archived (still-orphaned) rows in descending-height
    /// order plus the height of the last block both chains agree on.
    ///
    /// `fb` itself is the mismatched header the synchronizer fetched from
    /// the chain — it was never persisted as a Block row (the batch that
    /// produced it never reached `process_batch`), so the walk starts one
    /// height below it and uses `fb.parent_hash` as the first expected
    /// hash rather than looking up a row that doesn't exist.
    async fn walk_back_to_divergence(&self, fb: &BlockHeader) -> Result<(Vec<blocks::BlockRow>, i64), WalletError> {
        if fb.number == 0 {
            return Ok((Vec::new(), 0));
        }

        let mut height = fb.number - 1;
        let mut archived = Vec::new();
        let mut expected_hash = fb.parent_hash.as_str().to_string();

        loop {
            let chain_header = match self.rpc.get_block_header(Some(height)).await? {
                Some(h) => h,
                None => break,
            };

            if chain_header.hash.as_str() == expected_hash {
                break;
            }

            let db_block = match blocks::block_at_height(&self.store.pool, height).await? {
                Some(b) => b,
                None => break,
            };
            expected_hash = db_block.parent_hash.clone();
            archived.push(db_block);

            if height == 0 {
                break;
            }
            height -= 1;
        }

        let divergence_height = height;
        Ok((archived, divergence_height))
    }

    async fn rollback(
        &self,
        archived: &[blocks::BlockRow],
        range_start: i64,
        range_end: i64,
        tenants: &[TenantId],
    ) -> Result<(), WalletError> {
        let policy = RetryPolicy::default();
        let flows_by_tenant = {
            let mut map = Vec::new();
            for tenant in tenants {
                let flows = transactions::flows_in_range(&self.store.pool, tenant, range_start, range_end).await?;
                map.push((tenant.clone(), flows));
            }
            map
        };

        with_db_retry(policy, || async {
            let mut tx = self.store.pool.begin().await?;

            reorg_blocks::store_reorg_blocks(&mut tx, archived).await?;
            blocks::delete_blocks_in_range(&mut tx, range_start, range_end).await?;

            for (tenant, flows) in &flows_by_tenant {
                for table_base in ["deposits", "withdraws", "internals", "transactions"] {
                    let table = tenant.table(table_base);
                    transactions::mark_fallback_in_range(&mut tx, &table, range_start, range_end).await?;
                }

                for flow in flows {
                    let Ok(tx_type) = parse_tx_type(&flow.tx_type) else { continue };
                    let from = Address::from_hex(&flow.from_address);
                    let to = Address::from_hex(&flow.to_address);
                    let token_address = Address::from_hex(&flow.token_address);
                    let amount: num_bigint::BigUint = match flow.amount.parse() {
                        Ok(a) => a,
                        Err(_) => continue,
                    };

                    let to_ref = if flow.to_address.is_empty() { None } else { Some(&to) };
                    let deltas = balance_deltas(tx_type, &from, to_ref, &token_address, &amount);
                    for delta in deltas {
                        let reversed = delta.negate();
                        balances::apply_delta(&mut tx, tenant, &reversed, flow.block_number).await?;
                    }
                }
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn clear_fallback(&mut self, divergence_height: i64) -> Result<(), WalletError> {
        let latest = blocks::block_at_height(&self.store.pool, divergence_height).await?;
        *self.fallback_header.lock().unwrap() = None;
        self.is_fallback.store(false, Ordering::SeqCst);
        if latest.is_none() {
            warn!(divergence_height, "no block row found at divergence height after rollback");
        }
        Ok(())
    }
}

fn parse_tx_type(s: &str) -> Result<TxType, WalletError> {
    Ok(match s {
        "deposit" => TxType::Deposit,
        "withdraw" => TxType::Withdraw,
        "collection" => TxType::Collection,
        "hot_to_cold" => TxType::HotToCold,
        "cold_to_hot" => TxType::ColdToHot,
        other => return Err(WalletError::Config(format!("unknown tx_type {other}"))),
    })
}
