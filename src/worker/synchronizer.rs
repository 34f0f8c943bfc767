use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::db::{tenant::TenantId, Store};
use crate::error::WalletError;
use crate::rpc::{BatchBlock, ChainRpcClient};
use crate::types::BlockHeader;
use crate::worker::batch::{BatchMessage, ClassifiedTx};
use crate::worker::tenant_cache::TenantCache;

/// Drives the scan frontier and classifies transactions per tenant.
/// Writes only Block rows and cursor state — deposit/withdraw/internal/
/// flow/balance state belongs to the finder.
pub struct Synchronizer {
    rpc: Arc<dyn ChainRpcClient>,
    store: Store,
    cursor: BatchBlock,
    tenant_cache: TenantCache,
    sender: mpsc::Sender<BatchMessage>,
    is_fallback: Arc<AtomicBool>,
    fallback_header: Arc<Mutex<Option<BlockHeader>>>,
    blocks_step: u32,
    was_fallback: bool,
}

impl Synchronizer {
    pub fn new(
        rpc: Arc<dyn ChainRpcClient>,
        store: Store,
        cursor: BatchBlock,
        sender: mpsc::Sender<BatchMessage>,
        is_fallback: Arc<AtomicBool>,
        fallback_header: Arc<Mutex<Option<BlockHeader>>>,
        blocks_step: u32,
    ) -> Self {
        Self {
            rpc,
            store,
            cursor,
            tenant_cache: TenantCache::new(),
            sender,
            is_fallback,
            fallback_header,
            blocks_step,
            was_fallback: false,
        }
    }

    /// Runs one scheduled iteration. Returns `Ok(())` on any recoverable
    /// outcome (empty batch, transient RPC failure, freshly-entered
    /// fallback) — only unrecoverable send-channel closure propagates.
    pub async fn tick(&mut self) -> Result<(), WalletError> {
        if self.is_fallback.load(Ordering::SeqCst) {
            self.was_fallback = true;
            return Ok(());
        }

        if self.was_fallback {
            self.was_fallback = false;
            let latest = crate::db::blocks::latest_block(&self.store.pool).await?;
            self.cursor.reseat(latest.map(|b| b.to_header()));
            info!("cursor reseated after fallback rollback");
        }

        let next = match self.cursor.next_headers(self.blocks_step).await {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "synchronizer tick failed, retrying next tick");
                return Ok(());
            }
        };

        if next.is_reorg {
            let fb = next.fallback_header.expect("is_reorg implies fallback_header set");
            warn!(height = fb.number, hash = %fb.hash, "reorg detected, handing off to fallback worker");
            *self.fallback_header.lock().unwrap() = Some(fb);
            self.is_fallback.store(true, Ordering::SeqCst);
            return Ok(());
        }

        if next.headers.is_empty() {
            return Ok(());
        }

        self.process_batch(next.headers).await
    }

    async fn process_batch(&mut self, headers: Vec<BlockHeader>) -> Result<(), WalletError> {
        let tenants = self.tenant_cache.get(&self.store).await?.to_vec();
        let mut by_tenant: HashMap<TenantId, Vec<ClassifiedTx>> = HashMap::new();

        for header in &headers {
            let chain_txs = self.rpc.get_block_info(header.number).await?;
            for tenant in &tenants {
                for chain_tx in &chain_txs {
                    let from_type = crate::db::address::lookup_address_type(&self.store.pool, tenant, chain_tx.from.as_str()).await?;
                    let to_type = match &chain_tx.to {
                        Some(to) => crate::db::address::lookup_address_type(&self.store.pool, tenant, to.as_str()).await?,
                        None => None,
                    };
                    if from_type.is_none() && to_type.is_none() {
                        continue;
                    }
                    if let Some(tx_type) = crate::types::TxType::classify(from_type, to_type) {
                        by_tenant.entry(tenant.clone()).or_default().push(ClassifiedTx {
                            header: header.clone(),
                            chain_tx: chain_tx.clone(),
                            tx_type,
                            from_type,
                            to_type,
                        });
                    }
                }
            }
        }

        let mut tx = self.store.pool.begin().await?;
        crate::db::blocks::store_blocks(&mut tx, &headers).await?;
        tx.commit().await?;
        crate::metrics::BLOCKS_SYNCED.inc_by(headers.len() as u64);

        if by_tenant.values().any(|txs| !txs.is_empty()) {
            let message = BatchMessage { headers, by_tenant };
            self.sender
                .send(message)
                .await
                .map_err(|_| WalletError::Shutdown("finder channel closed".into()))?;
        } else {
            info!(count = headers.len(), "synced headers with no tenant-relevant transactions");
        }

        Ok(())
    }
}
