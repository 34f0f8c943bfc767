use std::collections::HashMap;

use crate::db::TenantId;
use crate::types::{AddressType, BlockHeader, ChainTransaction, TxType};

/// A chain transaction the synchronizer has already classified against one
/// tenant's address table. Carries enough of the owning header to let the
/// finder persist block_hash/block_number without a second RPC round trip.
#[derive(Debug, Clone)]
pub struct ClassifiedTx {
    pub header: BlockHeader,
    pub chain_tx: ChainTransaction,
    pub tx_type: TxType,
    pub from_type: Option<AddressType>,
    pub to_type: Option<AddressType>,
}

/// What the synchronizer hands to the finder once per processed header
/// batch: the raw headers (already persisted by the synchronizer) plus
/// each tenant's classified transactions from that batch.
#[derive(Debug, Clone)]
pub struct BatchMessage {
    pub headers: Vec<BlockHeader>,
    pub by_tenant: HashMap<TenantId, Vec<ClassifiedTx>>,
}
