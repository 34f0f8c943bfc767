use std::sync::Arc;

use crate::error::WalletError;
use crate::rpc::client::ChainRpcClient;
use crate::types::BlockHeader;

/// Outcome of a `next_headers` call. `fallback_header` is set exactly when
/// a parent-hash mismatch was found partway through the fetch — on a
/// mismatch `headers` is always empty and the cursor is left untouched, so
/// the caller never persists a batch that precedes an unresolved reorg.
/// `is_reorg` tells the synchronizer to stop advancing the cursor and hand
/// off to the fallback worker.
pub struct NextHeadersResult {
    pub headers: Vec<BlockHeader>,
    pub fallback_header: Option<BlockHeader>,
    pub is_reorg: bool,
}

/// Owns the scan frontier (`last_traversed`) and the confirmation gap
/// that keeps the cursor from reading blocks the provider might still
/// reorg out from under it.
pub struct BatchBlock {
    rpc: Arc<dyn ChainRpcClient>,
    last_traversed: Option<BlockHeader>,
    confirmation_depth: i64,
}

impl BatchBlock {
    pub fn new(rpc: Arc<dyn ChainRpcClient>, confirmation_depth: i64, seed: Option<BlockHeader>) -> Self {
        Self {
            rpc,
            last_traversed: seed,
            confirmation_depth,
        }
    }

    pub fn last_traversed(&self) -> Option<&BlockHeader> {
        self.last_traversed.as_ref()
    }

    pub fn reseat(&mut self, header: Option<BlockHeader>) {
        self.last_traversed = header;
    }

    /// Fetches up to `max_size` contiguous headers past the cursor,
    /// confirmation-depth-gated behind the chain tip. Mirrors
    /// `rpcclient.BatchBlock.NextHeaders`: advances the cursor only over
    /// the prefix that was verified contiguous.
    pub async fn next_headers(&mut self, max_size: u32) -> Result<NextHeadersResult, WalletError> {
        let latest = self
            .rpc
            .get_block_header(None)
            .await?
            .ok_or_else(|| WalletError::Rpc("chain tip unreported".into()))?;

        let end_height = latest.number - self.confirmation_depth;
        if end_height < 0 {
            return Ok(NextHeadersResult { headers: vec![], fallback_header: None, is_reorg: false });
        }

        if let Some(last) = &self.last_traversed {
            if last.number == end_height {
                return Ok(NextHeadersResult { headers: vec![], fallback_header: None, is_reorg: false });
            }
            if last.number > end_height {
                return Err(WalletError::Rpc("cursor ahead of provider".into()));
            }
        }

        let next_height = self.last_traversed.as_ref().map(|h| h.number + 1).unwrap_or(0);
        let clamped_end = end_height.min(next_height + max_size as i64 - 1);

        let mut headers = Vec::new();
        let mut fallback_header = None;
        let mut height = next_height;
        while height <= clamped_end {
            let header = self
                .rpc
                .get_block_header(Some(height))
                .await?
                .ok_or_else(|| WalletError::Rpc(format!("missing header at height {height}")))?;

            let contiguous = if headers.is_empty() {
                match &self.last_traversed {
                    Some(last) => header.parent_hash == last.hash,
                    None => true,
                }
            } else {
                header.parent_hash == headers[headers.len() - 1].hash
            };

            if !contiguous {
                fallback_header = Some(header);
                break;
            }

            headers.push(header);
            height += 1;
        }

        let is_reorg = fallback_header.is_some();
        if is_reorg {
            return Ok(NextHeadersResult { headers: vec![], fallback_header, is_reorg });
        }
        if let Some(last) = headers.last() {
            self.last_traversed = Some(last.clone());
        }

        Ok(NextHeadersResult { headers, fallback_header, is_reorg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use num_bigint::BigUint;
    use std::sync::Mutex;

    use crate::rpc::client::UnsignedTxRequest;
    use crate::types::{Address, ChainTransaction, Hash};

    struct FakeRpc {
        headers_by_height: Mutex<Vec<BlockHeader>>,
        tip: BlockHeader,
    }

    fn h(number: i64, hash: &str, parent: &str) -> BlockHeader {
        BlockHeader {
            hash: Hash::from_hex(hash),
            parent_hash: Hash::from_hex(parent),
            number,
            timestamp: 0,
        }
    }

    #[async_trait]
    impl ChainRpcClient for FakeRpc {
        async fn get_block_header(&self, height: Option<i64>) -> Result<Option<BlockHeader>, WalletError> {
            match height {
                None => Ok(Some(self.tip.clone())),
                Some(n) => Ok(self.headers_by_height.lock().unwrap().iter().find(|h| h.number == n).cloned()),
            }
        }
        async fn get_block_info(&self, _height: i64) -> Result<Vec<ChainTransaction>, WalletError> {
            Ok(vec![])
        }
        async fn get_tx_by_hash(&self, _hash: &Hash) -> Result<Option<ChainTransaction>, WalletError> {
            Ok(None)
        }
        async fn send_raw_tx(&self, _signed_hex: &str) -> Result<Hash, WalletError> {
            Ok(Hash::from_hex("0x00"))
        }
        async fn convert_address(&self, _public_key: &str, _key_type: &str) -> Result<Address, WalletError> {
            Ok(Address::from_hex("0x00"))
        }
        async fn get_account(&self, _address: &Address) -> Result<BigUint, WalletError> {
            Ok(BigUint::from(0u32))
        }
        async fn get_fee(&self) -> Result<String, WalletError> {
            Ok(String::new())
        }
        async fn build_unsigned(&self, _request: &UnsignedTxRequest) -> Result<String, WalletError> {
            Ok(String::new())
        }
        async fn build_signed(&self, _unsigned_tx: &str, _signature: &str) -> Result<String, WalletError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn advances_cursor_over_contiguous_headers() {
        let headers = vec![h(0, "0xa", "0x0"), h(1, "0xb", "0xa"), h(2, "0xc", "0xb")];
        let rpc = Arc::new(FakeRpc { headers_by_height: Mutex::new(headers), tip: h(2, "0xc", "0xb") });
        let mut cursor = BatchBlock::new(rpc, 0, None);

        let result = cursor.next_headers(10).await.unwrap();
        assert_eq!(result.headers.len(), 3);
        assert!(!result.is_reorg);
        assert_eq!(cursor.last_traversed().unwrap().number, 2);
    }

    #[tokio::test]
    async fn respects_confirmation_depth() {
        let headers = vec![h(0, "0xa", "0x0"), h(1, "0xb", "0xa")];
        let rpc = Arc::new(FakeRpc { headers_by_height: Mutex::new(headers), tip: h(1, "0xb", "0xa") });
        let mut cursor = BatchBlock::new(rpc, 2, None);

        let result = cursor.next_headers(10).await.unwrap();
        assert!(result.headers.is_empty());
        assert!(!result.is_reorg);
    }

    #[tokio::test]
    async fn detects_reorg_on_parent_hash_mismatch() {
        let headers = vec![h(0, "0xa", "0x0"), h(1, "0xb_new", "0xwrong")];
        let rpc = Arc::new(FakeRpc { headers_by_height: Mutex::new(headers), tip: h(1, "0xb_new", "0xwrong") });
        let mut cursor = BatchBlock::new(rpc, 0, Some(h(0, "0xa", "0x0")));

        let result = cursor.next_headers(10).await.unwrap();
        assert!(result.is_reorg);
        assert!(result.fallback_header.is_some());
        assert!(result.headers.is_empty());
        assert_eq!(cursor.last_traversed().unwrap().number, 0);
    }

    #[tokio::test]
    async fn mid_batch_reorg_does_not_advance_cursor_or_leak_partial_headers() {
        // Cursor is at height 0. Heights 1 and 2 are contiguous with it and
        // with each other, but height 3 doesn't chain off height 2's hash —
        // a mismatch found partway through the fetch, not on the first header.
        let headers = vec![
            h(0, "0xa", "0x0"),
            h(1, "0xb", "0xa"),
            h(2, "0xc", "0xb"),
            h(3, "0xd", "0xwrong"),
        ];
        let rpc = Arc::new(FakeRpc { headers_by_height: Mutex::new(headers), tip: h(3, "0xd", "0xwrong") });
        let mut cursor = BatchBlock::new(rpc, 0, Some(h(0, "0xa", "0x0")));

        let result = cursor.next_headers(10).await.unwrap();
        assert!(result.is_reorg);
        assert_eq!(result.fallback_header.unwrap().number, 3);
        assert!(result.headers.is_empty(), "partial prefix must not be returned on a mid-batch reorg");
        assert_eq!(cursor.last_traversed().unwrap().number, 0, "cursor must not advance past a reorg");
    }

    #[tokio::test]
    async fn errors_when_cursor_ahead_of_provider() {
        let headers = vec![h(0, "0xa", "0x0")];
        let rpc = Arc::new(FakeRpc { headers_by_height: Mutex::new(headers), tip: h(0, "0xa", "0x0") });
        let mut cursor = BatchBlock::new(rpc, 0, Some(h(5, "0xf", "0xe")));

        let result = cursor.next_headers(10).await;
        assert!(result.is_err());
    }
}
