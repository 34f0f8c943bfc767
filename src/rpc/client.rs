use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Deserialize;
use std::time::Duration;

use crate::error::WalletError;
use crate::types::{Address, BlockHeader, ChainTransaction, Hash};

/// Stateless chain RPC surface. A trait so the worker pipeline can be
/// exercised against a fake in unit tests without a live node — the live
/// implementation below talks to the `chains_union_rpc` endpoint over HTTP.
#[async_trait]
pub trait ChainRpcClient: Send + Sync {
    async fn get_block_header(&self, height: Option<i64>) -> Result<Option<BlockHeader>, WalletError>;
    async fn get_block_info(&self, height: i64) -> Result<Vec<ChainTransaction>, WalletError>;
    async fn get_tx_by_hash(&self, hash: &Hash) -> Result<Option<ChainTransaction>, WalletError>;
    async fn send_raw_tx(&self, signed_hex: &str) -> Result<Hash, WalletError>;
    async fn convert_address(&self, public_key: &str, key_type: &str) -> Result<Address, WalletError>;
    async fn get_account(&self, address: &Address) -> Result<BigUint, WalletError>;
    async fn get_fee(&self) -> Result<String, WalletError>;
    async fn build_unsigned(&self, request: &UnsignedTxRequest) -> Result<String, WalletError>;
    async fn build_signed(&self, unsigned_tx: &str, signature: &str) -> Result<String, WalletError>;
}

#[derive(Debug, Clone)]
pub struct UnsignedTxRequest {
    pub chain_id: String,
    pub from: Address,
    pub to: Address,
    pub value: BigUint,
    pub contract_address: Option<Address>,
    pub token_id: Option<String>,
}

/// HTTP JSON-RPC-style client against the chains-union RPC endpoint.
/// Every call is tagged with network label `"mainnet"` and chain label
/// `"Ethereum"`, since the endpoint is a multi-chain gateway.
pub struct HttpChainRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpChainRpcClient {
    pub fn new(endpoint: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds");
        Self { http, endpoint }
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: serde_json::Value) -> Result<T, WalletError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        let envelope: JsonRpcEnvelope<T> = resp.json().await.map_err(WalletError::from)?;
        if let Some(err) = envelope.error {
            return Err(WalletError::Rpc(format!("{method} failed: {}", err.message)));
        }
        envelope.result.ok_or_else(|| WalletError::Rpc(format!("{method} returned no result")))
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcEnvelope<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireBlockHeader {
    hash: String,
    parent_hash: String,
    number: i64,
    timestamp: i64,
}

impl From<WireBlockHeader> for BlockHeader {
    fn from(w: WireBlockHeader) -> Self {
        BlockHeader {
            hash: Hash::from_hex(&w.hash),
            parent_hash: Hash::from_hex(&w.parent_hash),
            number: w.number,
            timestamp: w.timestamp,
        }
    }
}

#[async_trait]
impl ChainRpcClient for HttpChainRpcClient {
    async fn get_block_header(&self, height: Option<i64>) -> Result<Option<BlockHeader>, WalletError> {
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "height": height });
        let header: Option<WireBlockHeader> = self.call("GetBlockHeader", params).await?;
        Ok(header.map(Into::into))
    }

    async fn get_block_info(&self, height: i64) -> Result<Vec<ChainTransaction>, WalletError> {
        #[derive(Deserialize)]
        struct WireTx {
            hash: String,
            from: String,
            to: Option<String>,
            value: String,
            fee: String,
            token_address: Option<String>,
            token_id: Option<String>,
            token_meta: Option<String>,
        }
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "height": height });
        let txs: Vec<WireTx> = self.call("GetBlockInfo", params).await?;
        txs.into_iter()
            .map(|t| {
                Ok(ChainTransaction {
                    hash: Hash::from_hex(&t.hash),
                    from: Address::from_hex(&t.from),
                    to: t.to.as_deref().map(Address::from_hex),
                    value: t
                        .value
                        .parse()
                        .map_err(|_| WalletError::Rpc(format!("malformed value {:?}", t.value)))?,
                    fee: t
                        .fee
                        .parse()
                        .map_err(|_| WalletError::Rpc(format!("malformed fee {:?}", t.fee)))?,
                    token_address: t.token_address.as_deref().map(Address::from_hex),
                    token_id: t.token_id,
                    token_meta: t.token_meta,
                })
            })
            .collect()
    }

    async fn get_tx_by_hash(&self, hash: &Hash) -> Result<Option<ChainTransaction>, WalletError> {
        #[derive(Deserialize)]
        struct WireTx {
            hash: String,
            from: String,
            to: Option<String>,
            value: String,
            fee: String,
            token_address: Option<String>,
            token_id: Option<String>,
            token_meta: Option<String>,
        }
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "hash": hash.as_str() });
        let tx: Option<WireTx> = self.call("GetTxByHash", params).await?;
        tx.map(|t| {
            Ok(ChainTransaction {
                hash: Hash::from_hex(&t.hash),
                from: Address::from_hex(&t.from),
                to: t.to.as_deref().map(Address::from_hex),
                value: t.value.parse().map_err(|_| WalletError::Rpc("malformed value".into()))?,
                fee: t.fee.parse().map_err(|_| WalletError::Rpc("malformed fee".into()))?,
                token_address: t.token_address.as_deref().map(Address::from_hex),
                token_id: t.token_id,
                token_meta: t.token_meta,
            })
        })
        .transpose()
    }

    async fn send_raw_tx(&self, signed_hex: &str) -> Result<Hash, WalletError> {
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "raw_tx": signed_hex });
        let hash: String = self.call("SendRawTx", params).await?;
        Ok(Hash::from_hex(&hash))
    }

    async fn convert_address(&self, public_key: &str, key_type: &str) -> Result<Address, WalletError> {
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "type": key_type, "public_key": public_key });
        let address: String = self.call("ConvertAddress", params).await?;
        Ok(Address::from_hex(&address))
    }

    async fn get_account(&self, address: &Address) -> Result<BigUint, WalletError> {
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum", "address": address.as_str() });
        let balance: String = self.call("GetAccount", params).await?;
        balance.parse().map_err(|_| WalletError::Rpc("malformed account balance".into()))
    }

    async fn get_fee(&self) -> Result<String, WalletError> {
        let params = serde_json::json!({ "network": "mainnet", "chain": "Ethereum" });
        self.call("GetFee", params).await
    }

    async fn build_unsigned(&self, request: &UnsignedTxRequest) -> Result<String, WalletError> {
        let params = serde_json::json!({
            "network": "mainnet",
            "chain": "Ethereum",
            "chain_id": request.chain_id,
            "from": request.from.as_str(),
            "to": request.to.as_str(),
            "value": request.value.to_string(),
            "contract_address": request.contract_address.as_ref().map(Address::as_str),
            "token_id": request.token_id,
        });
        self.call("BuildUnsigned", params).await
    }

    async fn build_signed(&self, unsigned_tx: &str, signature: &str) -> Result<String, WalletError> {
        let params = serde_json::json!({ "unsigned_tx": unsigned_tx, "signature": signature });
        self.call("BuildSigned", params).await
    }
}
