use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::notify_rows::NotifyRow;
use crate::error::WalletError;

#[derive(Debug, Clone, Serialize)]
pub struct NotifyTxn {
    pub block_hash: String,
    pub block_number: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub fee: String,
    pub tx_type: String,
    pub confirms: i16,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
}

impl From<&NotifyRow> for NotifyTxn {
    fn from(row: &NotifyRow) -> Self {
        NotifyTxn {
            block_hash: row.block_hash.clone(),
            block_number: row.block_number,
            hash: row.hash.clone(),
            from_address: row.from_address.clone(),
            to_address: row.to_address.clone(),
            value: row.amount.clone(),
            fee: row.max_fee_per_gas.clone(),
            tx_type: row.tx_type.clone(),
            confirms: row.confirms,
            token_address: row.token_address.clone(),
            token_id: row.token_id.clone(),
            token_meta: row.token_meta.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NotifyRequest {
    txn: Vec<NotifyTxn>,
}

#[derive(Debug, Deserialize)]
struct NotifyResponse {
    success: bool,
}

/// One HTTP client per tenant, created lazily and cached for reuse.
pub struct NotifyClient {
    http: reqwest::Client,
    notify_url: String,
}

impl NotifyClient {
    pub fn new(notify_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds");
        Self { http, notify_url }
    }

    /// POSTs the union of confirmed events to `{notify_url}/exchange-wallet/notify`.
    /// Returns `Ok(true)` only on a 2xx response whose body reports success.
    pub async fn notify(&self, txns: &[NotifyRow]) -> Result<bool, WalletError> {
        let body = NotifyRequest { txn: txns.iter().map(NotifyTxn::from).collect() };
        let url = format!("{}/exchange-wallet/notify", self.notify_url.trim_end_matches('/'));
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let parsed: NotifyResponse = resp.json().await.map_err(WalletError::from)?;
        Ok(parsed.success)
    }
}
