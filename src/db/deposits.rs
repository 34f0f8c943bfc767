use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;
use crate::fee::DynamicFee;
use crate::types::{Hash, TxStatus, TxType};

pub struct NewDeposit {
    pub timestamp: i64,
    pub block_hash: Hash,
    pub block_number: i64,
    pub tx_hash: Hash,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub gas_limit: i64,
    pub fee: DynamicFee,
    pub token_type: String,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
}

/// Appends newly classified deposits with zero confirmations; the finder
/// advances each row's confirmation count on later ticks.
pub async fn store_deposits(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    deposits: &[NewDeposit],
) -> Result<(), WalletError> {
    let table = tenant.table("deposits");
    for d in deposits {
        let sql = format!(
            "INSERT INTO {table} (guid, timestamp, status, confirms, block_hash, block_number, hash, tx_type, \
             from_address, to_address, amount, gas_limit, max_fee_per_gas, max_priority_fee_per_gas, \
             token_type, token_address, token_id, token_meta, tx_sign_hex) \
             VALUES ($1,$2,$3,0,$4,$5,$6,$7,$8,$9,$10::numeric,$11,$12,$13,$14,$15,$16,$17,'')"
        );
        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(d.timestamp)
            .bind(TxStatus::Success.as_str())
            .bind(d.block_hash.as_str())
            .bind(d.block_number)
            .bind(d.tx_hash.as_str())
            .bind(TxType::Deposit.as_str())
            .bind(d.from_address.to_lowercase())
            .bind(d.to_address.to_lowercase())
            .bind(&d.amount)
            .bind(d.gas_limit)
            .bind(d.fee.max_fee_per_gas.to_string())
            .bind(d.fee.max_priority_fee_per_gas.to_string())
            .bind(&d.token_type)
            .bind(d.token_address.to_lowercase())
            .bind(&d.token_id)
            .bind(&d.token_meta)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Advances confirmations for deposits at or below `block_height`:
/// `confirms = block_height - deposit.block_number`; once it reaches the
/// configured confirmation depth, status becomes `wallet_done`.
pub async fn update_deposit_confirms(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    block_height: i64,
    confirmations: i64,
) -> Result<(), WalletError> {
    let table = tenant.table("deposits");
    let sql = format!(
        "UPDATE {table} SET \
           confirms = LEAST($1::bigint - block_number, $2::smallint), \
           status = CASE WHEN ($1::bigint - block_number) >= $2 THEN $3 ELSE status END \
         WHERE block_number <= $1 AND status NOT IN ($4, $5)"
    );
    sqlx::query(&sql)
        .bind(block_height)
        .bind(confirmations as i16)
        .bind(TxStatus::WalletDone.as_str())
        .bind(TxStatus::Fallback.as_str())
        .bind(TxStatus::CreateUnsigned.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
