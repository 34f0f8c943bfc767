use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;
use crate::types::TxStatus;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawRow {
    pub guid: Uuid,
    pub status: String,
    pub from_address: String,
    pub to_address: String,
    pub token_address: String,
    pub amount: String,
    pub tx_sign_hex: String,
}

pub struct NewDraft {
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub unsigned_tx: String,
    pub timestamp: i64,
}

/// Persists a `BuildUnSignTransaction` draft in `create_unsigned`. The
/// worker pipeline ignores rows in this status entirely — only
/// `BuildSignedTransaction` advances them to `signed`.
pub async fn insert_draft(pool: &PgPool, tenant: &TenantId, draft: &NewDraft) -> Result<Uuid, WalletError> {
    let table = tenant.table("withdraws");
    let guid = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO {table} (guid, timestamp, status, block_hash, block_number, hash, tx_type, \
         from_address, to_address, amount, gas_limit, max_fee_per_gas, max_priority_fee_per_gas, \
         token_type, token_address, token_id, token_meta, tx_sign_hex) \
         VALUES ($1,$2,$3,'',0,'',$4,$5,$6,$7::numeric,0,'','',$8,$9,$10,$11,$12)"
    );
    sqlx::query(&sql)
        .bind(guid)
        .bind(draft.timestamp)
        .bind(TxStatus::CreateUnsigned.as_str())
        .bind(crate::types::TxType::Withdraw.as_str())
        .bind(draft.from_address.to_lowercase())
        .bind(draft.to_address.to_lowercase())
        .bind(&draft.value)
        .bind("erc20")
        .bind(draft.token_address.to_lowercase())
        .bind(&draft.token_id)
        .bind(&draft.token_meta)
        .bind(&draft.unsigned_tx)
        .execute(pool)
        .await?;
    Ok(guid)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DraftRow {
    pub guid: Uuid,
    pub status: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub unsigned_tx: String,
}

pub async fn fetch_draft(pool: &PgPool, tenant: &TenantId, guid: Uuid) -> Result<Option<DraftRow>, WalletError> {
    let table = tenant.table("withdraws");
    let sql = format!(
        "SELECT guid, status, from_address, to_address, amount::text, tx_sign_hex AS unsigned_tx FROM {table} WHERE guid = $1"
    );
    let row = sqlx::query_as::<_, DraftRow>(&sql).bind(guid).fetch_optional(pool).await?;
    Ok(row)
}

/// Stores the signed payload and advances `create_unsigned -> signed`.
pub async fn mark_signed(
    pool: &PgPool,
    tenant: &TenantId,
    guid: Uuid,
    tx_sign_hex: &str,
    max_fee_per_gas: &str,
    max_priority_fee_per_gas: &str,
) -> Result<(), WalletError> {
    let table = tenant.table("withdraws");
    let sql = format!(
        "UPDATE {table} SET status = $1, tx_sign_hex = $2, max_fee_per_gas = $3, max_priority_fee_per_gas = $4 \
         WHERE guid = $5 AND status = $6"
    );
    sqlx::query(&sql)
        .bind(TxStatus::Signed.as_str())
        .bind(tx_sign_hex)
        .bind(max_fee_per_gas)
        .bind(max_priority_fee_per_gas)
        .bind(guid)
        .bind(TxStatus::CreateUnsigned.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Rows ready to broadcast: `status = signed`.
pub async fn list_signed(pool: &PgPool, tenant: &TenantId) -> Result<Vec<WithdrawRow>, WalletError> {
    let table = tenant.table("withdraws");
    let sql = format!(
        "SELECT guid, status, from_address, to_address, token_address, amount::text, tx_sign_hex FROM {table} WHERE status = $1"
    );
    let rows = sqlx::query_as::<_, WithdrawRow>(&sql)
        .bind(TxStatus::Signed.as_str())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Marks a withdraw broadcast: records the chain-assigned hash and flips
/// status to `broadcasted`.
pub async fn mark_broadcasted(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    guid: Uuid,
    tx_hash: &str,
) -> Result<(), WalletError> {
    let table = tenant.table("withdraws");
    let sql = format!("UPDATE {table} SET status = $1, hash = $2 WHERE guid = $3");
    sqlx::query(&sql)
        .bind(TxStatus::Broadcasted.as_str())
        .bind(tx_hash)
        .bind(guid)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Sets a withdraw to `wallet_done` by tx hash once the Finder observes
/// it included in a block.
pub async fn mark_wallet_done_by_hash(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    tx_hash: &str,
    block_hash: &str,
    block_number: i64,
) -> Result<(), WalletError> {
    let table = tenant.table("withdraws");
    let sql = format!(
        "UPDATE {table} SET status = $1, block_hash = $2, block_number = $3 WHERE hash = $4 AND status = $5"
    );
    sqlx::query(&sql)
        .bind(TxStatus::WalletDone.as_str())
        .bind(block_hash)
        .bind(block_number)
        .bind(tx_hash)
        .bind(TxStatus::Broadcasted.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
