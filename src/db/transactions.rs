use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;
use crate::types::{Hash, TxStatus, TxType};

pub struct NewFlow {
    pub block_hash: Hash,
    pub block_number: i64,
    pub hash: Hash,
    pub from_address: String,
    pub to_address: String,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub fee: String,
    pub amount: String,
    pub status: TxStatus,
    pub tx_type: TxType,
    pub timestamp: i64,
}

/// Appends the audit-log flow rows.
pub async fn store_transactions(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    flows: &[NewFlow],
) -> Result<(), WalletError> {
    let table = tenant.table("transactions");
    for f in flows {
        let sql = format!(
            "INSERT INTO {table} (guid, block_hash, block_number, hash, from_address, to_address, \
             token_address, token_id, token_meta, fee, amount, status, tx_type, timestamp) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10::numeric,$11::numeric,$12,$13,$14)"
        );
        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(f.block_hash.as_str())
            .bind(f.block_number)
            .bind(f.hash.as_str())
            .bind(f.from_address.to_lowercase())
            .bind(f.to_address.to_lowercase())
            .bind(f.token_address.to_lowercase())
            .bind(&f.token_id)
            .bind(&f.token_meta)
            .bind(&f.fee)
            .bind(&f.amount)
            .bind(f.status.as_str())
            .bind(f.tx_type.as_str())
            .bind(f.timestamp)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlowRow {
    pub from_address: String,
    pub to_address: String,
    pub token_address: String,
    pub amount: String,
    pub tx_type: String,
    pub block_number: i64,
}

/// Flow rows for a block-number range, used by the fallback worker to
/// reconstruct the balance deltas to reverse.
pub async fn flows_in_range(
    pool: &PgPool,
    tenant: &TenantId,
    start: i64,
    end: i64,
) -> Result<Vec<FlowRow>, WalletError> {
    let table = tenant.table("transactions");
    let sql = format!(
        "SELECT from_address, to_address, token_address, amount::text, tx_type, block_number \
         FROM {table} WHERE block_number >= $1 AND block_number <= $2"
    );
    let rows = sqlx::query_as::<_, FlowRow>(&sql).bind(start).bind(end).fetch_all(pool).await?;
    Ok(rows)
}

/// Sets `status = fallback` on flow/deposit/withdraw/internal rows whose
/// `block_number` falls in `[start, end]`. All four per-tenant tables
/// share this column shape, so one helper covers all of them.
pub async fn mark_fallback_in_range(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    start: i64,
    end: i64,
) -> Result<(), WalletError> {
    let sql = format!(
        "UPDATE {table} SET status = $1 WHERE block_number >= $2 AND block_number <= $3"
    );
    sqlx::query(&sql)
        .bind(TxStatus::Fallback.as_str())
        .bind(start)
        .bind(end)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
