use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::WalletError;
use crate::types::TxStatus;

/// Shared row shape across deposits/withdraws/internals tables — all three
/// carry the columns the notifier needs, so one set of queries covers all
/// three by taking the resolved table name as a parameter, the same trick
/// `transactions::mark_fallback_in_range` uses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotifyRow {
    pub guid: Uuid,
    pub block_hash: String,
    pub block_number: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub max_fee_per_gas: String,
    pub tx_type: String,
    pub confirms: i16,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
}

pub async fn list_by_status(pool: &PgPool, table: &str, status: TxStatus) -> Result<Vec<NotifyRow>, WalletError> {
    let sql = format!(
        "SELECT guid, block_hash, block_number, hash, from_address, to_address, amount::text, \
         max_fee_per_gas, tx_type, confirms, token_address, token_id, token_meta \
         FROM {table} WHERE status = $1"
    );
    let rows = sqlx::query_as::<_, NotifyRow>(&sql).bind(status.as_str()).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn set_status_by_guids(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    guids: &[Uuid],
    status: TxStatus,
) -> Result<(), WalletError> {
    if guids.is_empty() {
        return Ok(());
    }
    let sql = format!("UPDATE {table} SET status = $1 WHERE guid = ANY($2)");
    sqlx::query(&sql).bind(status.as_str()).bind(guids).execute(&mut **tx).await?;
    Ok(())
}
