use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;

pub struct NewToken {
    pub token_address: String,
    pub decimals: i16,
    pub token_name: String,
    pub collect_amount: String,
    pub cold_amount: String,
    pub timestamp: i64,
}

/// Registers or updates a tenant's token collection/cold-transfer thresholds.
pub async fn store_tokens(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    tokens: &[NewToken],
) -> Result<(), WalletError> {
    let table = tenant.table("tokens");
    for t in tokens {
        let sql = format!(
            "INSERT INTO {table} (guid, token_address, decimals, token_name, collect_amount, cold_amount, timestamp) \
             VALUES ($1,$2,$3,$4,$5::numeric,$6::numeric,$7) \
             ON CONFLICT (token_address) DO UPDATE SET decimals = EXCLUDED.decimals, \
             token_name = EXCLUDED.token_name, collect_amount = EXCLUDED.collect_amount, cold_amount = EXCLUDED.cold_amount"
        );
        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(t.token_address.to_lowercase())
            .bind(t.decimals)
            .bind(&t.token_name)
            .bind(&t.collect_amount)
            .bind(&t.cold_amount)
            .bind(t.timestamp)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
