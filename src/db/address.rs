use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;
use crate::types::AddressType;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddressRow {
    pub guid: Uuid,
    pub address: String,
    pub address_type: String,
    pub public_key: String,
    pub timestamp: i64,
}

pub struct NewAddress {
    pub address: String,
    pub address_type: AddressType,
    pub public_key: String,
    pub timestamp: i64,
}

/// Persists Address + a zeroed Balance row atomically. Callers pass an
/// open transaction so this can be composed with other writes in the
/// same unit of work.
pub async fn store_address_with_zero_balance(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    new: &NewAddress,
) -> Result<Uuid, WalletError> {
    let addr_table = tenant.table("addresses");
    let bal_table = tenant.table("balances");
    let guid = Uuid::new_v4();

    let addr_sql = format!(
        "INSERT INTO {addr_table} (guid, address, address_type, public_key, timestamp) VALUES ($1, $2, $3, $4, $5)"
    );
    sqlx::query(&addr_sql)
        .bind(guid)
        .bind(&new.address)
        .bind(new.address_type.as_str())
        .bind(&new.public_key)
        .bind(new.timestamp)
        .execute(&mut **tx)
        .await?;

    let bal_sql = format!(
        "INSERT INTO {bal_table} (guid, address, token_address, address_type, balance, lock_balance, timestamp) \
         VALUES ($1, $2, '0x0000000000000000000000000000000000000000', $3, 0, 0, $4) \
         ON CONFLICT (address, token_address) DO NOTHING"
    );
    sqlx::query(&bal_sql)
        .bind(Uuid::new_v4())
        .bind(&new.address)
        .bind(new.address_type.as_str())
        .bind(new.timestamp)
        .execute(&mut **tx)
        .await?;

    Ok(guid)
}

/// Looks up the resolved address type for a tenant's known address, used
/// by the synchronizer's per-tx classification step. Returns `Ok(None)`
/// when unknown, distinct from a DB error — conflating the two would
/// silently drop a transaction instead of surfacing the failure.
pub async fn lookup_address_type(
    pool: &PgPool,
    tenant: &TenantId,
    address: &str,
) -> Result<Option<AddressType>, WalletError> {
    let table = tenant.table("addresses");
    let sql = format!("SELECT address_type FROM {table} WHERE address = $1");
    let row: Option<(String,)> = sqlx::query_as(&sql).bind(address).fetch_optional(pool).await?;
    match row {
        Some((t,)) => Ok(Some(t.parse()?)),
        None => Ok(None),
    }
}
