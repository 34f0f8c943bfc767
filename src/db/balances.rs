use num_bigint::BigUint;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::tenant::TenantId;
use crate::error::WalletError;
use crate::types::{AddressType, BalanceDelta, DeltaKind};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceRow {
    pub guid: Uuid,
    pub address: String,
    pub token_address: String,
    pub address_type: String,
    pub balance: String,
    pub lock_balance: String,
    pub timestamp: i64,
}

/// Applies one ledger event to `balances_{tenant}`, lazily initializing
/// the row to zero on first observation. Addresses and token addresses
/// are lowercased before use — mismatched casing between the two sides
/// of a two-address balance update is a classic source of silently
/// duplicated rows.
pub async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    delta: &BalanceDelta,
    timestamp: i64,
) -> Result<(), WalletError> {
    let table = tenant.table("balances");
    let address = delta.address.as_str().to_lowercase();
    let token_address = delta.token_address.as_str().to_lowercase();

    let insert_sql = format!(
        "INSERT INTO {table} (guid, address, token_address, address_type, balance, lock_balance, timestamp) \
         VALUES ($1, $2, $3, $4, 0, 0, $5) ON CONFLICT (address, token_address) DO NOTHING"
    );
    sqlx::query(&insert_sql)
        .bind(Uuid::new_v4())
        .bind(&address)
        .bind(&token_address)
        .bind(delta.address_type.as_str())
        .bind(timestamp)
        .execute(&mut **tx)
        .await?;

    let amount = delta.amount.0.to_string();
    let update_sql = match delta.kind {
        DeltaKind::Credit => format!(
            "UPDATE {table} SET balance = balance + $1::numeric WHERE address = $2 AND token_address = $3"
        ),
        DeltaKind::Debit => format!(
            "UPDATE {table} SET balance = balance - $1::numeric WHERE address = $2 AND token_address = $3"
        ),
        DeltaKind::LockUp => format!(
            "UPDATE {table} SET lock_balance = lock_balance + $1::numeric WHERE address = $2 AND token_address = $3"
        ),
        DeltaKind::LockDown => format!(
            "UPDATE {table} SET lock_balance = lock_balance - $1::numeric WHERE address = $2 AND token_address = $3"
        ),
    };
    sqlx::query(&update_sql)
        .bind(&amount)
        .bind(&address)
        .bind(&token_address)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn apply_deltas(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    deltas: &[BalanceDelta],
    timestamp: i64,
) -> Result<(), WalletError> {
    for delta in deltas {
        apply_delta(tx, tenant, delta, timestamp).await?;
    }
    Ok(())
}

pub async fn query_balance(
    pool: &PgPool,
    tenant: &TenantId,
    address_type: AddressType,
    address: &str,
    token_address: &str,
) -> Result<Option<BalanceRow>, WalletError> {
    let table = tenant.table("balances");
    let sql = format!(
        "SELECT guid, address, token_address, address_type, balance::text, lock_balance::text, timestamp \
         FROM {table} WHERE address_type = $1 AND address = $2 AND token_address = $3"
    );
    let row = sqlx::query_as::<_, BalanceRow>(&sql)
        .bind(address_type.as_str())
        .bind(address.to_lowercase())
        .bind(token_address.to_lowercase())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

impl BalanceRow {
    pub fn balance_as_biguint(&self) -> Result<BigUint, WalletError> {
        self.balance
            .parse()
            .map_err(|e| WalletError::Database(sqlx::Error::Decode(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{e}"))))))
    }
}
