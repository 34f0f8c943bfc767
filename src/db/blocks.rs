use sqlx::{PgPool, Postgres, Transaction};

use crate::error::WalletError;
use crate::types::{BlockHeader, Hash};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockRow {
    pub hash: String,
    pub parent_hash: String,
    pub number: i64,
    pub timestamp: i64,
}

impl From<&BlockHeader> for BlockRow {
    fn from(h: &BlockHeader) -> Self {
        BlockRow {
            hash: h.hash.as_str().to_string(),
            parent_hash: h.parent_hash.as_str().to_string(),
            number: h.number,
            timestamp: h.timestamp,
        }
    }
}

pub async fn store_blocks(tx: &mut Transaction<'_, Postgres>, headers: &[BlockHeader]) -> Result<(), WalletError> {
    for h in headers {
        sqlx::query(
            "INSERT INTO blocks (hash, parent_hash, number, timestamp) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (hash) DO NOTHING",
        )
        .bind(h.hash.as_str())
        .bind(h.parent_hash.as_str())
        .bind(h.number)
        .bind(h.timestamp)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn latest_block(pool: &PgPool) -> Result<Option<BlockRow>, WalletError> {
    let row = sqlx::query_as::<_, BlockRow>(
        "SELECT hash, parent_hash, number, timestamp FROM blocks ORDER BY number DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn block_at_height(pool: &PgPool, number: i64) -> Result<Option<BlockRow>, WalletError> {
    let row = sqlx::query_as::<_, BlockRow>(
        "SELECT hash, parent_hash, number, timestamp FROM blocks WHERE number = $1",
    )
    .bind(number)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes every Block row in `[start, end]` inclusive, part of the
/// fallback worker's reorg-rollback transaction.
pub async fn delete_blocks_in_range(
    tx: &mut Transaction<'_, Postgres>,
    start: i64,
    end: i64,
) -> Result<(), WalletError> {
    sqlx::query("DELETE FROM blocks WHERE number >= $1 AND number <= $2")
        .bind(start)
        .bind(end)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl BlockRow {
    pub fn to_header(&self) -> BlockHeader {
        BlockHeader {
            hash: Hash::from_hex(&self.hash),
            parent_hash: Hash::from_hex(&self.parent_hash),
            number: self.number,
            timestamp: self.timestamp,
        }
    }
}
