use sqlx::{Postgres, Transaction};

use crate::db::blocks::BlockRow;
use crate::error::WalletError;

/// Archives orphaned Block rows into `reorg_blocks` before they are
/// deleted from `blocks`, so a rolled-back chain segment is never
/// silently lost.
pub async fn store_reorg_blocks(tx: &mut Transaction<'_, Postgres>, blocks: &[BlockRow]) -> Result<(), WalletError> {
    for b in blocks {
        sqlx::query(
            "INSERT INTO reorg_blocks (hash, parent_hash, number, timestamp) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (hash) DO NOTHING",
        )
        .bind(&b.hash)
        .bind(&b.parent_hash)
        .bind(b.number)
        .bind(b.timestamp)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
