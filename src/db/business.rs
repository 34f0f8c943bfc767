use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WalletError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Business {
    pub guid: Uuid,
    pub business_uid: String,
    pub notify_url: String,
    pub timestamp: i64,
}

pub async fn store_business(pool: &PgPool, business_uid: &str, notify_url: &str, timestamp: i64) -> Result<Business, WalletError> {
    let business = Business {
        guid: Uuid::new_v4(),
        business_uid: business_uid.to_string(),
        notify_url: notify_url.to_string(),
        timestamp,
    };
    sqlx::query("INSERT INTO business (guid, business_uid, notify_url, timestamp) VALUES ($1, $2, $3, $4)")
        .bind(business.guid)
        .bind(&business.business_uid)
        .bind(&business.notify_url)
        .bind(business.timestamp)
        .execute(pool)
        .await?;
    Ok(business)
}

pub async fn query_business_list(pool: &PgPool) -> Result<Vec<Business>, WalletError> {
    let rows = sqlx::query_as::<_, Business>("SELECT guid, business_uid, notify_url, timestamp FROM business")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn query_business_by_uid(pool: &PgPool, business_uid: &str) -> Result<Option<Business>, WalletError> {
    let row = sqlx::query_as::<_, Business>(
        "SELECT guid, business_uid, notify_url, timestamp FROM business WHERE business_uid = $1",
    )
    .bind(business_uid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
