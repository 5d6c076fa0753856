use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::utils::account_filter::normalize;

/// Employee numbers known to be taken. Only positives are stored.
static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

pub async fn mark_taken(employee_number: &str) {
    TAKEN.insert(normalize(employee_number), ()).await;
}

pub async fn is_taken(employee_number: &str) -> bool {
    TAKEN.contains_key(&normalize(employee_number))
}

/// Loads accounts that logged in during the last `days` days.
pub async fn warmup(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT employee_number
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch: Vec<String> = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (employee_number,) = row?;
        batch.push(employee_number);
        total += 1;

        if batch.len() >= batch_size {
            futures::future::join_all(batch.drain(..).map(|e| async move { mark_taken(&e).await }))
                .await;
        }
    }

    if !batch.is_empty() {
        futures::future::join_all(batch.drain(..).map(|e| async move { mark_taken(&e).await }))
            .await;
    }

    tracing::info!(total, days, "Account cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_numbers_are_taken() {
        mark_taken("cache-test-42").await;
        assert!(is_taken("CACHE-TEST-42").await);
        assert!(!is_taken("cache-test-43").await);
    }
}
