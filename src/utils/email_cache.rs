use crate::utils::email_filter::normalize;
use anyhow::Result;
use futures::future::join_all;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Emails known to be registered, keyed by their normalized form.
/// Presence is the whole answer; a miss means "ask the database".
static EMAIL_CACHE: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(200_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

/// `email` must already be normalized.
pub async fn mark_taken(email: String) {
    EMAIL_CACHE.insert(email, ()).await;
}

/// `email` must already be normalized.
pub fn is_taken(email: &str) -> bool {
    EMAIL_CACHE.contains_key(email)
}

/// Preload emails of users who logged in during the last `days` days.
pub async fn warmup_email_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut chunks = sqlx::query_scalar::<_, String>(
        r#"
        SELECT email
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool)
    .chunks(batch_size.max(1));

    let mut total = 0usize;
    while let Some(chunk) = chunks.next().await {
        let emails = chunk.into_iter().collect::<Result<Vec<_>, _>>()?;
        total += emails.len();
        join_all(emails.iter().map(|e| mark_taken(normalize(e)))).await;
    }

    log::info!("Email cache warmup complete: {} recent users (last {} days)", total, days);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_email_is_taken() {
        let email = normalize("Cache-Fresh@ACE.edu");
        assert!(!is_taken(&email));
        mark_taken(email.clone()).await;
        assert!(is_taken("cache-fresh@ace.edu"));
    }

    #[actix_web::test]
    async fn keys_are_not_normalized_twice() {
        mark_taken(normalize(" Keyed@ace.edu ")).await;
        assert!(is_taken("keyed@ace.edu"));
        assert!(!is_taken(" Keyed@ace.edu "));
    }
}
