//! Periodic recommendation maintenance
//!
//! Refreshes the denormalized popularity counters the candidate query sorts
//! on, then re-warms recommendation caches for recently active users.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::engine::RecommendationEngine;
use crate::config::RecommendationConfig;
use crate::database::with_retry;
use crate::error::Error;

/// Refresh denormalized like/usage counters from the interaction history.
///
/// The candidate query sorts on these counters, so they only need to be
/// eventually consistent; an hourly refresh is plenty.
pub async fn refresh_popularity_counts(pool: &PgPool) -> anyhow::Result<u64> {
    let result = with_retry(
        || async {
            sqlx::query(
                r#"
                UPDATE characters c SET
                    like_count = stats.likes,
                    usage_count = stats.uses,
                    updated_at = NOW()
                FROM (
                    SELECT character_id,
                           COUNT(*) FILTER (WHERE kind = 'like') -
                           COUNT(*) FILTER (WHERE kind = 'unlike') AS likes,
                           COUNT(*) FILTER (WHERE kind = 'use') AS uses
                    FROM character_interactions
                    GROUP BY character_id
                ) stats
                WHERE c.id = stats.character_id
                "#,
            )
            .execute(pool)
            .await
            .map_err(Error::from)
        },
        3,
        std::time::Duration::from_millis(500),
    )
    .await?;

    info!(
        "Refreshed popularity counters for {} characters",
        result.rows_affected()
    );
    Ok(result.rows_affected())
}

/// Re-warm recommendation caches for recently active users
pub async fn warm_recommendation_caches(
    pool: &PgPool,
    config: &RecommendationConfig,
) -> anyhow::Result<()> {
    let active_since = (Utc::now() - ChronoDuration::days(7)).naive_utc();

    // Users who interacted in the last 7 days
    let active_users: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT user_id FROM character_interactions WHERE created_at > $1
        UNION
        SELECT DISTINCT user_id FROM message_usage WHERE created_at > $1
        "#,
    )
    .bind(active_since)
    .fetch_all(pool)
    .await
    .unwrap_or_else(|e| {
        warn!("Failed to fetch active users: {}, skipping warmup", e);
        vec![]
    });

    if active_users.is_empty() {
        info!("No active users to warm recommendation caches for.");
        return Ok(());
    }

    info!(
        "Warming recommendation caches for {} users...",
        active_users.len()
    );

    // Bounded concurrency so the warmup doesn't saturate the pool
    let mut set = tokio::task::JoinSet::new();
    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(config.warmup_concurrency));

    // Shared engine instance (cheap to clone as it just holds a pool)
    let engine = RecommendationEngine::new(pool.clone(), config.clone());

    let total_users = active_users.len();
    for user_id in active_users {
        let engine = engine.clone();
        let permit = semaphore.clone().acquire_owned().await?;

        set.spawn(async move {
            let _permit = permit; // Hold permit until task completion
            let result = engine.get_recommendations(&user_id, 50, None, false).await;
            (user_id, result)
        });
    }

    let mut success_count = 0;
    while let Some(res) = set.join_next().await {
        match res {
            Ok((user_id, result)) => match result {
                Ok(_) => success_count += 1,
                Err(e) => warn!("Failed to warm cache for {}: {}", user_id, e),
            },
            Err(e) => error!("Task join error: {}", e),
        }
    }

    info!(
        "Recommendation caches warmed for {}/{} users",
        success_count, total_users
    );
    Ok(())
}

/// Drop cache rows that expired more than a day ago
pub async fn prune_expired_caches(pool: &PgPool) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM recommendation_cache
        WHERE expires_at < NOW() - INTERVAL '1 day'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
