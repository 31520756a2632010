//! Recommendation Engine
//!
//! Core algorithm for ranking shareable characters. Combines popularity,
//! per-user affinity signals, editorial boosts and diversification into a
//! single deterministic ordering.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::cmp::Ordering;
use tracing::debug;

use super::signals::RecommendationSignals;
use crate::config::RecommendationConfig;

/// Candidates below this count are scored sequentially; rayon overhead
/// isn't worth it for small batches
const PARALLEL_SCORING_THRESHOLD: usize = 256;

/// A candidate character, as loaded from storage
///
/// Ranking treats these as read-only input and returns a new ordered list
/// without mutating them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CharacterCandidate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub creator_id: String,
    pub usage_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub featured: bool,
    pub is_nsfw: bool,
}

/// A scored recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCharacter {
    #[serde(flatten)]
    pub candidate: CharacterCandidate,
    pub score: f64,
    pub reason: RecommendationReason,
}

/// Why this character was recommended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Matches the user's accumulated (category, creator) affinity
    Affinity { category: String, creator_id: String },
    /// Editorially featured
    Featured,
    /// Broadly popular with other users
    Popular,
    /// No strong signal; surfaced for variety
    Discovery,
}

/// Scoring weights (can be tuned)
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    /// Log-scaled chat count weight
    pub usage: f64,
    /// Log-scaled like count weight; likes are the stronger signal
    pub likes: f64,
    /// Multiplier on accumulated affinity weight
    pub affinity: f64,
    /// Flat boost for featured characters
    pub featured_boost: f64,
    /// Flat penalty for characters the user already liked
    pub liked_penalty: f64,
    /// Weight of the recency decay term
    pub recency: f64,
    /// Recency e-folding time in hours
    pub recency_decay_hours: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            usage: 1.0,
            likes: 2.0,
            affinity: 1.5,
            featured_boost: 1.25,
            // Large enough to demote previously-liked characters below
            // otherwise-equal fresh ones, small enough not to bury them
            liked_penalty: 4.0,
            recency: 0.5,
            recency_decay_hours: 168.0,
        }
    }
}

// ---- Pure ranking core ----

/// Rank candidates for a user, best first.
///
/// Deterministic and stable: no randomness, no wall clock (recency decays
/// against the newest candidate's timestamp), and candidates with equal
/// scores keep their input order. Same candidates + same signals always
/// produce the same order, so results are safe to cache upstream.
///
/// Empty candidate lists return empty; empty signals fall back to a pure
/// popularity/featured/recency ordering.
pub fn rank_characters(
    candidates: &[CharacterCandidate],
    signals: &RecommendationSignals,
) -> Vec<CharacterCandidate> {
    rank_characters_weighted(candidates, signals, &ScoringWeights::default())
        .into_iter()
        .map(|scored| scored.candidate)
        .collect()
}

/// Rank candidates with explicit weights, keeping scores and reasons
pub fn rank_characters_weighted(
    candidates: &[CharacterCandidate],
    signals: &RecommendationSignals,
    weights: &ScoringWeights,
) -> Vec<ScoredCharacter> {
    // Recency reference: the newest candidate, never the wall clock
    let Some(newest) = candidates.iter().map(|c| c.created_at).max() else {
        return Vec::new();
    };

    // Indexed parallel map preserves input order, so the stable sort below
    // sees candidates in their original sequence
    let scores: Vec<(f64, RecommendationReason)> =
        if candidates.len() >= PARALLEL_SCORING_THRESHOLD {
            use rayon::prelude::*;
            candidates
                .par_iter()
                .map(|c| score_candidate(c, signals, newest, weights))
                .collect()
        } else {
            candidates
                .iter()
                .map(|c| score_candidate(c, signals, newest, weights))
                .collect()
        };

    let mut scored: Vec<ScoredCharacter> = candidates
        .iter()
        .zip(scores)
        .map(|(candidate, (score, reason))| ScoredCharacter {
            candidate: candidate.clone(),
            score,
            reason,
        })
        .collect();

    // Stable sort: ties keep their input order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    scored
}

/// Score a single candidate against the user's signals
fn score_candidate(
    candidate: &CharacterCandidate,
    signals: &RecommendationSignals,
    newest: DateTime<Utc>,
    weights: &ScoringWeights,
) -> (f64, RecommendationReason) {
    // Log-scaled popularity: both counts matter without swamping affinity
    let usage_term = (1.0 + candidate.usage_count.max(0) as f64).ln() * weights.usage;
    let likes_term = (1.0 + candidate.like_count.max(0) as f64).ln() * weights.likes;
    let popularity = usage_term + likes_term;

    let affinity_weight = signals.affinity_for(&candidate.category, &candidate.creator_id);
    let affinity = affinity_weight * weights.affinity;

    let featured = if candidate.featured {
        weights.featured_boost
    } else {
        0.0
    };

    let recency = recency_score(candidate.created_at, newest, weights.recency_decay_hours)
        * weights.recency;

    let penalty = if signals.has_liked(&candidate.id) {
        weights.liked_penalty
    } else {
        0.0
    };

    let score = popularity + affinity + featured + recency - penalty;

    // Primary reason: the strongest contributing term
    let reason = if affinity > 0.0 && affinity >= featured && affinity >= popularity {
        RecommendationReason::Affinity {
            category: candidate.category.clone(),
            creator_id: candidate.creator_id.clone(),
        }
    } else if candidate.featured && featured >= popularity {
        RecommendationReason::Featured
    } else if popularity > 1.0 {
        RecommendationReason::Popular
    } else {
        RecommendationReason::Discovery
    };

    (score, reason)
}

/// Exponential decay relative to the newest candidate
///
/// Candidates timestamped after the reference (clock skew in the source
/// rows) clamp to full freshness.
fn recency_score(created_at: DateTime<Utc>, newest: DateTime<Utc>, decay_hours: f64) -> f64 {
    let age_hours = (newest - created_at).num_minutes().max(0) as f64 / 60.0;
    (-age_hours / decay_hours).exp()
}

// ---- DB-facing engine ----

/// Main recommendation engine
#[derive(Clone)]
pub struct RecommendationEngine {
    pool: PgPool,
    weights: ScoringWeights,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(pool: PgPool, config: RecommendationConfig) -> Self {
        Self {
            pool,
            weights: ScoringWeights::default(),
            config,
        }
    }

    #[allow(dead_code)]
    pub fn with_weights(pool: PgPool, config: RecommendationConfig, weights: ScoringWeights) -> Self {
        Self {
            pool,
            weights,
            config,
        }
    }

    /// Get personalized recommendations for a user
    ///
    /// Loads the user's interaction signals, scores candidates off the async
    /// runtime, and caches the result. This is the main method behind the
    /// recommendations endpoint.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        limit: usize,
        category_filter: Option<&str>,
        include_nsfw: bool,
    ) -> Result<Vec<ScoredCharacter>> {
        use super::quality::PerformanceTimer;
        let _timer = PerformanceTimer::new("get_recommendations");

        // Check cache first; personalized feeds only (category filters and
        // NSFW opt-ins bypass the cache)
        if category_filter.is_none() && !include_nsfw {
            if let Some(cached) =
                get_cached_recommendations(&self.pool, user_id, "personalized").await?
            {
                if cached.len() >= limit {
                    metrics::counter!("mira_recommendation_cache_hits").increment(1);
                    return Ok(cached.into_iter().take(limit).collect());
                }
            }
        }

        let signals = super::interactions::load_signals(
            &self.pool,
            user_id,
            self.config.signal_window_days,
        )
        .await?;

        // Fetch more candidates than requested for better diversity
        let fetch_multiplier = if limit < 20 { 5 } else { 3 };
        let fetch_limit = (limit * fetch_multiplier).min(self.config.max_candidates);
        let candidates = self
            .get_candidates(category_filter, include_nsfw, fetch_limit)
            .await?;

        // CPU-bound scoring runs on the blocking pool so it doesn't stall
        // the async runtime
        let weights = self.weights.clone();
        let scored = tokio::task::spawn_blocking(move || {
            let _scoring_timer = PerformanceTimer::new("candidate_scoring");
            rank_characters_weighted(&candidates, &signals, &weights)
        })
        .await?;

        let result: Vec<ScoredCharacter> = scored.into_iter().take(limit).collect();

        if category_filter.is_none() && !include_nsfw {
            let ttl_minutes = (self.config.cache_ttl.as_secs() / 60).max(1) as i64;
            let _ =
                cache_recommendations(&self.pool, user_id, "personalized", &result, ttl_minutes)
                    .await;
        }

        metrics::counter!("mira_recommendations_served").increment(result.len() as u64);
        debug!(
            "Generated {} recommendations for user {}",
            result.len(),
            user_id
        );

        Ok(result)
    }

    /// Get trending characters: the personalized ranking with no signals,
    /// which degrades to popularity + featured + recency
    pub async fn get_trending(
        &self,
        limit: usize,
        category_filter: Option<&str>,
    ) -> Result<Vec<ScoredCharacter>> {
        let fetch_limit = (limit * 3).min(self.config.max_candidates);
        let candidates = self
            .get_candidates(category_filter, false, fetch_limit)
            .await?;

        let weights = self.weights.clone();
        let scored = tokio::task::spawn_blocking(move || {
            rank_characters_weighted(&candidates, &RecommendationSignals::default(), &weights)
        })
        .await?;

        Ok(scored.into_iter().take(limit).collect())
    }

    /// Fetch candidate characters for ranking
    ///
    /// Recent and broadly popular characters make the candidate pool; the
    /// scoring pass personalizes the order.
    async fn get_candidates(
        &self,
        category_filter: Option<&str>,
        include_nsfw: bool,
        limit: usize,
    ) -> Result<Vec<CharacterCandidate>> {
        let candidates = sqlx::query_as::<_, CharacterCandidate>(
            r#"
            SELECT id::text, name, category, creator_id,
                   usage_count, like_count, created_at, featured, is_nsfw
            FROM characters
            WHERE is_deleted = false
            AND is_public = true
            AND ($1::text IS NULL OR category = $1)
            AND ($2 OR is_nsfw = false)
            ORDER BY
                (like_count + usage_count * 2) DESC,
                created_at DESC
            LIMIT $3
            "#,
        )
        .bind(category_filter)
        .bind(include_nsfw)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }
}

// ---- Response cache ----

/// Cache recommendations for faster serving
pub async fn cache_recommendations(
    pool: &PgPool,
    user_id: &str,
    feed_type: &str,
    recommendations: &[ScoredCharacter],
    ttl_minutes: i64,
) -> Result<()> {
    let expires_at = Utc::now() + chrono::Duration::minutes(ttl_minutes);
    let recommendations_json = serde_json::to_value(recommendations)?;

    sqlx::query(
        r#"
        INSERT INTO recommendation_cache
            (id, user_id, feed_type, recommendations, computed_at, expires_at, version)
        VALUES
            (gen_random_uuid(), $1, $2, $3, NOW(), $4, 1)
        ON CONFLICT (user_id, feed_type) DO UPDATE SET
            recommendations = $3,
            computed_at = NOW(),
            expires_at = $4,
            version = recommendation_cache.version + 1
        "#,
    )
    .bind(user_id)
    .bind(feed_type)
    .bind(&recommendations_json)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get cached recommendations if still valid
pub async fn get_cached_recommendations(
    pool: &PgPool,
    user_id: &str,
    feed_type: &str,
) -> Result<Option<Vec<ScoredCharacter>>> {
    let result = sqlx::query_scalar::<_, serde_json::Value>(
        r#"
        SELECT recommendations
        FROM recommendation_cache
        WHERE user_id = $1
        AND feed_type = $2
        AND expires_at > NOW()
        "#,
    )
    .bind(user_id)
    .bind(feed_type)
    .fetch_optional(pool)
    .await?;

    match result {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::signals::{build_signals, InteractionItem};
    use chrono::TimeZone;

    fn candidate(id: &str, category: &str, creator: &str) -> CharacterCandidate {
        CharacterCandidate {
            id: id.to_string(),
            name: format!("Character {}", id),
            category: category.to_string(),
            creator_id: creator.to_string(),
            usage_count: 100,
            like_count: 20,
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            featured: false,
            is_nsfw: false,
        }
    }

    fn liked_item(id: &str, category: &str, creator: &str, weight: f64) -> InteractionItem {
        InteractionItem {
            id: id.to_string(),
            category: category.to_string(),
            created_by_id: creator.to_string(),
            weight,
        }
    }

    #[test]
    fn test_empty_candidates_rank_empty() {
        let signals = RecommendationSignals::default();
        assert!(rank_characters(&[], &signals).is_empty());
    }

    #[test]
    fn test_empty_signals_order_by_popularity() {
        let mut popular = candidate("c1", "anime", "creator-1");
        popular.usage_count = 10_000;
        popular.like_count = 2_000;
        let obscure = candidate("c2", "anime", "creator-2");

        let ranked = rank_characters(
            &[obscure.clone(), popular.clone()],
            &RecommendationSignals::default(),
        );
        assert_eq!(ranked[0].id, "c1");
        assert_eq!(ranked[1].id, "c2");
    }

    #[test]
    fn test_already_liked_candidate_ranks_below_fresh_twin() {
        // Identical in every numeric field; only c1 is in the liked set
        let liked = candidate("c1", "anime", "creator-1");
        let fresh = candidate("c2", "anime", "creator-1");

        let signals = build_signals(&[liked_item("c1", "anime", "creator-1", 1.0)], &[]);

        let ranked = rank_characters(&[liked.clone(), fresh.clone()], &signals);
        assert_eq!(ranked[0].id, "c2");
        assert_eq!(ranked[1].id, "c1");
    }

    #[test]
    fn test_affinity_match_outranks_equal_popularity() {
        let matching = candidate("c1", "anime", "creator-1");
        let other = candidate("c2", "scifi", "creator-2");

        // Strong affinity for (anime, creator-1) built from a different
        // character, so no diversification penalty applies
        let signals = build_signals(&[liked_item("c9", "anime", "creator-1", 3.0)], &[]);

        let ranked = rank_characters(&[other.clone(), matching.clone()], &signals);
        assert_eq!(ranked[0].id, "c1");
    }

    #[test]
    fn test_featured_boost() {
        let mut featured = candidate("c1", "anime", "creator-1");
        featured.featured = true;
        let plain = candidate("c2", "anime", "creator-2");

        let ranked = rank_characters(
            &[plain.clone(), featured.clone()],
            &RecommendationSignals::default(),
        );
        assert_eq!(ranked[0].id, "c1");
    }

    #[test]
    fn test_determinism() {
        let candidates: Vec<CharacterCandidate> = (0..50)
            .map(|i| {
                let mut c = candidate(&format!("c{}", i), "anime", &format!("creator-{}", i % 7));
                c.usage_count = (i * 37 % 500) as i64;
                c.like_count = (i * 13 % 120) as i64;
                c.featured = i % 11 == 0;
                c
            })
            .collect();
        let signals = build_signals(
            &[liked_item("c3", "anime", "creator-3", 2.0)],
            &[liked_item("c8", "anime", "creator-1", 0.5)],
        );

        let first = rank_characters(&candidates, &signals);
        let second = rank_characters(&candidates, &signals);
        let first_ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_stability_on_equal_scores() {
        // Four identical candidates score identically and must keep their
        // input order
        let candidates = vec![
            candidate("c1", "anime", "creator-1"),
            candidate("c2", "anime", "creator-1"),
            candidate("c3", "anime", "creator-1"),
            candidate("c4", "anime", "creator-1"),
        ];

        let ranked = rank_characters(&candidates, &RecommendationSignals::default());
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn test_parallel_path_matches_sequential_order() {
        // Enough candidates to cross the rayon threshold; ordering must not
        // change with the scoring strategy
        let candidates: Vec<CharacterCandidate> = (0..(PARALLEL_SCORING_THRESHOLD + 64))
            .map(|i| {
                let mut c = candidate(&format!("c{}", i), "anime", &format!("creator-{}", i % 13));
                c.usage_count = (i * 31 % 700) as i64;
                c.like_count = (i * 17 % 90) as i64;
                c
            })
            .collect();
        let signals = build_signals(&[liked_item("c5", "anime", "creator-5", 1.5)], &[]);

        let parallel = rank_characters(&candidates, &signals);
        let sequential: Vec<ScoredCharacter> = {
            let newest = candidates.iter().map(|c| c.created_at).max().unwrap();
            let weights = ScoringWeights::default();
            let mut scored: Vec<ScoredCharacter> = candidates
                .iter()
                .map(|c| {
                    let (score, reason) = score_candidate(c, &signals, newest, &weights);
                    ScoredCharacter {
                        candidate: c.clone(),
                        score,
                        reason,
                    }
                })
                .collect();
            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            scored
        };

        let parallel_ids: Vec<&str> = parallel.iter().map(|c| c.id.as_str()).collect();
        let sequential_ids: Vec<&str> =
            sequential.iter().map(|s| s.candidate.id.as_str()).collect();
        assert_eq!(parallel_ids, sequential_ids);
    }

    #[test]
    fn test_recency_newer_scores_higher() {
        let newest = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(recency_score(newest, newest, 168.0) > recency_score(older, newest, 168.0));
        // Clock skew clamps to full freshness
        let skewed = newest + chrono::Duration::hours(1);
        assert_eq!(recency_score(skewed, newest, 168.0), 1.0);
    }

    #[test]
    fn test_reason_reflects_strongest_term() {
        let mut featured = candidate("c1", "anime", "creator-1");
        featured.featured = true;
        featured.usage_count = 0;
        featured.like_count = 0;

        let signals = RecommendationSignals::default();
        let ranked = rank_characters_weighted(&[featured], &signals, &ScoringWeights::default());
        assert_eq!(ranked[0].reason, RecommendationReason::Featured);
    }
}
