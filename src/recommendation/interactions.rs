//! User Interaction Tracking
//!
//! Persists the interaction rows that feed signal construction. Each ranking
//! request rebuilds its signals from this history, so nothing derived is
//! stored.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use super::signals::{build_signals, InteractionItem, RecommendationSignals};

/// Interaction types we track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Explicit positive signal
    Like,
    /// Retraction of a like
    Unlike,
    /// Opened a chat with the character
    Use,
    /// Bookmarked for later
    Save,
    /// Shared externally
    Share,
}

impl InteractionKind {
    /// Base signal weight, before recency decay
    ///
    /// Likes are the strongest signal; opening a chat is weak but frequent.
    pub fn base_weight(self) -> f64 {
        match self {
            InteractionKind::Like => 1.0,
            InteractionKind::Unlike => -0.5,
            InteractionKind::Use => 0.25,
            InteractionKind::Save => 0.7,
            InteractionKind::Share => 0.5,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(Self::Like),
            "unlike" => Some(Self::Unlike),
            "use" => Some(Self::Use),
            "save" => Some(Self::Save),
            "share" => Some(Self::Share),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKind::Like => write!(f, "like"),
            InteractionKind::Unlike => write!(f, "unlike"),
            InteractionKind::Use => write!(f, "use"),
            InteractionKind::Save => write!(f, "save"),
            InteractionKind::Share => write!(f, "share"),
        }
    }
}

/// Interaction event for recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: String,
    pub character_id: String,
    pub kind: InteractionKind,
    pub source: Option<String>,
}

/// Half-life for interaction recency weighting, in days
const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

/// Record a user interaction
pub async fn record_interaction(pool: &PgPool, event: &InteractionEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO character_interactions
            (id, user_id, character_id, kind, source, created_at)
        VALUES
            (gen_random_uuid(), $1, $2::uuid, $3, $4, NOW())
        "#,
    )
    .bind(&event.user_id)
    .bind(&event.character_id)
    .bind(event.kind.to_string())
    .bind(&event.source)
    .execute(pool)
    .await?;

    info!(
        "Recorded {} interaction: user={}, character={}",
        event.kind, event.user_id, event.character_id
    );

    Ok(())
}

/// Raw signal row, joined against the character for its category/creator
#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    character_id: String,
    category: String,
    creator_id: String,
    kind: String,
    created_at: DateTime<Utc>,
}

/// Load a user's interaction history and fold it into ranking signals.
///
/// Each row's weight is its kind's base weight decayed by age, so last
/// week's like counts for more than last quarter's. The decay happens here,
/// at load time, keeping `build_signals` and the ranking core pure.
pub async fn load_signals(
    pool: &PgPool,
    user_id: &str,
    window_days: i64,
) -> Result<RecommendationSignals> {
    let rows = sqlx::query_as::<_, SignalRow>(
        r#"
        SELECT i.character_id::text, c.category, c.creator_id, i.kind, i.created_at
        FROM character_interactions i
        JOIN characters c ON c.id = i.character_id
        WHERE i.user_id = $1
        AND i.created_at > NOW() - make_interval(days => $2::int)
        ORDER BY i.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(window_days)
    .fetch_all(pool)
    .await?;

    let now = Utc::now();
    let mut liked_items = Vec::new();
    let mut used_items = Vec::new();

    for row in rows {
        let Some(kind) = InteractionKind::parse(&row.kind) else {
            continue;
        };

        let age_days = (now - row.created_at).num_hours().max(0) as f64 / 24.0;
        let decay = (-age_days * std::f64::consts::LN_2 / RECENCY_HALF_LIFE_DAYS).exp();
        let item = InteractionItem {
            id: row.character_id,
            category: row.category,
            created_by_id: row.creator_id,
            weight: kind.base_weight() * decay,
        };

        match kind {
            InteractionKind::Like => liked_items.push(item),
            _ => used_items.push(item),
        }
    }

    Ok(build_signals(&liked_items, &used_items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_weights_ordering() {
        // Likes dominate, uses are weak, unlikes are negative
        assert!(InteractionKind::Like.base_weight() > InteractionKind::Save.base_weight());
        assert!(InteractionKind::Save.base_weight() > InteractionKind::Use.base_weight());
        assert!(InteractionKind::Unlike.base_weight() < 0.0);
    }

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in [
            InteractionKind::Like,
            InteractionKind::Unlike,
            InteractionKind::Use,
            InteractionKind::Save,
            InteractionKind::Share,
        ] {
            assert_eq!(InteractionKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(InteractionKind::parse("purchase"), None);
    }
}
