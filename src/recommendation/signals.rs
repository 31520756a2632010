//! Per-request affinity signals
//!
//! Built fresh from a user's interaction history on every ranking request,
//! never persisted: affinity accumulates by (category, creator) pair so a
//! user's taste for "this kind of character from this creator" compounds
//! across likes and chats, while the liked-id set drives diversification.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One historical interaction, weighted by the loader
///
/// The weight reflects recency and interaction strength; explicit likes
/// carry more than opened chats, and older interactions decay. Weighting
/// happens at load time so this module stays pure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionItem {
    pub id: String,
    pub category: String,
    pub created_by_id: String,
    pub weight: f64,
}

/// Derived affinity signals for a single user
#[derive(Debug, Clone, Default)]
pub struct RecommendationSignals {
    /// (category, creator_id) -> accumulated affinity weight
    affinity: HashMap<(String, String), f64>,
    /// Character ids the user has explicitly liked
    liked_ids: HashSet<String>,
}

impl RecommendationSignals {
    /// Accumulated affinity for a (category, creator) pair, zero when unseen
    pub fn affinity_for(&self, category: &str, creator_id: &str) -> f64 {
        self.affinity
            .get(&(category.to_string(), creator_id.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether the user has already liked this character
    pub fn has_liked(&self, id: &str) -> bool {
        self.liked_ids.contains(id)
    }

    /// True when the user has no history at all
    pub fn is_empty(&self) -> bool {
        self.affinity.is_empty() && self.liked_ids.is_empty()
    }

    /// Number of distinct (category, creator) pairs with signal
    pub fn pair_count(&self) -> usize {
        self.affinity.len()
    }
}

/// Fold liked and used items into affinity signals.
///
/// The same (category, creator) pair occurring in both lists accumulates
/// cumulatively rather than overwriting. Only liked items enter the
/// diversification set; merely having opened a character should not demote
/// it later.
pub fn build_signals(
    liked_items: &[InteractionItem],
    used_items: &[InteractionItem],
) -> RecommendationSignals {
    let mut signals = RecommendationSignals::default();

    for item in liked_items.iter().chain(used_items.iter()) {
        *signals
            .affinity
            .entry((item.category.clone(), item.created_by_id.clone()))
            .or_insert(0.0) += item.weight;
    }

    signals
        .liked_ids
        .extend(liked_items.iter().map(|item| item.id.clone()));

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, category: &str, creator: &str, weight: f64) -> InteractionItem {
        InteractionItem {
            id: id.to_string(),
            category: category.to_string(),
            created_by_id: creator.to_string(),
            weight,
        }
    }

    #[test]
    fn test_empty_history_builds_empty_signals() {
        let signals = build_signals(&[], &[]);
        assert!(signals.is_empty());
        assert_eq!(signals.affinity_for("anime", "creator-1"), 0.0);
        assert!(!signals.has_liked("c1"));
    }

    #[test]
    fn test_affinity_accumulates_across_lists() {
        let liked = vec![item("c1", "anime", "creator-1", 1.0)];
        let used = vec![
            item("c2", "anime", "creator-1", 0.5),
            item("c3", "scifi", "creator-2", 0.25),
        ];

        let signals = build_signals(&liked, &used);
        assert_eq!(signals.affinity_for("anime", "creator-1"), 1.5);
        assert_eq!(signals.affinity_for("scifi", "creator-2"), 0.25);
        assert_eq!(signals.pair_count(), 2);
    }

    #[test]
    fn test_repeated_items_compound() {
        let liked = vec![
            item("c1", "anime", "creator-1", 1.0),
            item("c4", "anime", "creator-1", 1.0),
        ];
        let signals = build_signals(&liked, &[]);
        assert_eq!(signals.affinity_for("anime", "creator-1"), 2.0);
    }

    #[test]
    fn test_only_likes_enter_diversification_set() {
        let liked = vec![item("c1", "anime", "creator-1", 1.0)];
        let used = vec![item("c2", "anime", "creator-1", 0.5)];

        let signals = build_signals(&liked, &used);
        assert!(signals.has_liked("c1"));
        assert!(!signals.has_liked("c2"));
    }
}
