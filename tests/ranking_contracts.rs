//! Ordering contracts of the recommendation ranking engine, exercised
//! through the public library API.

use chrono::{TimeZone, Utc};
use mira::recommendation::engine::{rank_characters, CharacterCandidate};
use mira::recommendation::signals::{build_signals, InteractionItem, RecommendationSignals};

fn candidate(id: &str, category: &str, creator: &str) -> CharacterCandidate {
    CharacterCandidate {
        id: id.to_string(),
        name: format!("Character {}", id),
        category: category.to_string(),
        creator_id: creator.to_string(),
        usage_count: 250,
        like_count: 40,
        created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap(),
        featured: false,
        is_nsfw: false,
    }
}

fn item(id: &str, category: &str, creator: &str, weight: f64) -> InteractionItem {
    InteractionItem {
        id: id.to_string(),
        category: category.to_string(),
        created_by_id: creator.to_string(),
        weight,
    }
}

#[test]
fn diversification_demotes_already_liked_twins() {
    // Identical candidates except id; only "seen" is in the liked set
    let seen = candidate("seen", "fantasy", "creator-a");
    let fresh = candidate("fresh", "fantasy", "creator-a");
    let signals = build_signals(&[item("seen", "fantasy", "creator-a", 1.0)], &[]);

    let ranked = rank_characters(&[seen, fresh], &signals);
    assert_eq!(ranked[0].id, "fresh");
    assert_eq!(ranked[1].id, "seen");
}

#[test]
fn affinity_outranks_equal_popularity() {
    let matching = candidate("m", "fantasy", "creator-a");
    let other = candidate("o", "history", "creator-b");

    // Affinity accumulated from a different character of the same
    // (category, creator) pair, so no liked-penalty interferes
    let signals = build_signals(
        &[item("earlier-like", "fantasy", "creator-a", 2.0)],
        &[item("earlier-chat", "fantasy", "creator-a", 0.5)],
    );

    let ranked = rank_characters(&[other, matching], &signals);
    assert_eq!(ranked[0].id, "m");
}

#[test]
fn empty_inputs_degrade_gracefully() {
    let signals = RecommendationSignals::default();
    assert!(rank_characters(&[], &signals).is_empty());

    // A brand-new user still gets a popularity ordering, not an error
    let mut big = candidate("big", "fantasy", "creator-a");
    big.usage_count = 100_000;
    big.like_count = 9_000;
    let small = candidate("small", "fantasy", "creator-b");

    let ranked = rank_characters(&[small, big], &signals);
    assert_eq!(ranked[0].id, "big");
}

#[test]
fn ranking_is_deterministic_and_stable() {
    let candidates: Vec<CharacterCandidate> = (0..40)
        .map(|i| {
            let mut c = candidate(
                &format!("c{}", i),
                if i % 2 == 0 { "fantasy" } else { "history" },
                &format!("creator-{}", i % 5),
            );
            // Interleave duplicated stats so score ties actually occur
            c.usage_count = ((i / 4) * 100) as i64;
            c.like_count = ((i / 4) * 10) as i64;
            c
        })
        .collect();

    let signals = build_signals(
        &[item("c7", "history", "creator-2", 1.5)],
        &[item("c12", "fantasy", "creator-2", 0.25)],
    );

    let first = rank_characters(&candidates, &signals);
    let second = rank_characters(&candidates, &signals);

    let first_ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(first_ids, second_ids, "same inputs must produce same order");

    // Tied candidates keep their relative input order
    for window in first.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        if a.usage_count == b.usage_count
            && a.like_count == b.like_count
            && a.category == b.category
            && a.creator_id == b.creator_id
        {
            let pos_a = candidates.iter().position(|c| c.id == a.id).unwrap();
            let pos_b = candidates.iter().position(|c| c.id == b.id).unwrap();
            assert!(pos_a < pos_b, "tie between {} and {} broke input order", a.id, b.id);
        }
    }
}

#[test]
fn inputs_are_not_mutated() {
    let candidates = vec![
        candidate("a", "fantasy", "creator-a"),
        candidate("b", "history", "creator-b"),
    ];
    let signals = build_signals(&[item("a", "fantasy", "creator-a", 1.0)], &[]);

    let before: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
    let _ = rank_characters(&candidates, &signals);
    let after: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
    assert_eq!(before, after);
}
