//! Recommendation Module
//!
//! Provides personalized character recommendations for Mira users.
//!
//! ## Architecture
//!
//! 1. **Interactions** - Track user behavior (likes, chats, saves) as signal rows
//! 2. **Signals** - Fold interaction history into per-request affinity signals
//! 3. **Engine** - Score and rank candidate characters against those signals
//!
//! ## Algorithm Overview
//!
//! Ranking combines four terms per candidate:
//! - Popularity: log-scaled blend of chat count and like count
//! - Affinity: accumulated weight for the candidate's (category, creator) pair
//! - Featured: flat boost for editorially featured characters
//! - Diversification: flat penalty for characters the user already liked,
//!   plus a recency decay measured against the newest candidate
//!
//! Scoring is pure and deterministic: no randomness, no wall clock, stable
//! ordering on ties. The same candidates and signals always rank the same
//! way, which keeps results cacheable and tests reproducible.

pub mod engine;
pub mod interactions;
pub mod quality;
pub mod signals;
pub mod updater;

// Re-export the types that are actually used externally
pub use engine::{rank_characters, CharacterCandidate, RecommendationEngine, ScoredCharacter};
pub use signals::{build_signals, InteractionItem, RecommendationSignals};
