//! Recommendation Quality and Performance Monitoring
//!
//! Utilities for tracking ranking latency and result quality. Used
//! selectively during profiling and by the periodic updater's logging.

#![allow(dead_code)] // Metrics are used selectively during profiling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use super::engine::{RecommendationReason, ScoredCharacter};

/// Metrics for a single recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub user_id: String,
    pub request_id: String,
    pub timestamp: i64,

    // Performance metrics
    pub total_duration_ms: u64,
    pub candidate_fetch_ms: u64,
    pub scoring_duration_ms: u64,

    // Quality metrics
    pub candidates_considered: usize,
    pub recommendations_returned: usize,
    pub avg_score: f64,
    pub reason_distribution: HashMap<String, usize>,

    // Diversity metrics
    pub unique_creators: usize,
    pub unique_categories: usize,
}

impl Default for RankingMetrics {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            total_duration_ms: 0,
            candidate_fetch_ms: 0,
            scoring_duration_ms: 0,
            candidates_considered: 0,
            recommendations_returned: 0,
            avg_score: 0.0,
            reason_distribution: HashMap::new(),
            unique_creators: 0,
            unique_categories: 0,
        }
    }
}

impl RankingMetrics {
    /// Collect quality metrics from a scored result set
    pub fn from_results(user_id: &str, results: &[ScoredCharacter]) -> Self {
        let mut metrics = Self {
            user_id: user_id.to_string(),
            recommendations_returned: results.len(),
            ..Default::default()
        };

        let mut creators = std::collections::HashSet::new();
        let mut categories = std::collections::HashSet::new();
        let mut score_sum = 0.0;

        for scored in results {
            creators.insert(scored.candidate.creator_id.as_str());
            categories.insert(scored.candidate.category.as_str());
            score_sum += scored.score;

            let reason = match &scored.reason {
                RecommendationReason::Affinity { .. } => "affinity",
                RecommendationReason::Featured => "featured",
                RecommendationReason::Popular => "popular",
                RecommendationReason::Discovery => "discovery",
            };
            *metrics.reason_distribution.entry(reason.to_string()).or_insert(0) += 1;
        }

        metrics.unique_creators = creators.len();
        metrics.unique_categories = categories.len();
        if !results.is_empty() {
            metrics.avg_score = score_sum / results.len() as f64;
        }

        metrics
    }
}

/// Performance timer for tracking operation duration
pub struct PerformanceTimer {
    start: Instant,
    label: String,
}

impl PerformanceTimer {
    pub fn new(label: &str) -> Self {
        Self {
            start: Instant::now(),
            label: label.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                "Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                threshold_ms
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        metrics::histogram!("mira_operation_ms", "op" => self.label.clone()).record(elapsed as f64);
        tracing::debug!("{} completed in {}ms", self.label, elapsed);
    }
}

/// Recommendation quality analyzer
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Calculate diversity score (0-1, higher is better)
    pub fn diversity_score(
        unique_creators: usize,
        unique_categories: usize,
        total_recommendations: usize,
    ) -> f64 {
        if total_recommendations == 0 {
            return 0.0;
        }

        let creator_diversity = unique_creators as f64 / total_recommendations as f64;
        let category_diversity_raw =
            (unique_categories as f64 / (total_recommendations as f64 / 2.0)).min(1.0);
        // Scale category diversity by creator diversity so categories only
        // contribute when creator diversity is meaningful
        let category_diversity = category_diversity_raw * creator_diversity;

        // Weighted average: creators matter more than categories
        creator_diversity * 0.7 + category_diversity * 0.3
    }

    /// Calculate personalization score (0-1, higher is better)
    ///
    /// Ratio of recommendations surfaced because of an affinity match
    pub fn personalization_score(affinity_matches: usize, total_recommendations: usize) -> f64 {
        if total_recommendations == 0 {
            return 0.0;
        }

        (affinity_matches as f64 / total_recommendations as f64).min(1.0)
    }

    /// Detect potential issues with recommendation quality
    pub fn detect_issues(metrics: &RankingMetrics) -> Vec<String> {
        let mut issues = Vec::new();

        // Low diversity
        let diversity = Self::diversity_score(
            metrics.unique_creators,
            metrics.unique_categories,
            metrics.recommendations_returned,
        );
        if diversity < 0.3 {
            issues.push(format!("Low diversity: {:.2}", diversity));
        }

        // Too slow
        if metrics.total_duration_ms > 200 {
            issues.push(format!("Slow response: {}ms", metrics.total_duration_ms));
        }

        // Too many discovery recommendations (lack of personalization)
        let discovery_count = metrics
            .reason_distribution
            .get("discovery")
            .copied()
            .unwrap_or(0);
        let discovery_ratio =
            discovery_count as f64 / metrics.recommendations_returned.max(1) as f64;
        if discovery_ratio > 0.5 {
            issues.push(format!(
                "High discovery ratio: {:.2}%",
                discovery_ratio * 100.0
            ));
        }

        // Very few candidates
        if metrics.candidates_considered < metrics.recommendations_returned * 2 {
            issues.push("Too few candidates for quality filtering".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diversity_score() {
        // Perfect diversity: all unique creators
        assert!(QualityAnalyzer::diversity_score(10, 5, 10) > 0.9);

        // Low diversity: few unique creators
        assert!(QualityAnalyzer::diversity_score(2, 5, 10) < 0.3);
    }

    #[test]
    fn test_personalization_score() {
        assert!(QualityAnalyzer::personalization_score(9, 10) >= 0.9);
        assert!(QualityAnalyzer::personalization_score(1, 10) < 0.3);
    }

    #[test]
    fn test_detect_issues() {
        let mut metrics = RankingMetrics::default();
        metrics.recommendations_returned = 10;
        metrics.unique_creators = 2;
        metrics.unique_categories = 1;
        metrics.total_duration_ms = 250;
        metrics.reason_distribution.insert("discovery".to_string(), 8);

        let issues = QualityAnalyzer::detect_issues(&metrics);
        assert!(!issues.is_empty());
        assert!(issues.iter().any(|i| i.contains("Low diversity")));
        assert!(issues.iter().any(|i| i.contains("Slow response")));
        assert!(issues.iter().any(|i| i.contains("High discovery")));
    }
}
