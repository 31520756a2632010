//! Usage ledger aggregation
//!
//! Folds persisted per-message usage rows into a cost summary. The
//! aggregation itself is pure; the query helpers load the rows the request
//! handlers hand to it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::cost::calculate_token_cost;

/// A single persisted usage row, one per assistant turn
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRow {
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Aggregated usage for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub turns: usize,
    pub input_tokens: i64,
    pub output_tokens: i64,
    /// Cost in cents, rounded per turn before summing
    pub cost_cents: f64,
}

/// Aggregated usage across all models
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_turns: usize,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    /// Total cost in cents
    pub total_cost_cents: f64,
    pub per_model: Vec<ModelUsage>,
}

/// Fold usage rows into a summary.
///
/// Per-turn costs are computed with [`calculate_token_cost`], so retired or
/// unknown model ids in old rows price at the default tier instead of
/// failing. An empty row set yields a zero summary.
pub fn aggregate_usage(rows: &[UsageRow]) -> UsageSummary {
    // BTreeMap keeps per-model output in a stable order
    let mut per_model: BTreeMap<String, ModelUsage> = BTreeMap::new();
    let mut summary = UsageSummary::default();

    for row in rows {
        let cost = calculate_token_cost(&row.model, row.input_tokens as f64, row.output_tokens as f64);

        let entry = per_model
            .entry(row.model.clone())
            .or_insert_with(|| ModelUsage {
                model: row.model.clone(),
                turns: 0,
                input_tokens: 0,
                output_tokens: 0,
                cost_cents: 0.0,
            });
        entry.turns += 1;
        entry.input_tokens += row.input_tokens.max(0);
        entry.output_tokens += row.output_tokens.max(0);
        entry.cost_cents += cost.total_cost;

        summary.total_turns += 1;
        summary.total_input_tokens += row.input_tokens.max(0);
        summary.total_output_tokens += row.output_tokens.max(0);
        summary.total_cost_cents += cost.total_cost;
    }

    summary.per_model = per_model.into_values().collect();
    summary
}

/// Load a user's usage rows, most recent first
pub async fn load_user_usage(pool: &PgPool, user_id: &str, limit: i64) -> Result<Vec<UsageRow>> {
    let rows = sqlx::query_as::<_, UsageRow>(
        r#"
        SELECT model, input_tokens, output_tokens
        FROM message_usage
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Load usage rows for a single conversation
pub async fn load_conversation_usage(
    pool: &PgPool,
    conversation_id: Uuid,
    limit: i64,
) -> Result<Vec<UsageRow>> {
    let rows = sqlx::query_as::<_, UsageRow>(
        r#"
        SELECT model, input_tokens, output_tokens
        FROM message_usage
        WHERE conversation_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record a usage row for an assistant turn
pub async fn record_usage(
    pool: &PgPool,
    user_id: &str,
    conversation_id: Uuid,
    row: &UsageRow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO message_usage
            (id, user_id, conversation_id, model, input_tokens, output_tokens, created_at)
        VALUES
            (gen_random_uuid(), $1, $2, $3, $4, $5, NOW())
        "#,
    )
    .bind(user_id)
    .bind(conversation_id)
    .bind(&row.model)
    .bind(row.input_tokens)
    .bind(row.output_tokens)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::pricing::{MODEL_DEFAULT, MODEL_ECONOMY};

    const EPS: f64 = 1e-9;

    fn row(model: &str, input: i64, output: i64) -> UsageRow {
        UsageRow {
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn test_empty_rows_yield_zero_summary() {
        let summary = aggregate_usage(&[]);
        assert_eq!(summary.total_turns, 0);
        assert_eq!(summary.total_cost_cents, 0.0);
        assert!(summary.per_model.is_empty());
    }

    #[test]
    fn test_summary_matches_per_row_costs() {
        let rows = vec![
            row(MODEL_DEFAULT, 1000, 500),
            row(MODEL_DEFAULT, 2000, 1000),
            row(MODEL_ECONOMY, 10_000, 4_000),
        ];

        let expected: f64 = rows
            .iter()
            .map(|r| {
                calculate_token_cost(&r.model, r.input_tokens as f64, r.output_tokens as f64)
                    .total_cost
            })
            .sum();

        let summary = aggregate_usage(&rows);
        assert_eq!(summary.total_turns, 3);
        assert_eq!(summary.total_input_tokens, 13_000);
        assert_eq!(summary.total_output_tokens, 5_500);
        assert!((summary.total_cost_cents - expected).abs() < EPS);
        assert_eq!(summary.per_model.len(), 2);
    }

    #[test]
    fn test_retired_models_still_aggregate() {
        // Old rows referencing retired ids price at the default tier
        let rows = vec![row("claude-1.3", 1000, 500)];
        let summary = aggregate_usage(&rows);
        let default = calculate_token_cost(MODEL_DEFAULT, 1000.0, 500.0);
        assert!((summary.total_cost_cents - default.total_cost).abs() < EPS);
    }

    #[test]
    fn test_negative_token_rows_do_not_poison_totals() {
        let rows = vec![row(MODEL_DEFAULT, -500, 500)];
        let summary = aggregate_usage(&rows);
        assert_eq!(summary.total_input_tokens, 0);
        assert!(summary.total_cost_cents >= 0.0);
    }
}
