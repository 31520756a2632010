//! Token cost computation
//!
//! Pure conversion of token counts to monetary cost in cents. No I/O, no
//! state: the same inputs always produce the same breakdown, so results are
//! safe to cache upstream and to recompute in batch jobs.

use serde::{Deserialize, Serialize};

use super::pricing::pricing_for;

/// Cost of a single conversation turn, in cents
///
/// Each field is independently rounded to 2 decimal places, so
/// `total_cost == round2(input_cost + output_cost)` within floating-point
/// tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    pub const ZERO: CostBreakdown = CostBreakdown {
        input_cost: 0.0,
        output_cost: 0.0,
        total_cost: 0.0,
    };
}

/// Compute the cost of a turn from its token counts.
///
/// Unknown or empty model ids price at the default (balanced) tier, and
/// negative token counts clamp to zero: this function never fails, because a
/// degraded estimate beats blocking a user-facing request over telemetry.
/// Fractional token counts are accepted as-is (some upstream estimators
/// produce them).
pub fn calculate_token_cost(model_id: &str, input_tokens: f64, output_tokens: f64) -> CostBreakdown {
    let pricing = pricing_for(model_id);

    let input_cost = round_cents(cost_cents(input_tokens, pricing.input_per_million_usd));
    let output_cost = round_cents(cost_cents(output_tokens, pricing.output_per_million_usd));
    let total_cost = round_cents(
        cost_cents(input_tokens, pricing.input_per_million_usd)
            + cost_cents(output_tokens, pricing.output_per_million_usd),
    );

    CostBreakdown {
        input_cost,
        output_cost,
        total_cost,
    }
}

/// Unrounded cost in cents for a token count at a per-million USD rate
fn cost_cents(tokens: f64, price_per_million_usd: f64) -> f64 {
    let tokens = tokens.max(0.0);
    (tokens / 1_000_000.0) * price_per_million_usd * 100.0
}

/// Round half-up to 2 decimal places on the cents value
fn round_cents(cents: f64) -> f64 {
    (cents * 100.0).round() / 100.0
}
