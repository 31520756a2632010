//! Model pricing table
//!
//! Prices are in USD per 1M tokens (input/output), matching the vendor's
//! published rates. One entry per supported model id, compiled into a static
//! table at startup and never mutated.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Model identifier (e.g., "claude-sonnet-4-5-20250929")
    pub model_id: &'static str,
    /// Cost per 1M input tokens in USD
    pub input_per_million_usd: f64,
    /// Cost per 1M output tokens in USD
    pub output_per_million_usd: f64,
}

/// Economy tier, served to free users
pub const MODEL_ECONOMY: &str = "claude-haiku-4-5-20251001";

/// Balanced tier, the system default for pro users
pub const MODEL_DEFAULT: &str = "claude-sonnet-4-5-20250929";

/// Premium tier
pub const MODEL_PREMIUM: &str = "claude-opus-4-1-20250805";

/// Static pricing table, keyed by model id
pub static PRICING: Lazy<HashMap<&'static str, PricingEntry>> = Lazy::new(|| {
    let entries = [
        PricingEntry {
            model_id: MODEL_ECONOMY,
            input_per_million_usd: 1.0,
            output_per_million_usd: 5.0,
        },
        PricingEntry {
            model_id: MODEL_DEFAULT,
            input_per_million_usd: 3.0,
            output_per_million_usd: 15.0,
        },
        PricingEntry {
            model_id: MODEL_PREMIUM,
            input_per_million_usd: 15.0,
            output_per_million_usd: 75.0,
        },
    ];

    entries.into_iter().map(|e| (e.model_id, e)).collect()
});

/// Look up pricing for a model id, falling back to the default entry.
///
/// An empty or unknown id is not an error here: old conversation rows may
/// reference models that have since been retired, and a defaulted estimate
/// is preferred over a failed request.
pub fn pricing_for(model_id: &str) -> &'static PricingEntry {
    PRICING
        .get(model_id)
        .unwrap_or_else(|| &PRICING[MODEL_DEFAULT])
}
