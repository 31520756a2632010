//! Usage Accounting Module
//!
//! Converts raw token counts from conversation turns into monetary cost and
//! routes requests to the model a user's subscription tier is entitled to.
//!
//! ## Architecture
//!
//! 1. **Pricing** - Static per-model pricing table (USD per million tokens)
//! 2. **Cost** - Deterministic token-count to cents conversion
//! 3. **Routing** - Tier-aware model selection and legacy-model normalization
//! 4. **Ledger** - Aggregation of persisted per-message usage rows
//!
//! The pricing table and the legacy-model translation table are baked into
//! the binary; changing prices or retiring a model requires a redeploy.
//! Every function in this module is total: unknown models, blank ids and
//! negative token counts degrade to a documented default instead of failing,
//! because this code sits in a billing-adjacent but non-blocking telemetry
//! path.

pub mod cost;
pub mod ledger;
pub mod pricing;
pub mod routing;

// Re-export the types that are actually used externally
pub use cost::{calculate_token_cost, CostBreakdown};
pub use ledger::{aggregate_usage, UsageRow, UsageSummary};
pub use routing::{model_for_user, normalize_model_id, ModelRequest};
