//! Tier-aware model routing and legacy-model normalization
//!
//! Vendor models are retired over time, but conversations persisted against
//! a retired id must keep working. The translation table here maps every
//! retired id we have ever served onto the current model of the same tier,
//! so the serving layer only ever sees ids it recognizes.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use super::pricing::{MODEL_DEFAULT, MODEL_ECONOMY, MODEL_PREMIUM};

/// Models the serving layer currently accepts
pub static SUPPORTED_MODELS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| [MODEL_ECONOMY, MODEL_DEFAULT, MODEL_PREMIUM].into());

/// Retired model id -> current model of the same tier
pub static LEGACY_MODEL_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("claude-3-haiku-20240307", MODEL_ECONOMY),
        ("claude-3-5-haiku-20241022", MODEL_ECONOMY),
        ("claude-3-5-sonnet-20240620", MODEL_DEFAULT),
        ("claude-3-5-sonnet-20241022", MODEL_DEFAULT),
        ("claude-3-7-sonnet-20250219", MODEL_DEFAULT),
        ("claude-sonnet-4-20250514", MODEL_DEFAULT),
        ("claude-3-opus-20240229", MODEL_PREMIUM),
        ("claude-opus-4-20250514", MODEL_PREMIUM),
    ]
    .into()
});

/// A user's model request, as seen by the routing layer
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Whether the user is on a paid plan
    pub is_pro: bool,
    /// The model the conversation is pinned to, if any
    pub requested_model_id: Option<String>,
}

/// Resolve an arbitrary model id to a currently-supported one.
///
/// Blank input resolves to the system default; supported ids pass through
/// unchanged; retired ids translate via [`LEGACY_MODEL_MAP`]; anything else
/// falls back to the default. Total function: the result is always a member
/// of [`SUPPORTED_MODELS`].
pub fn normalize_model_id(raw: &str) -> &'static str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return MODEL_DEFAULT;
    }

    if let Some(current) = SUPPORTED_MODELS.get(trimmed) {
        return *current;
    }

    if let Some(current) = LEGACY_MODEL_MAP.get(trimmed) {
        return *current;
    }

    MODEL_DEFAULT
}

/// Pick the model that will serve a request.
///
/// Free-tier users are routed to the economy model unconditionally; this is
/// a cost-control guardrail, not a preference. Pro users get their requested
/// model after normalization, or the balanced default when the conversation
/// is not pinned to one. Never fails.
pub fn model_for_user(request: &ModelRequest) -> &'static str {
    if !request.is_pro {
        return MODEL_ECONOMY;
    }

    match request.requested_model_id.as_deref() {
        Some(requested) => normalize_model_id(requested),
        None => MODEL_DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_override() {
        for requested in [None, Some(MODEL_PREMIUM.to_string()), Some("junk".into())] {
            let request = ModelRequest {
                is_pro: false,
                requested_model_id: requested,
            };
            assert_eq!(model_for_user(&request), MODEL_ECONOMY);
        }
    }

    #[test]
    fn test_pro_default_when_nothing_requested() {
        let request = ModelRequest {
            is_pro: true,
            requested_model_id: None,
        };
        assert_eq!(model_for_user(&request), MODEL_DEFAULT);
    }

    #[test]
    fn test_pro_request_passes_through() {
        let request = ModelRequest {
            is_pro: true,
            requested_model_id: Some(MODEL_PREMIUM.to_string()),
        };
        assert_eq!(model_for_user(&request), MODEL_PREMIUM);
    }

    #[test]
    fn test_pro_legacy_request_is_normalized() {
        let request = ModelRequest {
            is_pro: true,
            requested_model_id: Some("claude-3-opus-20240229".to_string()),
        };
        assert_eq!(model_for_user(&request), MODEL_PREMIUM);
    }

    #[test]
    fn test_every_legacy_id_maps_to_a_supported_model() {
        for (legacy, current) in LEGACY_MODEL_MAP.iter() {
            assert_eq!(normalize_model_id(legacy), *current);
            assert!(SUPPORTED_MODELS.contains(current));
        }
    }

    #[test]
    fn test_supported_ids_are_unchanged() {
        for id in SUPPORTED_MODELS.iter() {
            assert_eq!(normalize_model_id(id), *id);
        }
    }

    #[test]
    fn test_blank_and_unknown_resolve_to_default() {
        assert_eq!(normalize_model_id(""), MODEL_DEFAULT);
        assert_eq!(normalize_model_id("   "), MODEL_DEFAULT);
        assert_eq!(normalize_model_id("claude-11-ultra"), MODEL_DEFAULT);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(normalize_model_id(&format!("  {}  ", MODEL_ECONOMY)), MODEL_ECONOMY);
    }
}
