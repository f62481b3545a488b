//! Model pricing tables and cost calculation.
//!
//! The budget controller charges each turn's token usage against the
//! session's cost budget using these per-million rates. Lookup is
//! exact-match first, then prefix matching, then a conservative default.

use keel_core::messages::{Cost, TokenUsage};

/// Per-million-token rates for one model family.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricingTier {
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens.
    pub output_per_million: f64,
    /// Multiplier applied to cache-read tokens (typically a 90% discount).
    pub cache_read_multiplier: f64,
}

const fn tier(input: f64, output: f64) -> PricingTier {
    PricingTier {
        input_per_million: input,
        output_per_million: output,
        cache_read_multiplier: 0.1,
    }
}

/// Look up the pricing tier for a model identifier.
#[must_use]
pub fn get_pricing_tier(model: &str) -> PricingTier {
    match model {
        "claude-opus-4-6" | "claude-opus-4-5" => return tier(5.0, 25.0),
        "claude-sonnet-4-5" => return tier(3.0, 15.0),
        "claude-haiku-4-5" => return tier(1.0, 5.0),
        _ => {}
    }

    let m = model.to_lowercase();
    if m.contains("opus") {
        tier(5.0, 25.0)
    } else if m.contains("haiku") {
        tier(1.0, 5.0)
    } else {
        // Default: Sonnet-class pricing
        tier(3.0, 15.0)
    }
}

/// Calculate cost for a given model and token usage.
///
/// Cache-read tokens are billed at the discounted multiplier; remaining
/// input tokens at the base rate.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Token counts never approach 2^52
pub fn calculate_cost(model: &str, usage: &TokenUsage) -> Cost {
    let tier = get_pricing_tier(model);

    let cache_read = usage.cache_read_tokens.unwrap_or(0);
    let base_input = usage.input_tokens.saturating_sub(cache_read);

    let input_cost = base_input as f64 / 1_000_000.0 * tier.input_per_million
        + cache_read as f64 / 1_000_000.0 * tier.input_per_million * tier.cache_read_multiplier;
    let output_cost = usage.output_tokens as f64 / 1_000_000.0 * tier.output_per_million;

    Cost {
        input_cost,
        output_cost,
        total: input_cost + output_cost,
        currency: "USD".to_string(),
    }
}

/// Format a cost value for display.
///
/// Uses 4 decimal places for values under $0.01, 2 otherwise.
#[must_use]
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.4}")
    } else {
        format!("${cost:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_tiers() {
        assert_eq!(get_pricing_tier("claude-opus-4-6").input_per_million, 5.0);
        assert_eq!(get_pricing_tier("claude-sonnet-4-5").input_per_million, 3.0);
        assert_eq!(get_pricing_tier("claude-haiku-4-5").output_per_million, 5.0);
    }

    #[test]
    fn pattern_match_falls_back_by_family() {
        assert_eq!(get_pricing_tier("claude-opus-next").input_per_million, 5.0);
        assert_eq!(get_pricing_tier("some-haiku-variant").input_per_million, 1.0);
    }

    #[test]
    fn unknown_model_uses_sonnet_default() {
        let tier = get_pricing_tier("mystery-model");
        assert_eq!(tier.input_per_million, 3.0);
        assert_eq!(tier.output_per_million, 15.0);
    }

    #[test]
    fn cost_calculation_basic() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
            cache_read_tokens: None,
        };
        let cost = calculate_cost("claude-sonnet-4-5", &usage);
        assert!((cost.input_cost - 3.0).abs() < 1e-9);
        assert!((cost.output_cost - 15.0).abs() < 1e-9);
        assert!((cost.total - 18.0).abs() < 1e-9);
        assert_eq!(cost.currency, "USD");
    }

    #[test]
    fn cache_read_tokens_discounted() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_read_tokens: Some(1_000_000),
        };
        let cost = calculate_cost("claude-sonnet-4-5", &usage);
        // Entire input was cache-read: 3.0 * 0.1
        assert!((cost.input_cost - 0.3).abs() < 1e-9);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let cost = calculate_cost("claude-opus-4-6", &TokenUsage::default());
        assert!((cost.total - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn format_cost_small_and_large() {
        assert_eq!(format_cost(0.0042), "$0.0042");
        assert_eq!(format_cost(1.5), "$1.50");
    }
}
