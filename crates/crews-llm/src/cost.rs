//! Per-model cost table and derivation (spec §4.2: "Cost derivation uses a
//! provider-specific per-model table of (input $/1K, output $/1K); unknown
//! models use a conservative default").
//!
//! Pattern grounded in the teacher's `known_model_profiles.rs`: a static
//! lookup keyed by a case-insensitive, prefix-tolerant model id, falling
//! back to a default when the model isn't recognized. The dollar figures
//! here are this crate's own table (the teacher's file solves a different
//! problem -- reasoning-effort capability flags, not pricing -- so only the
//! lookup *pattern* is reused, not its content).

use crews_core::Usage;

/// (input $ per 1K tokens, output $ per 1K tokens).
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

const KNOWN_PRICES: &[(&str, ModelPrice)] = &[
    (
        "gpt-4o",
        ModelPrice {
            input_per_1k: 0.005,
            output_per_1k: 0.015,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPrice {
            input_per_1k: 0.00015,
            output_per_1k: 0.0006,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPrice {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelPrice {
            input_per_1k: 0.0005,
            output_per_1k: 0.0015,
        },
    ),
    (
        "o1",
        ModelPrice {
            input_per_1k: 0.015,
            output_per_1k: 0.06,
        },
    ),
    (
        "o1-mini",
        ModelPrice {
            input_per_1k: 0.0011,
            output_per_1k: 0.0044,
        },
    ),
    (
        "claude-3-opus",
        ModelPrice {
            input_per_1k: 0.015,
            output_per_1k: 0.075,
        },
    ),
    (
        "claude-3-sonnet",
        ModelPrice {
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        },
    ),
];

/// Conservative default for models not in the table.
const DEFAULT_PRICE: ModelPrice = ModelPrice {
    input_per_1k: 0.01,
    output_per_1k: 0.03,
};

pub fn price_for_model(model: &str) -> ModelPrice {
    let lower = model.to_lowercase();
    KNOWN_PRICES
        .iter()
        .find(|(id, _)| lower.starts_with(id))
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_PRICE)
}

/// Fills in `usage.cost_usd` from the model's price table, returning the
/// updated usage.
pub fn apply_cost(model: &str, mut usage: Usage) -> Usage {
    let price = price_for_model(model);
    let cost = (usage.prompt_tokens as f64 / 1000.0) * price.input_per_1k
        + (usage.completion_tokens as f64 / 1000.0) * price.output_per_1k;
    usage.cost_usd = Some(cost);
    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_uses_table_price() {
        let price = price_for_model("gpt-4o-2024-08-06");
        assert!((price.input_per_1k - 0.005).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_default() {
        let price = price_for_model("some-future-model-9000");
        assert!((price.input_per_1k - DEFAULT_PRICE.input_per_1k).abs() < 1e-9);
    }

    #[test]
    fn apply_cost_computes_from_both_token_kinds() {
        let usage = Usage::new(1000, 1000);
        let priced = apply_cost("gpt-4o", usage);
        assert!((priced.cost_usd.unwrap() - 0.020).abs() < 1e-9);
    }
}
