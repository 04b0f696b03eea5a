//! Model catalogue and token cost estimation.
//!
//! Prices are USD per 1M tokens. Lookups are case-insensitive; unknown
//! models have no price and cost estimates for them are `None`.

/// Pricing per 1M tokens for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelPricing {
    /// USD per 1M input tokens.
    pub input_per_m: f64,
    /// USD per 1M output tokens.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for given token counts.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_per_m;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_per_m;
        input_cost + output_cost
    }
}

/// One selectable model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub pricing: ModelPricing,
}

pub const MODEL_CATALOGUE: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4.1-mini",
        display_name: "GPT-4.1 mini",
        description: "高速・高精度",
        pricing: ModelPricing::new(0.40, 1.60),
    },
    ModelInfo {
        id: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        description: "低コスト（推奨）",
        pricing: ModelPricing::new(0.15, 0.60),
    },
    ModelInfo {
        id: "gpt-4o",
        display_name: "GPT-4o",
        description: "最高性能",
        pricing: ModelPricing::new(2.50, 10.00),
    },
    ModelInfo {
        id: "gpt-4.1",
        display_name: "GPT-4.1",
        description: "最高品質",
        pricing: ModelPricing::new(10.00, 30.00),
    },
];

pub fn lookup(model: &str) -> Option<&'static ModelInfo> {
    MODEL_CATALOGUE
        .iter()
        .find(|m| m.id.eq_ignore_ascii_case(model))
}

pub fn is_known_model(model: &str) -> bool {
    lookup(model).is_some()
}

/// Estimated USD cost of a call, or `None` for models outside the catalogue.
pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
    lookup(model).map(|m| m.pricing.compute_cost(input_tokens, output_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn catalogue_contains_default_model() {
        let info = lookup(crate::config::DEFAULT_MODEL).unwrap();
        assert_eq!(info.display_name, "GPT-4o mini");
        assert!(approx(info.pricing.input_per_m, 0.15));
        assert!(approx(info.pricing.output_per_m, 0.60));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("GPT-4O").map(|m| m.id), Some("gpt-4o"));
        assert!(is_known_model("gpt-4.1-mini"));
        assert!(!is_known_model("claude-3"));
    }

    #[test]
    fn cost_for_one_million_each() {
        let cost = estimate_cost("gpt-4.1", 1_000_000, 1_000_000).unwrap();
        assert!(approx(cost, 40.0));
    }

    #[test]
    fn cost_for_small_call() {
        let cost = estimate_cost("gpt-4o-mini", 2_000, 500).unwrap();
        assert!(approx(cost, 0.0003 + 0.0003));
    }

    #[test]
    fn unknown_model_has_no_cost() {
        assert_eq!(estimate_cost("unknown-model", 10, 10), None);
    }
}
