//! Pricing Table - per-token rates by model
//!
//! Costs are stored per 1M units and resolved at insert time, so a
//! persisted call never changes price when the table is edited later.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

// ============================================================================
// Constants
// ============================================================================

/// Model whose rate is charged for unrecognised model identifiers
pub const DEFAULT_MODEL: &str = "gpt-4";

// OpenAI GPT-4 family
/// GPT-4 prompt cost per 1M units
pub const GPT4_PROMPT_COST: f64 = 30.00;
/// GPT-4 completion cost per 1M units
pub const GPT4_COMPLETION_COST: f64 = 60.00;
/// GPT-4 Turbo prompt cost per 1M units
pub const GPT4_TURBO_PROMPT_COST: f64 = 10.00;
/// GPT-4 Turbo completion cost per 1M units
pub const GPT4_TURBO_COMPLETION_COST: f64 = 30.00;
/// GPT-4o prompt cost per 1M units
pub const GPT4O_PROMPT_COST: f64 = 5.00;
/// GPT-4o completion cost per 1M units
pub const GPT4O_COMPLETION_COST: f64 = 15.00;
/// GPT-4o-mini prompt cost per 1M units
pub const GPT4O_MINI_PROMPT_COST: f64 = 0.15;
/// GPT-4o-mini completion cost per 1M units
pub const GPT4O_MINI_COMPLETION_COST: f64 = 0.60;
/// GPT-3.5 Turbo prompt cost per 1M units
pub const GPT35_TURBO_PROMPT_COST: f64 = 1.50;
/// GPT-3.5 Turbo completion cost per 1M units
pub const GPT35_TURBO_COMPLETION_COST: f64 = 2.00;

// OpenAI GPT-5 family
/// GPT-5 prompt cost per 1M units
pub const GPT5_PROMPT_COST: f64 = 1.25;
/// GPT-5 completion cost per 1M units
pub const GPT5_COMPLETION_COST: f64 = 10.00;
/// GPT-5 nano prompt cost per 1M units
pub const GPT5_NANO_PROMPT_COST: f64 = 0.05;
/// GPT-5 nano completion cost per 1M units
pub const GPT5_NANO_COMPLETION_COST: f64 = 0.40;

// Anthropic Claude 4.5 family
/// Claude Sonnet 4.5 prompt cost per 1M units
pub const CLAUDE_SONNET45_PROMPT_COST: f64 = 3.00;
/// Claude Sonnet 4.5 completion cost per 1M units
pub const CLAUDE_SONNET45_COMPLETION_COST: f64 = 15.00;
/// Claude Haiku 4.5 prompt cost per 1M units
pub const CLAUDE_HAIKU45_PROMPT_COST: f64 = 1.00;
/// Claude Haiku 4.5 completion cost per 1M units
pub const CLAUDE_HAIKU45_COMPLETION_COST: f64 = 5.00;

// ============================================================================
// Cost Models
// ============================================================================

/// Pricing information for a model (per 1M units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model identifier
    pub model: String,
    /// Provider name
    pub provider: String,
    /// Cost per 1M prompt units (USD)
    pub prompt_cost_per_million: f64,
    /// Cost per 1M completion units (USD)
    pub completion_cost_per_million: f64,
}

impl ModelPricing {
    /// Create a pricing entry
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        provider: impl Into<String>,
        prompt_cost_per_million: f64,
        completion_cost_per_million: f64,
    ) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            prompt_cost_per_million,
            completion_cost_per_million,
        }
    }

    /// Calculate cost for given unit counts
    #[must_use]
    pub fn calculate_cost(&self, prompt_units: u64, completion_units: u64) -> f64 {
        let prompt_cost = (prompt_units as f64 / 1_000_000.0) * self.prompt_cost_per_million;
        let completion_cost =
            (completion_units as f64 / 1_000_000.0) * self.completion_cost_per_million;
        prompt_cost + completion_cost
    }
}

/// Static mapping from model identifier to rates, with a designated
/// fallback model.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelPricing>,
    default_model: String,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::from_rates(default_pricing(), DEFAULT_MODEL)
    }
}

impl PricingTable {
    /// Build a table from explicit rates.
    ///
    /// `default_model` should be a key of `rates`; if it is not, unknown
    /// models fall back to the GPT-4 rate.
    #[must_use]
    pub fn from_rates(rates: HashMap<String, ModelPricing>, default_model: &str) -> Self {
        Self {
            rates,
            default_model: default_model.to_string(),
        }
    }

    /// Add or replace a model's rate
    #[must_use]
    pub fn with_model(mut self, pricing: ModelPricing) -> Self {
        self.rates.insert(pricing.model.clone(), pricing);
        self
    }

    /// Exact lookup.
    pub fn get(&self, model: &str) -> Result<&ModelPricing> {
        self.rates
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    /// Lookup that never fails: unknown models are charged at the default
    /// model's rate.
    ///
    /// Returns the pricing used and whether it was a fallback.
    pub fn resolve(&self, model: &str) -> (ModelPricing, bool) {
        match self.get(model) {
            Ok(pricing) => (pricing.clone(), false),
            Err(err) => {
                warn!(%err, fallback = %self.default_model, "Pricing fallback");
                let pricing = self
                    .rates
                    .get(&self.default_model)
                    .cloned()
                    .unwrap_or_else(|| {
                        ModelPricing::new(
                            DEFAULT_MODEL,
                            "openai",
                            GPT4_PROMPT_COST,
                            GPT4_COMPLETION_COST,
                        )
                    });
                (pricing, true)
            }
        }
    }

    /// Cost of a call, using the fallback rate for unknown models
    pub fn cost(&self, model: &str, prompt_units: u64, completion_units: u64) -> f64 {
        self.resolve(model)
            .0
            .calculate_cost(prompt_units, completion_units)
    }

    /// The designated fallback model
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Known model identifiers, sorted
    #[must_use]
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

/// Default pricing for common models
#[must_use]
pub fn default_pricing() -> HashMap<String, ModelPricing> {
    [
        // OpenAI GPT-4 family
        ModelPricing::new("gpt-4", "openai", GPT4_PROMPT_COST, GPT4_COMPLETION_COST),
        ModelPricing::new(
            "gpt-4-turbo",
            "openai",
            GPT4_TURBO_PROMPT_COST,
            GPT4_TURBO_COMPLETION_COST,
        ),
        ModelPricing::new("gpt-4o", "openai", GPT4O_PROMPT_COST, GPT4O_COMPLETION_COST),
        ModelPricing::new(
            "gpt-4o-mini",
            "openai",
            GPT4O_MINI_PROMPT_COST,
            GPT4O_MINI_COMPLETION_COST,
        ),
        ModelPricing::new(
            "gpt-3.5-turbo",
            "openai",
            GPT35_TURBO_PROMPT_COST,
            GPT35_TURBO_COMPLETION_COST,
        ),
        // OpenAI GPT-5 family
        ModelPricing::new("gpt-5", "openai", GPT5_PROMPT_COST, GPT5_COMPLETION_COST),
        ModelPricing::new(
            "gpt-5-nano",
            "openai",
            GPT5_NANO_PROMPT_COST,
            GPT5_NANO_COMPLETION_COST,
        ),
        // Anthropic Claude 4.5 family
        ModelPricing::new(
            "claude-sonnet-4-5-20250929",
            "anthropic",
            CLAUDE_SONNET45_PROMPT_COST,
            CLAUDE_SONNET45_COMPLETION_COST,
        ),
        ModelPricing::new(
            "claude-haiku-4-5-20251001",
            "anthropic",
            CLAUDE_HAIKU45_PROMPT_COST,
            CLAUDE_HAIKU45_COMPLETION_COST,
        ),
    ]
    .into_iter()
    .map(|p| (p.model.clone(), p))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_pricing_calculation() {
        let pricing = ModelPricing::new("test-model", "test", 10.0, 20.0);

        let cost = pricing.calculate_cost(1_000_000, 1_000_000);
        assert!((cost - 30.0).abs() < 1e-9);

        let cost = pricing.calculate_cost(1_000, 1_000);
        assert!((cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_gpt4_rate() {
        let table = PricingTable::default();
        // 1000 x 0.00003 + 500 x 0.00006
        let cost = table.cost("gpt-4", 1000, 500);
        assert!((cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_falls_back_to_default() {
        let table = PricingTable::default();
        assert!(matches!(
            table.get("mystery-model"),
            Err(Error::UnknownModel(m)) if m == "mystery-model"
        ));

        let (pricing, fallback) = table.resolve("mystery-model");
        assert!(fallback);
        assert_eq!(pricing.model, DEFAULT_MODEL);
        assert_eq!(
            table.cost("mystery-model", 1000, 500),
            table.cost("gpt-4", 1000, 500)
        );
    }

    #[test]
    fn test_missing_default_model_uses_builtin_rate() {
        let table = PricingTable::from_rates(HashMap::new(), "not-there");
        let (pricing, fallback) = table.resolve("anything");
        assert!(fallback);
        assert_eq!(pricing.prompt_cost_per_million, GPT4_PROMPT_COST);
    }

    #[test]
    fn test_with_model_overrides_rate() {
        let table =
            PricingTable::default().with_model(ModelPricing::new("gpt-4", "openai", 1.0, 1.0));
        let cost = table.cost("gpt-4", 1_000_000, 0);
        assert!((cost - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_is_deterministic() {
        let table = PricingTable::default();
        let a = table.cost("gpt-4o-mini", 12_345, 6_789);
        let b = table.cost("gpt-4o-mini", 12_345, 6_789);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_default_pricing_has_original_models() {
        let pricing = default_pricing();
        for model in ["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-4o", "gpt-4o-mini"] {
            assert!(pricing.contains_key(model), "missing {model}");
        }
    }
}
