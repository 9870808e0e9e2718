//! Token cost estimation and the per-session running total.

use crate::config::{PricingConfig, ProviderPricing};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Converts token counts into an estimated USD cost using per-provider
/// linear pricing.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    providers: HashMap<String, ProviderPricing>,
    cache_discount: f64,
}

impl CostEstimator {
    pub fn new(providers: HashMap<String, ProviderPricing>, cache_discount: f64) -> Self {
        Self {
            providers,
            cache_discount: cache_discount.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self::new(config.providers.clone(), config.cache_discount)
    }

    /// Estimated cost of one model call. Unknown providers and zero-cost
    /// tiers cost nothing.
    pub fn estimate(
        &self,
        prompt_tokens: u32,
        completion_tokens: u32,
        cache_hit: bool,
        provider: &str,
    ) -> f64 {
        let Some(pricing) = self.providers.get(provider) else {
            tracing::debug!(provider, "No pricing configured, counting as free");
            return 0.0;
        };
        if pricing.is_free() {
            return 0.0;
        }

        let mut prompt_rate = pricing.prompt_per_million / TOKENS_PER_MILLION;
        if cache_hit {
            prompt_rate *= self.cache_discount;
        }
        let completion_rate = pricing.completion_per_million / TOKENS_PER_MILLION;

        prompt_tokens as f64 * prompt_rate + completion_tokens as f64 * completion_rate
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

/// Snapshot of a session's accumulated usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    pub total_usd: f64,
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_hits: u64,
}

/// Running cost accumulator shared between the loop and any reader
/// (a UI polling the current cost, for instance).
///
/// Cloning yields another handle to the same totals.
#[derive(Debug, Clone, Default)]
pub struct CostMeter {
    totals: Arc<RwLock<CostTotals>>,
}

impl CostMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call's usage and cost. Negative or non-finite amounts are
    /// ignored so the total never decreases.
    pub fn record(&self, usd: f64, prompt_tokens: u32, completion_tokens: u32, cache_hit: bool) {
        if let Ok(mut totals) = self.totals.write() {
            if usd.is_finite() && usd > 0.0 {
                totals.total_usd += usd;
            }
            totals.calls += 1;
            totals.prompt_tokens += u64::from(prompt_tokens);
            totals.completion_tokens += u64::from(completion_tokens);
            if cache_hit {
                totals.cache_hits += 1;
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.snapshot().total_usd
    }

    pub fn snapshot(&self) -> CostTotals {
        self.totals.read().map(|t| *t).unwrap_or_default()
    }

    /// Explicit reset; nothing in the loop calls this.
    pub fn reset(&self) {
        if let Ok(mut totals) = self.totals.write() {
            *totals = CostTotals::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> CostEstimator {
        CostEstimator::default()
    }

    #[test]
    fn test_linear_pricing() {
        let cost = estimator().estimate(1_000_000, 1_000_000, false, "claude");
        assert!((cost - 18.0).abs() < 1e-9, "got {cost}");

        let cost = estimator().estimate(2_000, 500, false, "gemini");
        let expected = 2_000.0 * 0.075 / 1e6 + 500.0 * 0.30 / 1e6;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cache_hit_is_strictly_cheaper() {
        let est = estimator();
        for provider in ["claude", "gemini"] {
            let cold = est.estimate(5_000, 800, false, provider);
            let warm = est.estimate(5_000, 800, true, provider);
            assert!(warm < cold, "{provider}: {warm} !< {cold}");
        }
        let warm = est.estimate(1_000_000, 0, true, "claude");
        assert!((warm - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_free_and_unknown_providers_cost_nothing() {
        let est = estimator();
        assert_eq!(est.estimate(10_000, 10_000, false, "local"), 0.0);
        assert_eq!(est.estimate(10_000, 10_000, false, "unheard-of"), 0.0);
    }

    #[test]
    fn test_meter_total_is_monotonic() {
        let est = estimator();
        let meter = CostMeter::new();
        let mut previous = meter.total();
        let calls = [
            (1_200, 300, false, "claude"),
            (0, 0, false, "claude"),
            (5_000, 1_000, true, "claude"),
            (9_000, 50, false, "local"),
            (700, 700, false, "gemini"),
        ];
        for (prompt, completion, cache, provider) in calls {
            meter.record(est.estimate(prompt, completion, cache, provider), prompt, completion, cache);
            let now = meter.total();
            assert!(now >= previous);
            previous = now;
        }
        let totals = meter.snapshot();
        assert_eq!(totals.calls, 5);
        assert_eq!(totals.cache_hits, 1);
        assert_eq!(totals.prompt_tokens, 15_900);
    }

    #[test]
    fn test_meter_ignores_negative_amounts() {
        let meter = CostMeter::new();
        meter.record(0.5, 10, 10, false);
        meter.record(-1.0, 10, 10, false);
        meter.record(f64::NAN, 10, 10, false);
        assert!((meter.total() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_meter_clones_share_totals() {
        let meter = CostMeter::new();
        let reader = meter.clone();
        meter.record(0.25, 100, 20, false);
        assert!((reader.total() - 0.25).abs() < 1e-12);
        reader.reset();
        assert_eq!(meter.total(), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let meter = CostMeter::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = meter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    m.record(0.001, 1, 1, false);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let totals = meter.snapshot();
        assert_eq!(totals.calls, 800);
        assert!((totals.total_usd - 0.8).abs() < 1e-9);
    }
}
