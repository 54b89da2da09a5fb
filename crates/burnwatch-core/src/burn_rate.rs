//! Burn rate estimation
//!
//! Velocity is a weighted average over the most recent non-empty minute
//! buckets of the trailing window:
//!
//! ```text
//! window [now-60m, now]  ──►  per-minute unit sums  ──►  last 3 non-empty
//!                                                          │
//!                                   Σ wᵢ·unitsᵢ / Σ wᵢ  ◄──┘  (w = 0.5, 0.3, 0.2)
//! ```
//!
//! With fewer than three buckets the weights are truncated and the result
//! renormalised by the weights actually used.

use async_trait::async_trait;
use burnwatch_store::{ApiCall, UsageStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trailing window length in minutes
pub const DEFAULT_WINDOW_MINUTES: i64 = 60;

/// Bucket weights, most recent first
pub const DEFAULT_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Read access to persisted calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallHistory: Send + Sync {
    /// Calls at or after `since`, oldest first (`None` key = all keys)
    async fn calls_since(
        &self,
        since: DateTime<Utc>,
        key_id: Option<String>,
    ) -> burnwatch_store::Result<Vec<ApiCall>>;
}

#[async_trait]
impl CallHistory for UsageStore {
    async fn calls_since(
        &self,
        since: DateTime<Utc>,
        key_id: Option<String>,
    ) -> burnwatch_store::Result<Vec<ApiCall>> {
        self.get_calls_since(since, key_id.as_deref()).await
    }
}

/// Burn rate with its cost equivalent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnEstimate {
    /// Weighted units per minute
    pub units_per_minute: f64,
    /// Σcost / Σunits of the calls in the window (0 without units)
    pub blended_cost_per_unit: f64,
    /// `units_per_minute * blended_cost_per_unit`
    pub cost_per_minute: f64,
    /// Calls seen in the window
    pub calls_in_window: usize,
}

/// Estimates recent consumption velocity from stored calls.
#[derive(Debug, Clone)]
pub struct BurnRateEstimator<H> {
    history: H,
    window: Duration,
    weights: Vec<f64>,
}

impl<H: CallHistory> BurnRateEstimator<H> {
    /// Estimator with the default window and weights
    pub fn new(history: H) -> Self {
        Self {
            history,
            window: Duration::minutes(DEFAULT_WINDOW_MINUTES),
            weights: DEFAULT_WEIGHTS.to_vec(),
        }
    }

    /// Replace the bucket weights (most recent first).
    ///
    /// The number of weights is the number of buckets considered.
    #[must_use]
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the trailing window
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Bucket weights in use
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Units per minute at `now`; 0.0 when the window is empty.
    pub async fn estimate_burn_rate(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> burnwatch_store::Result<f64> {
        Ok(self.estimate(key_id, now).await?.units_per_minute)
    }

    /// Burn rate plus the blended cost per unit of the same window.
    pub async fn estimate(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> burnwatch_store::Result<BurnEstimate> {
        let since = now - self.window;
        let calls = self
            .history
            .calls_since(since, key_id.map(str::to_string))
            .await?;
        let in_window: Vec<&ApiCall> = calls.iter().filter(|c| c.timestamp <= now).collect();

        let units_per_minute = weighted_rate(&in_window, &self.weights);
        let (units, cost) = in_window
            .iter()
            .fold((0u64, 0.0f64), |(u, c), call| {
                (u.saturating_add(call.total_units), c + call.cost)
            });
        let blended_cost_per_unit = if units == 0 { 0.0 } else { cost / units as f64 };

        Ok(BurnEstimate {
            units_per_minute,
            blended_cost_per_unit,
            cost_per_minute: units_per_minute * blended_cost_per_unit,
            calls_in_window: in_window.len(),
        })
    }
}

fn weighted_rate(calls: &[&ApiCall], weights: &[f64]) -> f64 {
    let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();
    for call in calls {
        let minute = call.timestamp.timestamp().div_euclid(60);
        let bucket = buckets.entry(minute).or_default();
        *bucket = bucket.saturating_add(call.total_units);
    }

    let (weighted, used) = buckets
        .values()
        .rev()
        .zip(weights)
        .fold((0.0, 0.0), |(sum, used), (units, w)| {
            (sum + *units as f64 * w, used + w)
        });

    if used > 0.0 {
        weighted / used
    } else {
        0.0
    }
}
