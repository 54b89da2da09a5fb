//! Alert Evaluator
//!
//! Turns the current levels into persisted alerts. Deduplication is a
//! lookup against stored alerts (see [`UsageStore::record_alert`]), so a
//! restarted monitor never re-raises what it already reported this cycle.

use crate::config::AlertConfig;
use crate::error::Result;
use crate::prediction::{cycle_start, next_monthly_reset, predict_exhaustion, will_exhaust_before};
use burnwatch_store::{Alert, AlertKind, AlertPayload, NewAlert, UsageStore};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Levels an evaluation looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Units used this cycle
    pub current_units: u64,
    /// Monthly unit allowance
    pub quota_limit: u64,
    /// Cost accrued this cycle
    pub current_cost: f64,
    /// Monthly budget, if any
    pub budget_limit: Option<f64>,
    /// Units per minute
    pub burn_rate: f64,
}

/// Evaluates thresholds and records the alerts they warrant.
#[derive(Clone)]
pub struct AlertEvaluator {
    store: UsageStore,
    config: AlertConfig,
    timezone: Tz,
}

impl AlertEvaluator {
    /// Evaluator writing to `store`, with thresholds sorted ascending.
    #[must_use]
    pub fn new(store: UsageStore, mut config: AlertConfig, timezone: Tz) -> Self {
        for thresholds in [&mut config.quota_thresholds, &mut config.budget_thresholds] {
            thresholds.sort_by(f64::total_cmp);
            thresholds.dedup();
        }
        Self {
            store,
            config,
            timezone,
        }
    }

    /// Alerting policy in use
    #[must_use]
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Record every alert warranted at `now` and return the new ones.
    ///
    /// All newly crossed thresholds are persisted; per threshold kind only
    /// the highest of them is returned. An empty result is the normal
    /// outcome when nothing changed.
    pub async fn evaluate(
        &self,
        input: &EvaluationInput,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let cycle = cycle_start(now, self.timezone);
        let mut raised = Vec::new();

        if input.quota_limit > 0 {
            let fraction = input.current_units as f64 / input.quota_limit as f64;
            if let Some(alert) = self
                .check_thresholds(
                    AlertKind::QuotaThreshold,
                    &self.config.quota_thresholds,
                    fraction,
                    key_id,
                    now,
                    cycle,
                )
                .await?
            {
                raised.push(alert);
            }
        }

        if let Some(limit) = input.budget_limit.filter(|l| l.is_finite() && *l > 0.0) {
            let fraction = input.current_cost / limit;
            if let Some(alert) = self
                .check_thresholds(
                    AlertKind::BudgetThreshold,
                    &self.config.budget_thresholds,
                    fraction,
                    key_id,
                    now,
                    cycle,
                )
                .await?
            {
                raised.push(alert);
            }
        }

        if input.burn_rate > self.config.high_burn_rate {
            let alert = NewAlert {
                kind: AlertKind::HighBurnRate,
                payload: AlertPayload {
                    threshold: Some(self.config.high_burn_rate),
                    observed: input.burn_rate,
                    message: format!(
                        "High burn rate: {:.0} tokens/min (limit {:.0})",
                        input.burn_rate, self.config.high_burn_rate
                    ),
                },
                key_id: key_id.map(str::to_string),
                timestamp: now,
            };
            let since = now
                .checked_sub_signed(self.config.burn_cooldown())
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            if let Some(stored) = self.store.record_alert(&alert, since).await? {
                raised.push(stored);
            }
        }

        let predicted =
            predict_exhaustion(input.current_units, input.quota_limit, input.burn_rate, now);
        if input.quota_limit > 0
            && will_exhaust_before(predicted, next_monthly_reset(now, self.timezone))
        {
            let minutes_left = predicted.map_or(0.0, |at| (at - now).num_seconds() as f64 / 60.0);
            let alert = NewAlert {
                kind: AlertKind::ProjectedExhaustion,
                payload: AlertPayload {
                    threshold: None,
                    observed: minutes_left,
                    message: format!(
                        "Quota projected to run out in {:.0} min, before the monthly reset",
                        minutes_left
                    ),
                },
                key_id: key_id.map(str::to_string),
                timestamp: now,
            };
            if let Some(stored) = self.store.record_alert(&alert, cycle).await? {
                raised.push(stored);
            }
        }

        debug!(count = raised.len(), "Alert evaluation finished");
        Ok(raised)
    }

    async fn check_thresholds(
        &self,
        kind: AlertKind,
        thresholds: &[f64],
        fraction: f64,
        key_id: Option<&str>,
        now: DateTime<Utc>,
        cycle: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let label = match kind {
            AlertKind::BudgetThreshold => "Budget",
            _ => "Quota",
        };
        let mut highest = None;

        for &threshold in thresholds.iter().filter(|t| fraction >= **t) {
            let alert = NewAlert {
                kind,
                payload: AlertPayload {
                    threshold: Some(threshold),
                    observed: fraction,
                    message: format!(
                        "{label} usage at {:.1}% (crossed {:.0}%)",
                        fraction * 100.0,
                        threshold * 100.0
                    ),
                },
                key_id: key_id.map(str::to_string),
                timestamp: now,
            };
            if let Some(stored) = self.store.record_alert(&alert, cycle).await? {
                highest = Some(stored);
            }
        }
        Ok(highest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnwatch_store::StoreOptions;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 14, 10, 0, 0).single().unwrap()
    }

    fn input(current_units: u64) -> EvaluationInput {
        EvaluationInput {
            current_units,
            quota_limit: 100_000,
            current_cost: 0.0,
            budget_limit: None,
            burn_rate: 0.0,
        }
    }

    async fn evaluator() -> AlertEvaluator {
        let store = UsageStore::in_memory(StoreOptions::default()).await.unwrap();
        AlertEvaluator::new(store, AlertConfig::default(), Tz::UTC)
    }

    #[tokio::test]
    async fn test_below_all_thresholds_is_quiet() {
        let evaluator = evaluator().await;
        let alerts = evaluator.evaluate(&input(10_000), None, now()).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_unsorted_thresholds_are_sorted() {
        let store = UsageStore::in_memory(StoreOptions::default()).await.unwrap();
        let config = AlertConfig {
            quota_thresholds: vec![0.9, 0.5, 0.75, 0.5],
            ..AlertConfig::default()
        };
        let evaluator = AlertEvaluator::new(store, config, Tz::UTC);
        assert_eq!(evaluator.config().quota_thresholds, vec![0.5, 0.75, 0.9]);
    }

    #[tokio::test]
    async fn test_budget_zero_is_ignored() {
        let evaluator = evaluator().await;
        let mut level = input(0);
        level.current_cost = 5.0;
        level.budget_limit = Some(0.0);
        let alerts = evaluator.evaluate(&level, None, now()).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_projected_exhaustion_once_per_cycle() {
        let evaluator = evaluator().await;
        let mut level = input(20_000);
        level.burn_rate = 100.0;

        let first = evaluator.evaluate(&level, None, now()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::ProjectedExhaustion);

        let again = evaluator
            .evaluate(&level, None, now() + Duration::hours(3))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_slow_burn_does_not_project_exhaustion() {
        let evaluator = evaluator().await;
        let mut level = input(20_000);
        // 80k units left at 1/min takes ~55 days, past the reset
        level.burn_rate = 1.0;
        let alerts = evaluator.evaluate(&level, None, now()).await.unwrap();
        assert!(alerts.is_empty());
    }
}
