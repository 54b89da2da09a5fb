//! Prediction Engine - when will the quota or budget run out?

use crate::burn_rate::BurnEstimate;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub use burnwatch_store::calendar::{cycle_start, next_monthly_reset};

/// Instant at which `current` reaches `limit` consuming `rate` per minute.
///
/// Already at or over the limit: `Some(now)`. No positive finite rate:
/// `None`. A horizon too far out to represent is also `None`.
fn project(current: f64, limit: f64, rate: f64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if current >= limit {
        return Some(now);
    }
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    let millis = (limit - current) / rate * 60_000.0;
    if !millis.is_finite() || millis >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis.ceil() as i64).and_then(|d| now.checked_add_signed(d))
}

/// Predicted quota exhaustion for `burn_rate` units per minute.
#[must_use]
pub fn predict_exhaustion(
    current_units: u64,
    quota_limit: u64,
    burn_rate: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    project(current_units as f64, quota_limit as f64, burn_rate, now)
}

/// Predicted budget exhaustion for `cost_burn_rate` currency per minute.
#[must_use]
pub fn predict_budget_exhaustion(
    current_cost: f64,
    budget_limit: f64,
    cost_burn_rate: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    project(current_cost, budget_limit, cost_burn_rate, now)
}

/// Whether a predicted exhaustion lands strictly before `reset`.
#[must_use]
pub fn will_exhaust_before(predicted: Option<DateTime<Utc>>, reset: DateTime<Utc>) -> bool {
    predicted.is_some_and(|at| at < reset)
}

/// Consumption levels of one scope in the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageLevels {
    /// Units used this cycle
    pub current_units: u64,
    /// Monthly unit allowance
    pub quota_limit: u64,
    /// Cost accrued this cycle
    pub current_cost: f64,
    /// Monthly budget, if any
    pub budget_limit: Option<f64>,
}

/// Everything the monitor projects from the current levels and burn rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Predicted quota exhaustion
    pub quota_exhaustion: Option<DateTime<Utc>>,
    /// Predicted budget exhaustion (`None` without a budget)
    pub budget_exhaustion: Option<DateTime<Utc>>,
    /// Next monthly reset
    pub reset_at: DateTime<Utc>,
    /// Quota runs out before the reset
    pub quota_exhausts_before_reset: bool,
    /// Budget runs out before the reset
    pub budget_exhausts_before_reset: bool,
}

/// Combines levels and burn rate into a [`Forecast`] for one timezone.
#[derive(Debug, Clone, Copy)]
pub struct PredictionEngine {
    timezone: Tz,
}

impl PredictionEngine {
    /// Engine resetting quotas at local month boundaries in `timezone`
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Next monthly reset after `now`
    #[must_use]
    pub fn next_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_monthly_reset(now, self.timezone)
    }

    /// Start of the cycle containing `now`
    #[must_use]
    pub fn cycle_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cycle_start(now, self.timezone)
    }

    /// Project quota and budget exhaustion at `now`.
    #[must_use]
    pub fn forecast(
        &self,
        levels: &UsageLevels,
        burn: &BurnEstimate,
        now: DateTime<Utc>,
    ) -> Forecast {
        let reset_at = self.next_reset(now);
        let quota_exhaustion = predict_exhaustion(
            levels.current_units,
            levels.quota_limit,
            burn.units_per_minute,
            now,
        );
        let budget_exhaustion = levels.budget_limit.and_then(|limit| {
            predict_budget_exhaustion(levels.current_cost, limit, burn.cost_per_minute, now)
        });

        Forecast {
            quota_exhaustion,
            budget_exhaustion,
            reset_at,
            quota_exhausts_before_reset: will_exhaust_before(quota_exhaustion, reset_at),
            budget_exhausts_before_reset: will_exhaust_before(budget_exhaustion, reset_at),
        }
    }
}

// ============================================================================
// Display helpers
// ============================================================================

/// Format a number compactly (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
#[must_use]
pub fn format_compact_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Format a duration until an event: "2d 04h", "3h 05m", "4m 09s", "12s" or "now".
#[must_use]
pub fn format_duration(d: &Duration) -> String {
    let total_secs = d.num_seconds();
    if total_secs <= 0 {
        return "now".to_string();
    }
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if days > 0 {
        format!("{}d {:02}h", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn test_predict_exhaustion_linear() {
        let at = predict_exhaustion(40_000, 100_000, 100.0, now()).unwrap();
        assert_eq!(at, now() + Duration::minutes(600));
    }

    #[test]
    fn test_predict_exhaustion_edges() {
        assert_eq!(predict_exhaustion(100_000, 100_000, 0.0, now()), Some(now()));
        assert_eq!(predict_exhaustion(150_000, 100_000, 10.0, now()), Some(now()));
        assert_eq!(predict_exhaustion(10, 100_000, 0.0, now()), None);
        assert_eq!(predict_exhaustion(10, 100_000, -3.0, now()), None);
        assert_eq!(predict_exhaustion(10, 100_000, f64::NAN, now()), None);
        assert_eq!(predict_exhaustion(0, u64::MAX, 1e-12, now()), None);
    }

    #[test]
    fn test_predict_budget_exhaustion() {
        let at = predict_budget_exhaustion(40.0, 50.0, 0.5, now()).unwrap();
        assert_eq!(at, now() + Duration::minutes(20));
        assert_eq!(predict_budget_exhaustion(40.0, 50.0, 0.0, now()), None);
    }

    #[test]
    fn test_will_exhaust_before() {
        let reset = now() + Duration::days(1);
        assert!(!will_exhaust_before(None, reset));
        assert!(will_exhaust_before(Some(now()), reset));
        assert!(!will_exhaust_before(Some(reset), reset));
    }

    #[test]
    fn test_forecast_without_budget() {
        let engine = PredictionEngine::new(Tz::UTC);
        let levels = UsageLevels {
            current_units: 90_000,
            quota_limit: 100_000,
            current_cost: 3.0,
            budget_limit: None,
        };
        let burn = BurnEstimate {
            units_per_minute: 100.0,
            blended_cost_per_unit: 0.00003,
            cost_per_minute: 0.003,
            calls_in_window: 4,
        };
        let forecast = engine.forecast(&levels, &burn, now());
        assert_eq!(
            forecast.reset_at,
            Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).single().unwrap()
        );
        assert_eq!(forecast.quota_exhaustion, Some(now() + Duration::minutes(100)));
        assert!(forecast.quota_exhausts_before_reset);
        assert_eq!(forecast.budget_exhaustion, None);
        assert!(!forecast.budget_exhausts_before_reset);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_compact_number(999), "999");
        assert_eq!(format_compact_number(1_234), "1.2K");
        assert_eq!(format_compact_number(2_500_000), "2.5M");
        assert_eq!(format_duration(&Duration::seconds(0)), "now");
        assert_eq!(format_duration(&Duration::seconds(42)), "42s");
        assert_eq!(format_duration(&Duration::seconds(249)), "4m 09s");
        assert_eq!(format_duration(&Duration::minutes(185)), "3h 05m");
        assert_eq!(format_duration(&Duration::hours(52)), "2d 04h");
    }
}
