//! UsageMonitor - wires the store, estimator, predictor and evaluator
//! together from one [`MonitorConfig`].

use crate::alerts::{AlertEvaluator, EvaluationInput};
use crate::analytics::AnalyticsAggregator;
use crate::burn_rate::{BurnEstimate, BurnRateEstimator};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::prediction::{Forecast, PredictionEngine, UsageLevels};
use burnwatch_store::{
    Alert, ApiCall, BudgetSetting, Session, UsageEvent, UsageStore, UsageTotals,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// How far back `recent_alerts` looks
pub const RECENT_ALERT_WINDOW_HOURS: i64 = 24;

/// How many recent alerts a status carries
pub const RECENT_ALERT_LIMIT: u32 = 3;

/// Read-only snapshot of one scope at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Scope (`None` = overall)
    pub key_id: Option<String>,
    /// Instant of the snapshot
    pub timestamp: DateTime<Utc>,
    /// Active session of exactly this scope, if any. Sessions are per key,
    /// so for the overall scope this is the session of unattributed calls
    /// while the cycle totals cover every key.
    pub session: Option<Session>,
    /// Usage attributed to `session`
    pub session_totals: UsageTotals,
    /// Start of the monthly cycle
    pub cycle_start: DateTime<Utc>,
    /// Usage since the cycle started
    pub cycle_totals: UsageTotals,
    /// Monthly unit allowance
    pub quota_limit: u64,
    /// `cycle_totals.units / quota_limit`
    pub quota_fraction: f64,
    /// Effective monthly budget
    pub budget_limit: Option<f64>,
    /// `cycle_totals.cost / budget_limit`
    pub budget_fraction: Option<f64>,
    /// Current burn rate
    pub burn: BurnEstimate,
    /// Exhaustion forecast
    pub forecast: Forecast,
    /// Latest alerts of the last 24 hours, newest first
    pub recent_alerts: Vec<Alert>,
}

impl MonitorStatus {
    /// Levels handed to the alert evaluator
    #[must_use]
    pub fn evaluation_input(&self) -> EvaluationInput {
        EvaluationInput {
            current_units: self.cycle_totals.units,
            quota_limit: self.quota_limit,
            current_cost: self.cycle_totals.cost,
            budget_limit: self.budget_limit,
            burn_rate: self.burn.units_per_minute,
        }
    }

    /// Time left in the active session
    #[must_use]
    pub fn session_remaining(&self) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|s| s.remaining_at(self.timestamp))
    }
}

/// Outcome of one monitor refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Snapshot the alerts were evaluated against
    pub status: MonitorStatus,
    /// Alerts raised by this tick
    pub new_alerts: Vec<Alert>,
}

/// The monitoring core behind one store.
#[derive(Clone)]
pub struct UsageMonitor {
    config: MonitorConfig,
    store: UsageStore,
    estimator: BurnRateEstimator<UsageStore>,
    predictor: PredictionEngine,
    evaluator: AlertEvaluator,
    analytics: AnalyticsAggregator,
    quota_limit: u64,
}

impl UsageMonitor {
    /// Open a file-backed monitor.
    pub async fn open(config: MonitorConfig, db_path: &Path) -> Result<Self> {
        config.validate()?;
        let store = UsageStore::from_path(db_path, config.store_options()?).await?;
        let monitor = Self::new(store, config)?;
        info!(quota = monitor.quota_limit, "Usage monitor ready");
        Ok(monitor)
    }

    /// Monitor over an in-memory store.
    pub async fn in_memory(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let store = UsageStore::in_memory(config.store_options()?).await?;
        Self::new(store, config)
    }

    /// Monitor over an existing store. Timezone and pricing come from the
    /// store; thresholds, quota and budget from `config`.
    pub fn new(store: UsageStore, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let quota_limit = config.quota_limit()?;
        let timezone = store.timezone();
        Ok(Self {
            estimator: BurnRateEstimator::new(store.clone()),
            predictor: PredictionEngine::new(timezone),
            evaluator: AlertEvaluator::new(store.clone(), config.alerts.clone(), timezone),
            analytics: AnalyticsAggregator::new(store.clone()),
            store,
            config,
            quota_limit,
        })
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &UsageStore {
        &self.store
    }

    /// Analytics over the same store
    #[must_use]
    pub fn analytics(&self) -> &AnalyticsAggregator {
        &self.analytics
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Burn rate estimator over the same store
    #[must_use]
    pub fn estimator(&self) -> &BurnRateEstimator<UsageStore> {
        &self.estimator
    }

    /// Record a completed call.
    pub async fn record(&self, event: UsageEvent) -> Result<ApiCall> {
        Ok(self.store.record_call(event).await?)
    }

    /// Set (or clear, with `None`) the monthly budget of a scope.
    pub async fn set_budget(
        &self,
        monthly_limit: Option<f64>,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BudgetSetting> {
        Ok(self.store.set_budget(monthly_limit, key_id, now).await?)
    }

    /// Budget in effect for a scope: the stored setting, else the
    /// configured default.
    pub async fn effective_budget(&self, key_id: Option<&str>) -> Result<Option<f64>> {
        Ok(match self.store.get_budget(key_id).await? {
            Some(setting) => setting.monthly_limit,
            None => self.config.budget_limit,
        })
    }

    /// Alerts of the last 24 hours, newest first (at most three).
    pub async fn recent_alerts(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let since = now - Duration::hours(RECENT_ALERT_WINDOW_HOURS);
        Ok(self
            .store
            .alerts_since(since, key_id, RECENT_ALERT_LIMIT)
            .await?)
    }

    /// Snapshot of a scope at `now`. Never writes.
    pub async fn status(&self, key_id: Option<&str>, now: DateTime<Utc>) -> Result<MonitorStatus> {
        let cycle_start = self.predictor.cycle_start(now);
        let cycle_totals = self.store.usage_totals_since(cycle_start, key_id).await?;

        let session = self.store.current_session(key_id, now).await?;
        let session_totals = match &session {
            Some(s) => self.store.session_totals(&s.id).await?,
            None => UsageTotals::default(),
        };

        let budget_limit = self.effective_budget(key_id).await?;
        let burn = self.estimator.estimate(key_id, now).await?;

        let levels = UsageLevels {
            current_units: cycle_totals.units,
            quota_limit: self.quota_limit,
            current_cost: cycle_totals.cost,
            budget_limit,
        };
        let forecast = self.predictor.forecast(&levels, &burn, now);

        Ok(MonitorStatus {
            key_id: key_id.map(str::to_string),
            timestamp: now,
            session,
            session_totals,
            cycle_start,
            cycle_totals,
            quota_limit: self.quota_limit,
            quota_fraction: cycle_totals.units as f64 / self.quota_limit as f64,
            budget_limit,
            budget_fraction: budget_limit
                .filter(|l| *l > 0.0)
                .map(|l| cycle_totals.cost / l),
            burn,
            forecast,
            recent_alerts: self.recent_alerts(key_id, now).await?,
        })
    }

    /// Refresh a scope: take a snapshot and record the alerts it warrants.
    pub async fn tick(&self, key_id: Option<&str>, now: DateTime<Utc>) -> Result<TickReport> {
        let mut status = self.status(key_id, now).await?;
        let new_alerts = self
            .evaluator
            .evaluate(&status.evaluation_input(), key_id, now)
            .await?;

        if !new_alerts.is_empty() {
            status.recent_alerts = self.recent_alerts(key_id, now).await?;
        }
        debug!(
            units = status.cycle_totals.units,
            burn = status.burn.units_per_minute,
            alerts = new_alerts.len(),
            "Monitor tick"
        );
        Ok(TickReport { status, new_alerts })
    }
}
