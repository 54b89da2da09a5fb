//! Persisted entities and the values passed across the store boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalise an optional key scope (`Some("")` means no key).
#[must_use]
pub fn normalize_key(key_id: Option<&str>) -> Option<&str> {
    key_id.map(str::trim).filter(|k| !k.is_empty())
}

/// One completed, metered request as reported by the API client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Model identifier
    pub model: String,
    /// Prompt units (tokens)
    pub prompt_units: u64,
    /// Completion units (tokens)
    pub completion_units: u64,
    /// When the call completed
    pub timestamp: DateTime<Utc>,
    /// Credential the call is attributed to
    pub key_id: Option<String>,
}

impl UsageEvent {
    /// Event for `model` completed at `timestamp`, unattributed
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        prompt_units: u64,
        completion_units: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt_units,
            completion_units,
            timestamp,
            key_id: None,
        }
    }

    /// Attribute the event to a key
    #[must_use]
    pub fn with_key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

/// A persisted API call. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    /// Call ID
    pub id: String,
    /// Completion time
    pub timestamp: DateTime<Utc>,
    /// Model identifier as reported
    pub model: String,
    /// Prompt units
    pub prompt_units: u64,
    /// Completion units
    pub completion_units: u64,
    /// prompt_units + completion_units
    pub total_units: u64,
    /// Cost (USD) computed at insert time
    pub cost: f64,
    /// Attributed key
    pub key_id: Option<String>,
    /// Session the call was attributed to
    pub session_id: String,
}

/// A fixed-duration usage window for one key scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: String,
    /// Key scope
    pub key_id: Option<String>,
    /// Start of the window
    pub start_time: DateTime<Utc>,
    /// End of the window (exclusive)
    pub end_time: DateTime<Utc>,
}

impl Session {
    /// Whether the window is still open at `now`
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.end_time
    }

    /// Time left in the window at `now` (zero once expired)
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.end_time - now).max(chrono::Duration::zero())
    }
}

/// Per-day, per-model, per-key usage totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageAggregate {
    /// Calendar date in the store's timezone
    pub date: NaiveDate,
    /// Model identifier
    pub model: String,
    /// Key scope
    pub key_id: Option<String>,
    /// Units consumed
    pub total_units: u64,
    /// Cost accrued
    pub total_cost: f64,
    /// Number of calls
    pub call_count: u64,
}

/// Budget configuration for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSetting {
    /// Monthly limit in USD; `None` means unlimited
    pub monthly_limit: Option<f64>,
    /// Key scope
    pub key_id: Option<String>,
    /// When this setting took over
    pub effective_from: DateTime<Utc>,
}

/// Units, cost and call count over some span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Total units
    pub units: u64,
    /// Total cost
    pub cost: f64,
    /// Number of calls
    pub calls: u64,
}

/// Alert category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Quota usage fraction crossed a threshold
    QuotaThreshold,
    /// Budget usage fraction crossed a threshold
    BudgetThreshold,
    /// Burn rate above the configured absolute limit
    HighBurnRate,
    /// Quota predicted to run out before the monthly reset
    ProjectedExhaustion,
}

impl AlertKind {
    /// Stable storage name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaThreshold => "QUOTA_THRESHOLD",
            Self::BudgetThreshold => "BUDGET_THRESHOLD",
            Self::HighBurnRate => "HIGH_BURN_RATE",
            Self::ProjectedExhaustion => "PROJECTED_EXHAUSTION",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUOTA_THRESHOLD" => Ok(Self::QuotaThreshold),
            "BUDGET_THRESHOLD" => Ok(Self::BudgetThreshold),
            "HIGH_BURN_RATE" => Ok(Self::HighBurnRate),
            "PROJECTED_EXHAUSTION" => Ok(Self::ProjectedExhaustion),
            other => Err(format!("unknown alert kind: {other}")),
        }
    }
}

/// What an alert reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Threshold crossed (fraction, or tokens/min for burn alerts)
    pub threshold: Option<f64>,
    /// Value observed when the alert fired
    pub observed: f64,
    /// Human-readable message
    pub message: String,
}

/// An alert about to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    /// Category
    pub kind: AlertKind,
    /// Payload
    pub payload: AlertPayload,
    /// Key scope
    pub key_id: Option<String>,
    /// When the condition was observed
    pub timestamp: DateTime<Utc>,
}

/// A recorded alert. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert ID
    pub id: String,
    /// When it fired
    pub timestamp: DateTime<Utc>,
    /// Category
    pub kind: AlertKind,
    /// Payload
    pub payload: AlertPayload,
    /// Key scope
    pub key_id: Option<String>,
}
