//! Monitor configuration types
//!
//! Every field has a serde default so a partial TOML file (or none at all)
//! yields a usable configuration.

use crate::error::{Error, Result};
use burnwatch_store::{ModelPricing, PricingTable, StoreOptions};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// SQLite database file; `None` lets the binary pick its data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Session window length in hours
    #[serde(default = "default_session_duration_hours")]
    pub session_duration_hours: u32,
    /// Monthly quota
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Monthly budget in USD used when the store has no setting for a scope
    #[serde(default)]
    pub budget_limit: Option<f64>,
    /// IANA timezone for daily buckets and the monthly reset
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Seconds between monitor refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Alerting policy
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Per-model rate overrides, keyed by model identifier
    #[serde(default)]
    pub pricing: HashMap<String, RateConfig>,
}

fn default_session_duration_hours() -> u32 {
    5
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    3
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            session_duration_hours: default_session_duration_hours(),
            quota: QuotaConfig::default(),
            budget_limit: None,
            timezone: default_timezone(),
            refresh_interval_secs: default_refresh_interval_secs(),
            alerts: AlertConfig::default(),
            pricing: HashMap::new(),
        }
    }
}

impl MonitorConfig {
    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session_duration_hours == 0 {
            return Err(Error::InvalidConfig(
                "session_duration_hours must be at least 1".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        self.timezone()?;
        self.quota.limit()?;

        if let Some(limit) = self.budget_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(Error::InvalidBudget(format!(
                    "budget_limit must be a non-negative amount, got {limit}"
                )));
            }
        }

        validate_thresholds("alerts.quota_thresholds", &self.alerts.quota_thresholds)?;
        validate_thresholds("alerts.budget_thresholds", &self.alerts.budget_thresholds)?;

        if !self.alerts.high_burn_rate.is_finite() || self.alerts.high_burn_rate <= 0.0 {
            return Err(Error::InvalidConfig(
                "alerts.high_burn_rate must be a positive rate".to_string(),
            ));
        }

        for (model, rate) in &self.pricing {
            if !rate.is_valid() {
                return Err(Error::InvalidConfig(format!(
                    "pricing.{model}: rates must be non-negative"
                )));
            }
        }
        Ok(())
    }

    /// Parsed timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| Error::InvalidConfig(format!("timezone {:?}: {e}", self.timezone)))
    }

    /// Monthly unit allowance
    pub fn quota_limit(&self) -> Result<u64> {
        self.quota.limit()
    }

    /// Session window length
    #[must_use]
    pub fn session_duration(&self) -> Duration {
        Duration::hours(i64::from(self.session_duration_hours))
    }

    /// Default pricing table with the configured overrides applied
    #[must_use]
    pub fn pricing_table(&self) -> PricingTable {
        self.pricing
            .iter()
            .fold(PricingTable::default(), |table, (model, rate)| {
                table.with_model(ModelPricing::new(
                    model.clone(),
                    "custom",
                    rate.prompt_per_million,
                    rate.completion_per_million,
                ))
            })
    }

    /// Options for opening the usage store
    pub fn store_options(&self) -> Result<StoreOptions> {
        Ok(StoreOptions {
            pricing: self.pricing_table(),
            session_duration: self.session_duration(),
            timezone: self.timezone()?,
        })
    }
}

fn validate_thresholds(field: &str, thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        return Err(Error::InvalidConfig(format!("{field} must not be empty")));
    }
    if let Some(bad) = thresholds.iter().find(|t| !(**t > 0.0 && **t <= 1.0)) {
        return Err(Error::InvalidConfig(format!(
            "{field}: {bad} is outside (0, 1]"
        )));
    }
    Ok(())
}

/// Usage tier (approximate monthly token allowance)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaTier {
    /// 100k units
    #[default]
    Tier1,
    /// 500k units
    Tier2,
    /// 1M units
    Tier3,
    /// 5M units
    Tier4,
    /// 50M units
    Tier5,
    /// `custom_limit`
    Custom,
}

impl QuotaTier {
    /// Built-in allowance (`None` for [`QuotaTier::Custom`])
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::Tier1 => Some(100_000),
            Self::Tier2 => Some(500_000),
            Self::Tier3 => Some(1_000_000),
            Self::Tier4 => Some(5_000_000),
            Self::Tier5 => Some(50_000_000),
            Self::Custom => None,
        }
    }
}

/// Quota configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Usage tier
    #[serde(default)]
    pub tier: QuotaTier,
    /// Allowance when `tier = "custom"`
    #[serde(default)]
    pub custom_limit: Option<u64>,
}

impl QuotaConfig {
    /// Resolved monthly allowance
    pub fn limit(&self) -> Result<u64> {
        match (self.tier.limit(), self.custom_limit) {
            (Some(limit), _) => Ok(limit),
            (None, Some(limit)) if limit > 0 => Ok(limit),
            (None, _) => Err(Error::InvalidConfig(
                "quota.custom_limit must be a positive number when tier is custom".to_string(),
            )),
        }
    }
}

/// Alerting policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Fractions of the quota that raise QUOTA_THRESHOLD
    #[serde(default = "default_thresholds")]
    pub quota_thresholds: Vec<f64>,
    /// Fractions of the budget that raise BUDGET_THRESHOLD
    #[serde(default = "default_thresholds")]
    pub budget_thresholds: Vec<f64>,
    /// Units per minute above which HIGH_BURN_RATE fires
    #[serde(default = "default_high_burn_rate")]
    pub high_burn_rate: f64,
    /// Minimum seconds between two HIGH_BURN_RATE alerts
    #[serde(default = "default_burn_cooldown_secs")]
    pub burn_cooldown_secs: u64,
}

fn default_thresholds() -> Vec<f64> {
    vec![0.5, 0.75, 0.9]
}

fn default_high_burn_rate() -> f64 {
    500.0
}

const MAX_BURN_COOLDOWN_SECS: u64 = 365 * 24 * 3600;

fn default_burn_cooldown_secs() -> u64 {
    300
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            quota_thresholds: default_thresholds(),
            budget_thresholds: default_thresholds(),
            high_burn_rate: default_high_burn_rate(),
            burn_cooldown_secs: default_burn_cooldown_secs(),
        }
    }
}

impl AlertConfig {
    /// HIGH_BURN_RATE cool-down
    #[must_use]
    pub fn burn_cooldown(&self) -> Duration {
        // clamp to a year so the window start is always representable
        Duration::seconds(self.burn_cooldown_secs.min(MAX_BURN_COOLDOWN_SECS) as i64)
    }
}

/// Rates for one model, USD per million units
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateConfig {
    /// Prompt rate
    pub prompt_per_million: f64,
    /// Completion rate
    pub completion_per_million: f64,
}

impl RateConfig {
    fn is_valid(&self) -> bool {
        [self.prompt_per_million, self.completion_per_million]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0)
    }
}
