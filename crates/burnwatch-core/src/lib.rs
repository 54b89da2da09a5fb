//! Burnwatch Core - burn rate, exhaustion forecasts and alerting
//!
//! Reads the usage ledger kept by `burnwatch-store`, estimates how fast the
//! quota is burning and raises alerts before it runs out.
//!
//! ```text
//! UsageStore ──► BurnRateEstimator ──► PredictionEngine ──► AlertEvaluator
//!     │                                                        │
//!     └──────────► AnalyticsAggregator              record_alert (dedup)
//! ```

#![forbid(unsafe_code)]

pub mod alerts;
pub mod analytics;
pub mod burn_rate;
pub mod config;
pub mod error;
pub mod monitor;
pub mod prediction;

pub use alerts::{AlertEvaluator, EvaluationInput};
pub use analytics::{AnalyticsAggregator, DailySummary, HourSummary, ModelSummary};
pub use burn_rate::{BurnEstimate, BurnRateEstimator, CallHistory};
pub use config::{AlertConfig, MonitorConfig, QuotaConfig, QuotaTier, RateConfig};
pub use error::{Error, Result};
pub use monitor::{MonitorStatus, TickReport, UsageMonitor};
pub use prediction::{
    format_compact_number, format_duration, predict_budget_exhaustion, predict_exhaustion,
    will_exhaust_before, Forecast, PredictionEngine, UsageLevels,
};
