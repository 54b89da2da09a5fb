//! Burnwatch Store - persistent usage ledger for metered LLM APIs
//!
//! Prices every completed call, attributes it to a fixed-length session,
//! and keeps per-day aggregates, budgets and alerts next to the raw calls.
//!
//! # Architecture
//!
//! ```text
//! UsageEvent ──► PricingTable ──► UsageStore::record_call
//!                                   │  (one transaction)
//!                    ┌──────────────┼──────────────┐
//!                    ▼              ▼              ▼
//!               SessionTracker   api_calls    daily_usage
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calendar;
pub mod error;
pub mod pricing;
pub mod session;
pub mod store;
pub mod types;

pub use calendar::DateRange;
pub use error::{Error, Result};
pub use pricing::{ModelPricing, PricingTable, DEFAULT_MODEL};
pub use session::{SessionState, SessionTracker};
pub use store::{StoreOptions, UsageStore};
pub use types::{
    Alert, AlertKind, AlertPayload, ApiCall, BudgetSetting, DailyUsageAggregate, NewAlert,
    Session, UsageEvent, UsageTotals,
};
