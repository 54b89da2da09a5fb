//! UsageStore - SQLite persistence for calls, sessions, daily aggregates,
//! budgets and alerts.
//!
//! Every write path runs inside one SQL transaction and behind the store's
//! write lock, so a call and its aggregate upsert are never observed apart.

use crate::error::Result;
use crate::pricing::PricingTable;
use crate::session::{SessionTracker, DEFAULT_SESSION_DURATION_HOURS};
use chrono::Duration;
use chrono_tz::Tz;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod aggregates;
mod alerts;
mod budget;
mod calls;
mod helpers;
mod migrations;
mod sessions;


/// Settings the store needs to price, bucket and attribute calls.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Rates used to price calls at insert time
    pub pricing: PricingTable,
    /// Length of a usage session
    pub session_duration: Duration,
    /// Timezone for daily buckets
    pub timezone: Tz,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pricing: PricingTable::default(),
            session_duration: Duration::hours(DEFAULT_SESSION_DURATION_HOURS),
            timezone: Tz::UTC,
        }
    }
}

/// SQLite-backed usage store.
///
/// Cheap to clone; clones share the pool and the write lock.
#[derive(Clone)]
pub struct UsageStore {
    pub(crate) pool: SqlitePool,
    pricing: Arc<PricingTable>,
    sessions: SessionTracker,
    timezone: Tz,
    write_lock: Arc<Mutex<()>>,
}

impl UsageStore {
    /// Open (or create) a store at the given path.
    pub async fn from_path(db_path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                crate::Error::StoreUnavailable(sqlx::Error::Io(e))
            })?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        // Enable WAL for read/write concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self::with_pool(pool, options);
        store.run_migrations().await?;
        info!("Usage store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests and demo runs).
    pub async fn in_memory(options: StoreOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::with_pool(pool, options);
        store.run_migrations().await?;
        debug!("In-memory usage store initialized");
        Ok(store)
    }

    fn with_pool(pool: SqlitePool, options: StoreOptions) -> Self {
        Self {
            pool,
            pricing: Arc::new(options.pricing),
            sessions: SessionTracker::new(options.session_duration),
            timezone: options.timezone,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Pricing table used at insert time
    #[must_use]
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Session tracker (duration and state machine)
    #[must_use]
    pub fn session_tracker(&self) -> SessionTracker {
        self.sessions
    }

    /// Timezone used for daily buckets
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}
