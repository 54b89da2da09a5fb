use super::helpers::{fmt_ts, row_to_alert, scope, storable};
use super::UsageStore;
use crate::error::Result;
use crate::types::{normalize_key, Alert, NewAlert};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

impl UsageStore {
    // ── Alerts ──────────────────────────────────────────────────

    /// Persist an alert unless an identical one (same kind, scope and
    /// threshold) was already recorded at or after `dedup_since`.
    ///
    /// Returns the stored alert, or `None` when it was suppressed.
    pub async fn record_alert(
        &self,
        alert: &NewAlert,
        dedup_since: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let scope = scope(alert.key_id.as_deref());
        let kind = alert.kind.as_str();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT id FROM alerts
             WHERE kind = ?1 AND key_id = ?2 AND threshold IS ?3 AND timestamp >= ?4
             LIMIT 1",
        )
        .bind(kind)
        .bind(scope)
        .bind(alert.payload.threshold)
        .bind(fmt_ts(dedup_since))
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            debug!(kind, scope, threshold = ?alert.payload.threshold, "Alert suppressed");
            return Ok(None);
        }

        let stored = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: storable(alert.timestamp),
            kind: alert.kind,
            payload: alert.payload.clone(),
            key_id: normalize_key(alert.key_id.as_deref()).map(str::to_string),
        };

        sqlx::query(
            "INSERT INTO alerts (id, timestamp, kind, threshold, observed, message, key_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&stored.id)
        .bind(fmt_ts(stored.timestamp))
        .bind(kind)
        .bind(stored.payload.threshold)
        .bind(stored.payload.observed)
        .bind(&stored.payload.message)
        .bind(scope)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(kind, scope, "{}", stored.payload.message);
        Ok(Some(stored))
    }

    /// Alerts at or after `since`, newest first, at most `limit` of them.
    pub async fn alerts_since(
        &self,
        since: DateTime<Utc>,
        key_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, kind, threshold, observed, message, key_id
             FROM alerts
             WHERE timestamp >= ?1 AND (?2 IS NULL OR key_id = ?2)
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?3",
        )
        .bind(fmt_ts(since))
        .bind(normalize_key(key_id))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_alert).collect()
    }
}
