use super::helpers::{clamp_units, fmt_ts, row_to_call, scope, storable, to_db};
use super::UsageStore;
use crate::calendar::local_date;
use crate::error::Result;
use crate::types::{normalize_key, ApiCall, UsageEvent, UsageTotals};
use chrono::{DateTime, Utc};
use tracing::debug;

const CALL_COLUMNS: &str = "id, session_id, timestamp, model, prompt_units, completion_units,
                            total_units, cost, key_id";

impl UsageStore {
    // ── Calls ───────────────────────────────────────────────────

    /// Price and persist a completed call.
    ///
    /// Unit counts are capped at `i64::MAX`, the largest value a column
    /// holds, before pricing. Unknown models are charged at the pricing
    /// table's default rate. The
    /// call insert, the daily aggregate upsert and the session lookup (or
    /// creation) commit together or not at all.
    pub async fn record_call(&self, event: UsageEvent) -> Result<ApiCall> {
        let key_id = normalize_key(event.key_id.as_deref()).map(str::to_string);
        let scope = scope(key_id.as_deref()).to_string();
        let timestamp = storable(event.timestamp);
        let prompt_units = clamp_units(event.prompt_units);
        let completion_units = clamp_units(event.completion_units);
        let total_units = clamp_units(prompt_units.saturating_add(completion_units));
        let cost = self
            .pricing
            .cost(&event.model, prompt_units, completion_units);
        let date = local_date(timestamp, self.timezone).to_string();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let session = self
            .sessions
            .ensure_active(&mut tx, &scope, timestamp)
            .await?;

        let call = ApiCall {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            model: event.model,
            prompt_units,
            completion_units,
            total_units,
            cost,
            key_id,
            session_id: session.id,
        };

        sqlx::query(
            "INSERT INTO api_calls
             (id, session_id, timestamp, model, prompt_units, completion_units,
              total_units, cost, key_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&call.id)
        .bind(&call.session_id)
        .bind(fmt_ts(call.timestamp))
        .bind(&call.model)
        .bind(to_db(call.prompt_units))
        .bind(to_db(call.completion_units))
        .bind(to_db(call.total_units))
        .bind(call.cost)
        .bind(&scope)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO daily_usage (date, model, key_id, total_units, total_cost, call_count)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)
             ON CONFLICT(date, model, key_id) DO UPDATE SET
                total_units = total_units + excluded.total_units,
                total_cost  = total_cost + excluded.total_cost,
                call_count  = call_count + 1",
        )
        .bind(&date)
        .bind(&call.model)
        .bind(&scope)
        .bind(to_db(call.total_units))
        .bind(call.cost)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            call_id = %call.id,
            model = %call.model,
            units = call.total_units,
            cost = call.cost,
            "Recorded API call"
        );
        Ok(call)
    }

    /// Calls at or after `since`, oldest first.
    ///
    /// `key_id = None` spans every key.
    pub async fn get_calls_since(
        &self,
        since: DateTime<Utc>,
        key_id: Option<&str>,
    ) -> Result<Vec<ApiCall>> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM api_calls
             WHERE timestamp >= ?1 AND (?2 IS NULL OR key_id = ?2)
             ORDER BY timestamp ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(fmt_ts(since))
            .bind(normalize_key(key_id))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_call).collect()
    }

    /// Calls in `[start, end)`, oldest first.
    pub async fn get_calls_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        key_id: Option<&str>,
    ) -> Result<Vec<ApiCall>> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM api_calls
             WHERE timestamp >= ?1 AND timestamp < ?2 AND (?3 IS NULL OR key_id = ?3)
             ORDER BY timestamp ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(fmt_ts(start))
            .bind(fmt_ts(end))
            .bind(normalize_key(key_id))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_call).collect()
    }

    /// Totals of calls at or after `since` (`None` key spans every key).
    pub async fn usage_totals_since(
        &self,
        since: DateTime<Utc>,
        key_id: Option<&str>,
    ) -> Result<UsageTotals> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(total_units), 0) AS units,
                    COALESCE(SUM(cost), 0.0)      AS cost,
                    COUNT(*)                      AS calls
             FROM api_calls
             WHERE timestamp >= ?1 AND (?2 IS NULL OR key_id = ?2)",
        )
        .bind(fmt_ts(since))
        .bind(normalize_key(key_id))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_totals(&row)
    }

    /// Number of persisted calls.
    pub async fn call_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS calls FROM api_calls")
            .fetch_one(&self.pool)
            .await?;
        Ok(super::helpers::from_db(sqlx::Row::try_get(&row, "calls")?))
    }

    /// Delete every persisted row. The only way calls are ever removed.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for table in ["api_calls", "daily_usage", "sessions", "alerts", "budget_settings"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!("Usage store reset");
        Ok(())
    }
}
