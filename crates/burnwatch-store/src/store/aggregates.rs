use super::helpers::row_to_aggregate;
use super::UsageStore;
use crate::calendar::DateRange;
use crate::error::Result;
use crate::types::{normalize_key, DailyUsageAggregate};

impl UsageStore {
    // ── Daily aggregates ────────────────────────────────────────

    /// Daily aggregates whose date falls in `range`, ordered by date then model.
    ///
    /// `key_id = None` returns rows for every key (one row per key).
    pub async fn get_daily_aggregates(
        &self,
        range: DateRange,
        key_id: Option<&str>,
    ) -> Result<Vec<DailyUsageAggregate>> {
        let rows = sqlx::query(
            "SELECT date, model, key_id, total_units, total_cost, call_count
             FROM daily_usage
             WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR key_id = ?3)
             ORDER BY date ASC, model ASC, key_id ASC",
        )
        .bind(range.start.to_string())
        .bind(range.end.to_string())
        .bind(normalize_key(key_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_aggregate).collect()
    }
}
