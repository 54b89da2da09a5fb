use super::helpers::{fmt_ts, key_from_scope, parse_ts, scope, storable};
use super::UsageStore;
use crate::error::{Error, Result};
use crate::types::BudgetSetting;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::info;

impl UsageStore {
    // ── Budgets ─────────────────────────────────────────────────

    /// Replace the budget for a scope. `None` clears the limit.
    pub async fn set_budget(
        &self,
        monthly_limit: Option<f64>,
        key_id: Option<&str>,
        effective_from: DateTime<Utc>,
    ) -> Result<BudgetSetting> {
        if let Some(limit) = monthly_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(Error::InvalidBudget(format!(
                    "monthly limit must be a non-negative amount, got {limit}"
                )));
            }
        }

        let scope = scope(key_id);
        let effective_from = storable(effective_from);

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO budget_settings (key_id, monthly_limit, effective_from)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key_id) DO UPDATE SET
                monthly_limit  = excluded.monthly_limit,
                effective_from = excluded.effective_from",
        )
        .bind(scope)
        .bind(monthly_limit)
        .bind(fmt_ts(effective_from))
        .execute(&self.pool)
        .await?;

        info!(scope, ?monthly_limit, "Budget updated");
        Ok(BudgetSetting {
            monthly_limit,
            key_id: key_from_scope(scope.to_string()),
            effective_from,
        })
    }

    /// Budget for exactly this scope, if one was ever set.
    pub async fn get_budget(&self, key_id: Option<&str>) -> Result<Option<BudgetSetting>> {
        let row = sqlx::query(
            "SELECT key_id, monthly_limit, effective_from
             FROM budget_settings WHERE key_id = ?1",
        )
        .bind(scope(key_id))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let effective_from: String = row.try_get("effective_from")?;
                Ok(Some(BudgetSetting {
                    monthly_limit: row.try_get("monthly_limit")?,
                    key_id: key_from_scope(row.try_get("key_id")?),
                    effective_from: parse_ts(&effective_from)?,
                }))
            }
            None => Ok(None),
        }
    }
}
