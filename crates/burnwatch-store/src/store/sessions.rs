use super::helpers::{fmt_ts, row_to_session, scope, storable};
use super::UsageStore;
use crate::error::Result;
use crate::session::SessionState;
use crate::types::{Session, UsageTotals};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

impl UsageStore {
    // ── Sessions ────────────────────────────────────────────────

    /// Active session for a scope at `now`, opening (and persisting) a
    /// fresh one when none is active.
    pub async fn get_active_session(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let session = self
            .sessions
            .ensure_active(&mut tx, scope(key_id), storable(now))
            .await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Active session for a scope at `now` without opening one.
    pub async fn current_session(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        Ok(self.session_state(key_id, now).await?.active())
    }

    /// Lifecycle state of a scope's latest session at `now`.
    pub async fn session_state(
        &self,
        key_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionState> {
        let mut conn = self.pool.acquire().await?;
        let latest = Self::latest_session(&mut conn, scope(key_id)).await?;
        Ok(self.sessions.state(latest, now))
    }

    /// Sessions of a scope that started at or after `since`, oldest first.
    pub async fn sessions_since(
        &self,
        key_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT id, key_id, start_time, end_time
             FROM sessions
             WHERE key_id = ?1 AND start_time >= ?2
             ORDER BY start_time ASC, rowid ASC",
        )
        .bind(scope(key_id))
        .bind(fmt_ts(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    /// Units, cost and call count attributed to a session.
    pub async fn session_totals(&self, session_id: &str) -> Result<UsageTotals> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(total_units), 0) AS units,
                    COALESCE(SUM(cost), 0.0)      AS cost,
                    COUNT(*)                      AS calls
             FROM api_calls WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_totals(&row)
    }

    pub(crate) async fn latest_session(
        conn: &mut SqliteConnection,
        scope: &str,
    ) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, key_id, start_time, end_time
             FROM sessions WHERE key_id = ?1
             ORDER BY start_time DESC, rowid DESC
             LIMIT 1",
        )
        .bind(scope)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    pub(crate) async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, key_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session.id)
        .bind(scope(session.key_id.as_deref()))
        .bind(fmt_ts(session.start_time))
        .bind(fmt_ts(session.end_time))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub(crate) fn row_to_totals(row: &sqlx::sqlite::SqliteRow) -> Result<UsageTotals> {
        Ok(UsageTotals {
            units: super::helpers::from_db(row.try_get("units")?),
            cost: row.try_get("cost")?,
            calls: super::helpers::from_db(row.try_get("calls")?),
        })
    }
}
