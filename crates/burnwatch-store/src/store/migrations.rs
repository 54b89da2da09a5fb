use super::UsageStore;
use crate::error::Result;

impl UsageStore {
    // ── Migrations ──────────────────────────────────────────────

    pub(crate) async fn run_migrations(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // key_id is '' for unattributed rows so that uniqueness and
        // upserts treat "no key" as one scope.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                key_id     TEXT NOT NULL DEFAULT '',
                start_time TEXT NOT NULL,
                end_time   TEXT NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_scope
             ON sessions(key_id, start_time)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS api_calls (
                id               TEXT PRIMARY KEY,
                session_id       TEXT NOT NULL REFERENCES sessions(id),
                timestamp        TEXT NOT NULL,
                model            TEXT NOT NULL,
                prompt_units     INTEGER NOT NULL,
                completion_units INTEGER NOT NULL,
                total_units      INTEGER NOT NULL,
                cost             REAL NOT NULL,
                key_id           TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_timestamp ON api_calls(timestamp)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_calls_key_timestamp
             ON api_calls(key_id, timestamp)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_session ON api_calls(session_id)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS daily_usage (
                date        TEXT NOT NULL,
                model       TEXT NOT NULL,
                key_id      TEXT NOT NULL DEFAULT '',
                total_units INTEGER NOT NULL DEFAULT 0,
                total_cost  REAL NOT NULL DEFAULT 0.0,
                call_count  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (date, model, key_id)
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS budget_settings (
                key_id         TEXT PRIMARY KEY,
                monthly_limit  REAL,
                effective_from TEXT NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id        TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                kind      TEXT NOT NULL,
                threshold REAL,
                observed  REAL NOT NULL,
                message   TEXT NOT NULL,
                key_id    TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alerts_dedup
             ON alerts(kind, key_id, timestamp)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
