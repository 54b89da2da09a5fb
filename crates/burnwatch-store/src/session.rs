//! Session Tracker - fixed-duration usage windows per key scope
//!
//! ```text
//! NoSession ──call──► Active ──time passes──► Expired ──call──► Active ...
//! ```
//!
//! Expiry is never written down: a session is active while `now < end_time`.

use crate::error::Result;
use crate::store::UsageStore;
use crate::types::Session;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

/// Default session length
pub const DEFAULT_SESSION_DURATION_HOURS: i64 = 5;

/// Where a scope is in the session lifecycle at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "session", rename_all = "snake_case")]
pub enum SessionState {
    /// No session was ever opened for the scope
    NoSession,
    /// The latest session is still open
    Active(Session),
    /// The latest session has run out
    Expired(Session),
}

impl SessionState {
    /// The active session, if any
    #[must_use]
    pub fn active(self) -> Option<Session> {
        match self {
            Self::Active(session) => Some(session),
            _ => None,
        }
    }
}

/// Opens sessions of a fixed duration and classifies the latest one.
#[derive(Debug, Clone, Copy)]
pub struct SessionTracker {
    duration: Duration,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_SESSION_DURATION_HOURS))
    }
}

impl SessionTracker {
    /// Tracker with the given window length
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Window length
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Classify the latest session of a scope at `now`.
    #[must_use]
    pub fn state(&self, latest: Option<Session>, now: DateTime<Utc>) -> SessionState {
        match latest {
            None => SessionState::NoSession,
            Some(session) if session.is_active_at(now) => SessionState::Active(session),
            Some(session) => SessionState::Expired(session),
        }
    }

    /// Return the scope's active session at `now`, opening one if needed.
    ///
    /// Callers must hold the store's write lock and run inside a
    /// transaction so two sessions can never be opened for one scope.
    pub(crate) async fn ensure_active(
        &self,
        conn: &mut SqliteConnection,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let latest = UsageStore::latest_session(conn, scope).await?;
        match self.state(latest, now) {
            SessionState::Active(session) => Ok(session),
            SessionState::NoSession | SessionState::Expired(_) => {
                let session = Session {
                    id: uuid::Uuid::new_v4().to_string(),
                    key_id: crate::types::normalize_key(Some(scope)).map(str::to_string),
                    start_time: now,
                    end_time: now + self.duration,
                };
                UsageStore::insert_session(conn, &session).await?;
                debug!(session_id = %session.id, scope, "Opened usage session");
                Ok(session)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session_at(start: DateTime<Utc>) -> Session {
        Session {
            id: "s1".into(),
            key_id: None,
            start_time: start,
            end_time: start + Duration::hours(5),
        }
    }

    #[test]
    fn test_state_transitions() {
        let tracker = SessionTracker::default();
        let t = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).single().unwrap();

        assert_eq!(tracker.state(None, t), SessionState::NoSession);

        let s = session_at(t);
        assert_eq!(
            tracker.state(Some(s.clone()), t + Duration::minutes(299)),
            SessionState::Active(s.clone())
        );
        assert_eq!(
            tracker.state(Some(s.clone()), t + Duration::minutes(301)),
            SessionState::Expired(s)
        );
    }

    #[test]
    fn test_active_helper() {
        let tracker = SessionTracker::new(Duration::minutes(30));
        let t = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).single().unwrap();
        assert_eq!(tracker.duration(), Duration::minutes(30));
        assert!(tracker.state(None, t).active().is_none());
        assert!(tracker
            .state(Some(session_at(t)), t)
            .active()
            .is_some());
    }
}
