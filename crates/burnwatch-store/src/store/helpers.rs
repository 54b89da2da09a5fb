//! Row decoding and value conversion for the store module

use crate::error::{Error, Result};
use crate::types::{Alert, AlertKind, AlertPayload, ApiCall, DailyUsageAggregate, Session};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Stored key scope for an optional key (`''` = none)
pub(crate) fn scope(key_id: Option<&str>) -> &str {
    crate::types::normalize_key(key_id).unwrap_or("")
}

/// Inverse of [`scope`]
pub(crate) fn key_from_scope(scope: String) -> Option<String> {
    if scope.is_empty() {
        None
    } else {
        Some(scope)
    }
}

/// Fixed-width RFC 3339 (microseconds, `Z`) so text order is time order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop precision the store cannot keep.
pub(crate) fn storable(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("invalid timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse::<NaiveDate>()
        .map_err(|e| Error::Corrupt(format!("invalid date {raw:?}: {e}")))
}

/// Largest unit count a column can hold
pub(crate) fn clamp_units(units: u64) -> u64 {
    units.min(i64::MAX as u64)
}

/// SQLite integers are signed
pub(crate) fn to_db(units: u64) -> i64 {
    i64::try_from(units).unwrap_or(i64::MAX)
}

pub(crate) fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub(crate) fn row_to_call(row: &SqliteRow) -> Result<ApiCall> {
    let ts: String = row.try_get("timestamp")?;
    Ok(ApiCall {
        id: row.try_get("id")?,
        timestamp: parse_ts(&ts)?,
        model: row.try_get("model")?,
        prompt_units: from_db(row.try_get("prompt_units")?),
        completion_units: from_db(row.try_get("completion_units")?),
        total_units: from_db(row.try_get("total_units")?),
        cost: row.try_get("cost")?,
        key_id: key_from_scope(row.try_get("key_id")?),
        session_id: row.try_get("session_id")?,
    })
}

pub(crate) fn row_to_session(row: &SqliteRow) -> Result<Session> {
    let start: String = row.try_get("start_time")?;
    let end: String = row.try_get("end_time")?;
    Ok(Session {
        id: row.try_get("id")?,
        key_id: key_from_scope(row.try_get("key_id")?),
        start_time: parse_ts(&start)?,
        end_time: parse_ts(&end)?,
    })
}

pub(crate) fn row_to_aggregate(row: &SqliteRow) -> Result<DailyUsageAggregate> {
    let date: String = row.try_get("date")?;
    Ok(DailyUsageAggregate {
        date: parse_date(&date)?,
        model: row.try_get("model")?,
        key_id: key_from_scope(row.try_get("key_id")?),
        total_units: from_db(row.try_get("total_units")?),
        total_cost: row.try_get("total_cost")?,
        call_count: from_db(row.try_get("call_count")?),
    })
}

pub(crate) fn row_to_alert(row: &SqliteRow) -> Result<Alert> {
    let ts: String = row.try_get("timestamp")?;
    let kind: String = row.try_get("kind")?;
    Ok(Alert {
        id: row.try_get("id")?,
        timestamp: parse_ts(&ts)?,
        kind: kind.parse::<AlertKind>().map_err(Error::Corrupt)?,
        payload: AlertPayload {
            threshold: row.try_get("threshold")?,
            observed: row.try_get("observed")?,
            message: row.try_get("message")?,
        },
        key_id: key_from_scope(row.try_get("key_id")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).single().unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = a + chrono::Duration::seconds(1);
        assert!(fmt_ts(a) < fmt_ts(b));
        assert!(fmt_ts(b) < fmt_ts(c));
        assert_eq!(parse_ts(&fmt_ts(b)).unwrap(), b);
    }

    #[test]
    fn test_scope_mapping() {
        assert_eq!(scope(None), "");
        assert_eq!(scope(Some("")), "");
        assert_eq!(scope(Some("team-a")), "team-a");
        assert_eq!(key_from_scope(String::new()), None);
        assert_eq!(key_from_scope("team-a".into()), Some("team-a".to_string()));
    }

    #[test]
    fn test_unit_conversion_saturates() {
        assert_eq!(to_db(u64::MAX), i64::MAX);
        assert_eq!(from_db(-5), 0);
        assert_eq!(from_db(42), 42);
    }
}
