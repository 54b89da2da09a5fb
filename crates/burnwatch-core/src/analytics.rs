//! Analytics Aggregator - grouped summaries over a historical date range.
//!
//! Model and day summaries read the daily aggregate table; the hourly
//! pattern needs call timestamps and reads raw calls instead.

use burnwatch_store::calendar::local_hour;
use burnwatch_store::{DateRange, Result, UsageStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage of one model over a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Units consumed
    pub total_units: u64,
    /// Cost in USD
    pub total_cost: f64,
    /// Number of calls
    pub call_count: u64,
    /// Share of the range's total units, 0-100
    pub percentage: f64,
}

/// Usage in one hour of the day over a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourSummary {
    /// `total_units` divided by the number of days in the range
    pub avg_units: f64,
    /// Units consumed in this hour across the range
    pub total_units: u64,
    /// Number of calls
    pub call_count: u64,
}

/// Usage on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Local calendar date
    pub date: NaiveDate,
    /// Units consumed
    pub total_units: u64,
    /// Cost in USD
    pub total_cost: f64,
    /// Number of calls
    pub call_count: u64,
    /// Distinct models used that day, sorted
    pub models: Vec<String>,
}

/// Read-only grouped views of stored usage.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: UsageStore,
}

impl AnalyticsAggregator {
    /// Aggregator reading from `store`
    #[must_use]
    pub fn new(store: UsageStore) -> Self {
        Self { store }
    }

    /// Units, cost and calls per model, with each model's share of units.
    pub async fn summarize_by_model(
        &self,
        range: DateRange,
        key_id: Option<&str>,
    ) -> Result<BTreeMap<String, ModelSummary>> {
        let aggregates = self.store.get_daily_aggregates(range, key_id).await?;

        let mut by_model: BTreeMap<String, ModelSummary> = BTreeMap::new();
        for row in &aggregates {
            let entry = by_model.entry(row.model.clone()).or_default();
            entry.total_units = entry.total_units.saturating_add(row.total_units);
            entry.total_cost += row.total_cost;
            entry.call_count = entry.call_count.saturating_add(row.call_count);
        }

        let total: u64 = by_model.values().map(|s| s.total_units).sum();
        if total > 0 {
            for summary in by_model.values_mut() {
                summary.percentage = summary.total_units as f64 / total as f64 * 100.0;
            }
        }
        Ok(by_model)
    }

    /// Usage per local hour of day; hours without calls are omitted.
    pub async fn summarize_by_hour(
        &self,
        range: DateRange,
        key_id: Option<&str>,
    ) -> Result<BTreeMap<u32, HourSummary>> {
        let tz = self.store.timezone();
        let (start, end) = range.bounds(tz);
        let calls = self.store.get_calls_between(start, end, key_id).await?;

        let mut by_hour: BTreeMap<u32, HourSummary> = BTreeMap::new();
        for call in &calls {
            let entry = by_hour.entry(local_hour(call.timestamp, tz)).or_default();
            entry.total_units = entry.total_units.saturating_add(call.total_units);
            entry.call_count += 1;
        }

        let days = range.num_days() as f64;
        for summary in by_hour.values_mut() {
            summary.avg_units = summary.total_units as f64 / days;
        }
        Ok(by_hour)
    }

    /// One summary per day that has usage, oldest first.
    pub async fn summarize_by_day(
        &self,
        range: DateRange,
        key_id: Option<&str>,
    ) -> Result<Vec<DailySummary>> {
        let aggregates = self.store.get_daily_aggregates(range, key_id).await?;

        let mut days: Vec<DailySummary> = Vec::new();
        for row in aggregates {
            match days.last_mut() {
                Some(day) if day.date == row.date => {
                    day.total_units = day.total_units.saturating_add(row.total_units);
                    day.total_cost += row.total_cost;
                    day.call_count = day.call_count.saturating_add(row.call_count);
                    if !day.models.contains(&row.model) {
                        day.models.push(row.model);
                    }
                }
                _ => days.push(DailySummary {
                    date: row.date,
                    total_units: row.total_units,
                    total_cost: row.total_cost,
                    call_count: row.call_count,
                    models: vec![row.model],
                }),
            }
        }
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnwatch_store::{StoreOptions, UsageEvent};
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::Tz;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, day, hour, 15, 0).single().unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    async fn seeded(timezone: Tz) -> AnalyticsAggregator {
        let store = UsageStore::in_memory(StoreOptions {
            timezone,
            ..StoreOptions::default()
        })
        .await
        .unwrap();
        for (model, units, at) in [
            ("gpt-4", 300, ts(1, 9)),
            ("gpt-4o-mini", 100, ts(1, 9)),
            ("gpt-4", 600, ts(2, 14)),
            ("gpt-4", 1000, ts(5, 9)),
        ] {
            store
                .record_call(UsageEvent::new(model, units, 0, at))
                .await
                .unwrap();
        }
        AnalyticsAggregator::new(store)
    }

    #[tokio::test]
    async fn test_by_model_percentages() {
        let analytics = seeded(Tz::UTC).await;
        let summary = analytics
            .summarize_by_model(DateRange::new(date(1), date(2)), None)
            .await
            .unwrap();

        assert_eq!(summary.len(), 2);
        let gpt4 = summary["gpt-4"];
        assert_eq!(gpt4.total_units, 900);
        assert_eq!(gpt4.call_count, 2);
        assert!((gpt4.percentage - 90.0).abs() < 1e-9);
        assert!((summary["gpt-4o-mini"].percentage - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_by_model_empty_range() {
        let analytics = seeded(Tz::UTC).await;
        let summary = analytics
            .summarize_by_model(DateRange::day(date(20)), None)
            .await
            .unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_by_hour_averages_over_days() {
        let analytics = seeded(Tz::UTC).await;
        let summary = analytics
            .summarize_by_hour(DateRange::new(date(1), date(5)), None)
            .await
            .unwrap();

        assert_eq!(summary.keys().copied().collect::<Vec<_>>(), vec![9, 14]);
        assert_eq!(summary[&9].total_units, 1400);
        assert_eq!(summary[&9].call_count, 3);
        assert!((summary[&9].avg_units - 280.0).abs() < 1e-9);
        assert!((summary[&14].avg_units - 120.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_by_hour_uses_local_time() {
        let analytics = seeded(Tz::Asia__Tokyo).await;
        let summary = analytics
            .summarize_by_hour(DateRange::new(date(1), date(5)), None)
            .await
            .unwrap();
        // 09:15 UTC is 18:15 in Tokyo
        assert!(summary.contains_key(&18));
        assert!(!summary.contains_key(&9));
    }

    #[tokio::test]
    async fn test_by_day() {
        let analytics = seeded(Tz::UTC).await;
        let days = analytics
            .summarize_by_day(DateRange::new(date(1), date(30)), None)
            .await
            .unwrap();

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, date(1));
        assert_eq!(days[0].total_units, 400);
        assert_eq!(days[0].call_count, 2);
        assert_eq!(days[0].models, vec!["gpt-4", "gpt-4o-mini"]);
        assert_eq!(days[2].date, date(5));
    }
}
