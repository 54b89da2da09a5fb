//! End-to-end scenarios through the monitor facade.

use burnwatch_core::{
    predict_exhaustion, AlertEvaluator, EvaluationInput, MonitorConfig, UsageMonitor,
};
use burnwatch_store::{AlertKind, DateRange, StoreOptions, UsageEvent, UsageStore};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).single().unwrap()
}

async fn monitor() -> UsageMonitor {
    UsageMonitor::in_memory(MonitorConfig::default()).await.unwrap()
}

fn quota_input(current_units: u64) -> EvaluationInput {
    EvaluationInput {
        current_units,
        quota_limit: 100_000,
        current_cost: 0.0,
        budget_limit: None,
        burn_rate: 0.0,
    }
}

#[tokio::test]
async fn scenario_a_gpt4_call_is_priced() {
    let monitor = monitor().await;
    let call = monitor
        .record(UsageEvent::new("gpt-4", 1000, 500, t0()))
        .await
        .unwrap();

    assert_eq!(call.total_units, 1500);
    assert!((call.cost - 0.06).abs() < 1e-9);

    let status = monitor.status(None, t0()).await.unwrap();
    assert_eq!(status.cycle_totals.units, 1500);
    assert_eq!(status.session_totals.calls, 1);
}

#[tokio::test]
async fn scenario_b_half_quota_alerts_once() {
    let store = UsageStore::in_memory(StoreOptions::default()).await.unwrap();
    let config = MonitorConfig::default();
    let evaluator = AlertEvaluator::new(store.clone(), config.alerts.clone(), Tz::UTC);

    let before = evaluator.evaluate(&quota_input(49_000), None, t0()).await.unwrap();
    assert!(before.is_empty());

    let after = evaluator
        .evaluate(&quota_input(51_000), None, t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].kind, AlertKind::QuotaThreshold);
    assert_eq!(after[0].payload.threshold, Some(0.5));

    let repeat = evaluator
        .evaluate(&quota_input(51_000), None, t0() + Duration::minutes(2))
        .await
        .unwrap();
    assert!(repeat.is_empty());
}

#[tokio::test]
async fn scenario_c_idle_hour_means_no_burn() {
    let monitor = monitor().await;
    monitor
        .record(UsageEvent::new("gpt-4o", 5000, 5000, t0()))
        .await
        .unwrap();

    let later = t0() + Duration::minutes(61);
    let rate = monitor.estimator().estimate_burn_rate(None, later).await.unwrap();
    assert_eq!(rate, 0.0);
    assert_eq!(predict_exhaustion(10_000, 100_000, rate, later), None);

    let status = monitor.status(None, later).await.unwrap();
    assert_eq!(status.forecast.quota_exhaustion, None);
    assert!(!status.forecast.quota_exhausts_before_reset);
}

#[tokio::test]
async fn scenario_d_session_rotates_after_five_hours() {
    let monitor = monitor().await;
    let store = monitor.store();

    let first = store.get_active_session(None, t0()).await.unwrap();
    let same = store
        .get_active_session(None, t0() + Duration::minutes(4 * 60 + 59))
        .await
        .unwrap();
    assert_eq!(first.id, same.id);

    let next = store
        .get_active_session(None, t0() + Duration::minutes(5 * 60 + 1))
        .await
        .unwrap();
    assert_ne!(first.id, next.id);
    assert_eq!(next.start_time, t0() + Duration::minutes(5 * 60 + 1));
}

#[tokio::test]
async fn scenario_e_budget_alert_not_duplicated() {
    let monitor = monitor().await;
    monitor.set_budget(Some(50.0), None, t0()).await.unwrap();

    // gpt-4 prompt rate is $30 per 1M units
    let spend = |units: u64, at: DateTime<Utc>| UsageEvent::new("gpt-4", units, 0, at);
    for i in 0..2 {
        monitor
            .record(spend(766_667, t0() - Duration::days(1) + Duration::minutes(i)))
            .await
            .unwrap();
    }

    let first = monitor.tick(None, t0()).await.unwrap();
    assert!((first.status.cycle_totals.cost - 46.0).abs() < 1e-3);
    let budget: Vec<_> = first
        .new_alerts
        .iter()
        .filter(|a| a.kind == AlertKind::BudgetThreshold)
        .collect();
    assert_eq!(budget.len(), 1);
    assert_eq!(budget[0].payload.threshold, Some(0.9));

    monitor
        .record(spend(16_667, t0() + Duration::minutes(1)))
        .await
        .unwrap();
    let second = monitor.tick(None, t0() + Duration::minutes(2)).await.unwrap();
    assert!(second
        .new_alerts
        .iter()
        .all(|a| a.kind != AlertKind::BudgetThreshold));
}

#[tokio::test]
async fn jump_past_several_thresholds_surfaces_highest() {
    let store = UsageStore::in_memory(StoreOptions::default()).await.unwrap();
    let config = MonitorConfig::default();
    let evaluator = AlertEvaluator::new(store.clone(), config.alerts.clone(), Tz::UTC);

    assert!(evaluator
        .evaluate(&quota_input(40_000), None, t0())
        .await
        .unwrap()
        .is_empty());

    let jumped = evaluator
        .evaluate(&quota_input(95_000), None, t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(jumped.len(), 1);
    assert_eq!(jumped[0].payload.threshold, Some(0.9));

    let stored = store.alerts_since(t0(), None, 10).await.unwrap();
    let mut thresholds: Vec<f64> = stored.iter().filter_map(|a| a.payload.threshold).collect();
    thresholds.sort_by(f64::total_cmp);
    assert_eq!(thresholds, vec![0.5, 0.75, 0.9]);
}

#[tokio::test]
async fn high_burn_rate_respects_cooldown() {
    let store = UsageStore::in_memory(StoreOptions::default()).await.unwrap();
    let config = MonitorConfig::default();
    let evaluator = AlertEvaluator::new(store, config.alerts.clone(), Tz::UTC);

    // Far from any quota threshold and too slow to exhaust before the reset
    let mut input = quota_input(0);
    input.quota_limit = 50_000_000_000;
    input.burn_rate = 800.0;

    let first = evaluator.evaluate(&input, None, t0()).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, AlertKind::HighBurnRate);

    let inside = evaluator
        .evaluate(&input, None, t0() + Duration::minutes(4))
        .await
        .unwrap();
    assert!(inside.is_empty());

    let after = evaluator
        .evaluate(&input, None, t0() + Duration::minutes(6))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].kind, AlertKind::HighBurnRate);
}

#[tokio::test]
async fn unchanged_state_raises_nothing_twice() {
    let monitor = monitor().await;
    for i in 0..5 {
        monitor
            .record(UsageEvent::new("gpt-4o-mini", 12_000, 0, t0() + Duration::minutes(i)))
            .await
            .unwrap();
    }

    let now = t0() + Duration::minutes(10);
    let first = monitor.tick(None, now).await.unwrap();
    assert!(!first.new_alerts.is_empty());
    assert!(!first.status.recent_alerts.is_empty());

    let second = monitor.tick(None, now).await.unwrap();
    assert!(second.new_alerts.is_empty());
}

#[tokio::test]
async fn aggregates_sum_to_raw_calls_per_key() {
    let monitor = monitor().await;
    for (i, key) in ["alpha", "beta", "alpha", "beta", "alpha"].iter().enumerate() {
        let at = t0() + Duration::hours(i as i64 * 3);
        monitor
            .record(UsageEvent::new("gpt-4o", 100 * (i as u64 + 1), 10, at).with_key(*key))
            .await
            .unwrap();
    }

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
    );
    let (start, end) = range.bounds(Tz::UTC);
    for key in ["alpha", "beta"] {
        let calls = monitor
            .store()
            .get_calls_between(start, end, Some(key))
            .await
            .unwrap();
        let raw: u64 = calls.iter().map(|c| c.total_units).sum();
        let days = monitor
            .analytics()
            .summarize_by_day(range, Some(key))
            .await
            .unwrap();
        let aggregated: u64 = days.iter().map(|d| d.total_units).sum();
        assert_eq!(raw, aggregated);
    }
}

#[tokio::test]
async fn status_reads_do_not_open_sessions() {
    let monitor = monitor().await;
    let status = monitor.status(Some("idle"), t0()).await.unwrap();
    assert!(status.session.is_none());
    assert!(monitor
        .store()
        .sessions_since(Some("idle"), t0() - Duration::days(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn overall_status_counts_keyed_calls_but_keeps_sessions_per_key() {
    let monitor = monitor().await;
    monitor
        .record(UsageEvent::new("gpt-4o", 300, 100, t0()).with_key("k1"))
        .await
        .unwrap();

    let overall = monitor.status(None, t0()).await.unwrap();
    assert_eq!(overall.cycle_totals.calls, 1);
    assert!(overall.session.is_none());
    assert_eq!(overall.session_totals.calls, 0);

    let keyed = monitor.status(Some("k1"), t0()).await.unwrap();
    assert_eq!(keyed.cycle_totals.calls, 1);
    assert!(keyed.session.is_some());
    assert_eq!(keyed.session_totals.units, 400);
}

#[tokio::test]
async fn configured_budget_is_fallback_for_store_setting() {
    let config = MonitorConfig {
        budget_limit: Some(20.0),
        ..MonitorConfig::default()
    };
    let monitor = UsageMonitor::in_memory(config).await.unwrap();

    assert_eq!(monitor.effective_budget(None).await.unwrap(), Some(20.0));
    monitor.set_budget(Some(75.0), None, t0()).await.unwrap();
    assert_eq!(monitor.effective_budget(None).await.unwrap(), Some(75.0));
    monitor.set_budget(None, None, t0()).await.unwrap();
    assert_eq!(monitor.effective_budget(None).await.unwrap(), None);
}

#[tokio::test]
async fn file_backed_monitor_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.db");

    {
        let monitor = UsageMonitor::open(MonitorConfig::default(), &path).await.unwrap();
        monitor
            .record(UsageEvent::new("gpt-4", 60_000, 0, t0()))
            .await
            .unwrap();
        let report = monitor.tick(None, t0()).await.unwrap();
        assert!(report
            .new_alerts
            .iter()
            .any(|a| a.kind == AlertKind::QuotaThreshold));
    }

    let reopened = UsageMonitor::open(MonitorConfig::default(), &path).await.unwrap();
    let report = reopened.tick(None, t0() + Duration::minutes(1)).await.unwrap();
    assert!(report
        .new_alerts
        .iter()
        .all(|a| a.kind != AlertKind::QuotaThreshold));
}
