//! Report CLI commands: `burnwatch analytics` and `burnwatch alerts`

use anyhow::Result;
use burnwatch_core::{format_compact_number, UsageMonitor};
use burnwatch_store::DateRange;
use chrono::{DateTime, Duration, Utc};

/// Model, hourly and daily breakdown of the last `days` days.
pub async fn analytics(monitor: &UsageMonitor, key: Option<&str>, days: u32) -> Result<()> {
    let range = DateRange::last_days(days, Utc::now(), monitor.store().timezone());
    let analytics = monitor.analytics();

    let by_model = analytics.summarize_by_model(range, key).await?;
    let by_hour = analytics.summarize_by_hour(range, key).await?;
    let by_day = analytics.summarize_by_day(range, key).await?;

    println!();
    println!("  Usage {} .. {} ({})", range.start, range.end, monitor.store().timezone());
    println!("  {}", "-".repeat(64));
    println!(
        "  {:<24} {:>10} {:>10} {:>8} {:>7}",
        "Model", "Tokens", "Cost", "Calls", "Share"
    );
    println!("  {}", "-".repeat(64));
    if by_model.is_empty() {
        println!("  (no usage in range)");
    }
    for (model, summary) in &by_model {
        println!(
            "  {:<24} {:>10} {:>10} {:>8} {:>6.1}%",
            model,
            format_compact_number(summary.total_units),
            format!("${:.4}", summary.total_cost),
            summary.call_count,
            summary.percentage
        );
    }

    if !by_hour.is_empty() {
        println!();
        println!("  Hourly pattern (avg tokens per day)");
        println!("  {}", "-".repeat(64));
        let peak = by_hour
            .values()
            .map(|h| h.avg_units)
            .fold(0.0_f64, f64::max);
        for (hour, summary) in &by_hour {
            let width = if peak > 0.0 {
                (summary.avg_units / peak * 40.0).round() as usize
            } else {
                0
            };
            println!(
                "  {:02}:00 {:>10.0} {}",
                hour,
                summary.avg_units,
                "#".repeat(width)
            );
        }
    }

    if !by_day.is_empty() {
        println!();
        println!("  Daily usage");
        println!("  {}", "-".repeat(64));
        for day in &by_day {
            println!(
                "  {}  {:>10}  ${:<10.4} {:>5} calls  {}",
                day.date,
                format_compact_number(day.total_units),
                day.total_cost,
                day.call_count,
                day.models.join(", ")
            );
        }
    }
    println!();
    Ok(())
}

/// Alerts raised in the last `hours` hours, newest first.
pub async fn alerts(
    monitor: &UsageMonitor,
    key: Option<&str>,
    hours: u32,
    limit: u32,
) -> Result<()> {
    let since = Utc::now()
        .checked_sub_signed(Duration::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let alerts = monitor.store().alerts_since(since, key, limit).await?;

    println!();
    println!("  Alerts (last {hours}h)");
    println!("  {}", "-".repeat(64));
    if alerts.is_empty() {
        println!("  (none)");
    }
    for alert in &alerts {
        super::monitor::print_alert_line(alert);
    }
    println!();
    Ok(())
}
