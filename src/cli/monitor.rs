//! CLI command: `burnwatch monitor`
//!
//! Refreshes the status of one scope on the configured interval, raising
//! alerts as thresholds are crossed. Store failures are logged and retried
//! on the next tick.

use anyhow::Result;
use burnwatch_core::{format_compact_number, format_duration, MonitorStatus, UsageMonitor};
use burnwatch_store::Alert;
use chrono::Utc;
use tracing::{error, warn};

/// Run the monitor loop (or a single refresh with `once`).
pub async fn run(monitor: &UsageMonitor, key: Option<&str>, once: bool) -> Result<()> {
    if once {
        let report = monitor.tick(key, Utc::now()).await?;
        print_status(&report.status);
        print_new_alerts(&report.new_alerts);
        return Ok(());
    }

    let secs = monitor.config().refresh_interval_secs;
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match monitor.tick(key, Utc::now()).await {
                    Ok(report) => {
                        // Clear screen
                        print!("\x1b[2J\x1b[H");
                        print_status(&report.status);
                        print_new_alerts(&report.new_alerts);
                        println!("  (refreshing every {secs}s, Ctrl+C to exit)");
                    }
                    Err(err) if err.is_recoverable() => {
                        warn!(%err, "Monitor refresh failed, retrying next tick");
                    }
                    Err(err) => {
                        error!(%err, "Monitor refresh failed");
                        return Err(err.into());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("  Monitoring stopped.");
                return Ok(());
            }
        }
    }
}

/// Pretty-printed status block.
pub fn print_status(status: &MonitorStatus) {
    let scope = status.key_id.as_deref().unwrap_or("all keys");
    let now = status.timestamp;

    println!();
    println!("  Burnwatch  [{scope}]  {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  {}", "-".repeat(64));

    println!(
        "  Quota     {} {:>6.1}%  {} / {}",
        progress_bar(status.quota_fraction, 30),
        status.quota_fraction * 100.0,
        format_compact_number(status.cycle_totals.units),
        format_compact_number(status.quota_limit),
    );

    match (status.budget_limit, status.budget_fraction) {
        (Some(limit), Some(fraction)) => println!(
            "  Budget    {} {:>6.1}%  ${:.2} / ${:.2}",
            progress_bar(fraction, 30),
            fraction * 100.0,
            status.cycle_totals.cost,
            limit
        ),
        _ => println!("  Budget    (none)  spent ${:.4} this cycle", status.cycle_totals.cost),
    }

    println!("  {}", "-".repeat(64));
    match &status.session {
        Some(session) => println!(
            "  Session   {} calls, {} tokens, ${:.4}  (ends in {})",
            status.session_totals.calls,
            format_compact_number(status.session_totals.units),
            status.session_totals.cost,
            format_duration(&session.remaining_at(now)),
        ),
        None => println!("  Session   (no active session)"),
    }
    println!(
        "  Burn rate {:.1} tokens/min  (${:.4}/min, {} calls in the last hour)",
        status.burn.units_per_minute, status.burn.cost_per_minute, status.burn.calls_in_window
    );

    let forecast = &status.forecast;
    let quota_eta = forecast
        .quota_exhaustion
        .map(|at| format_duration(&(at - now)))
        .unwrap_or_else(|| "never at this rate".to_string());
    let flag = if forecast.quota_exhausts_before_reset {
        " !! before reset"
    } else {
        ""
    };
    println!("  Quota out {quota_eta}{flag}");
    if let Some(at) = forecast.budget_exhaustion {
        let flag = if forecast.budget_exhausts_before_reset {
            " !! before reset"
        } else {
            ""
        };
        println!("  Budget out {}{flag}", format_duration(&(at - now)));
    }
    println!(
        "  Reset in  {}  ({})",
        format_duration(&(forecast.reset_at - now)),
        forecast.reset_at.format("%Y-%m-%d %H:%M UTC")
    );

    if !status.recent_alerts.is_empty() {
        println!("  {}", "-".repeat(64));
        println!("  Recent alerts");
        for alert in &status.recent_alerts {
            print_alert_line(alert);
        }
    }
    println!();
}

fn print_new_alerts(alerts: &[Alert]) {
    for alert in alerts {
        println!("  !! {}", alert.payload.message);
    }
}

/// One alert as a table row.
pub fn print_alert_line(alert: &Alert) {
    println!(
        "  {}  {:<21} {}",
        alert.timestamp.format("%m-%d %H:%M"),
        alert.kind,
        alert.payload.message
    );
}

fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}
