//! Data CLI commands
//!
//! `burnwatch record`  : record one completed call
//! `burnwatch budget`  : show, set or clear the monthly budget
//! `burnwatch demo`    : seed simulated calls
//! `burnwatch reset`   : delete all recorded data

use anyhow::{bail, Result};
use burnwatch_core::UsageMonitor;
use burnwatch_store::UsageEvent;
use chrono::{DateTime, Duration, Utc};

/// Record a call completed now.
pub async fn record(
    monitor: &UsageMonitor,
    key: Option<&str>,
    model: String,
    prompt: u64,
    completion: u64,
) -> Result<()> {
    let mut event = UsageEvent::new(model, prompt, completion, Utc::now());
    if let Some(key) = key {
        event = event.with_key(key);
    }
    let call = monitor.record(event).await?;
    println!(
        "  Recorded {} tokens on {} (${:.6}), session {}",
        call.total_units, call.model, call.cost, call.session_id
    );
    Ok(())
}

/// Show the budget, or replace it.
pub async fn budget(
    monitor: &UsageMonitor,
    key: Option<&str>,
    limit: Option<f64>,
    clear: bool,
) -> Result<()> {
    if clear {
        monitor.set_budget(None, key, Utc::now()).await?;
        println!("  Monthly budget cleared");
        return Ok(());
    }

    match limit {
        Some(limit) => {
            let setting = monitor.set_budget(Some(limit), key, Utc::now()).await?;
            println!(
                "  Monthly budget set to ${:.2} (effective {})",
                limit,
                setting.effective_from.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => match monitor.effective_budget(key).await? {
            Some(limit) => println!("  Monthly budget: ${limit:.2}"),
            None => println!("  No monthly budget set"),
        },
    }
    Ok(())
}

/// Seed simulated calls over the last hour and print the status.
pub async fn demo(monitor: &UsageMonitor, key: Option<&str>) -> Result<()> {
    let now = Utc::now();
    println!("  Running in demo mode with simulated data...");
    for mut event in demo_events(now) {
        if let Some(key) = key {
            event = event.with_key(key);
        }
        monitor.record(event).await?;
    }

    let report = monitor.tick(key, now).await?;
    super::monitor::print_status(&report.status);
    Ok(())
}

/// Ten calls spread over the hour before `now`, cycling through three models.
pub fn demo_events(now: DateTime<Utc>) -> Vec<UsageEvent> {
    const MODELS: [&str; 3] = ["gpt-4", "gpt-3.5-turbo", "gpt-4-turbo"];
    (0..10u32)
        .map(|i| {
            UsageEvent::new(
                MODELS[i as usize % MODELS.len()],
                100 + u64::from(i) * 50,
                50 + u64::from(i) * 25,
                now - Duration::minutes(60 - i64::from(i) * 6),
            )
        })
        .collect()
}

/// Delete every recorded row.
pub async fn reset(monitor: &UsageMonitor, force: bool) -> Result<()> {
    if !force && !confirm("Delete all recorded usage, budgets and alerts?") {
        bail!("Reset cancelled");
    }
    monitor.store().reset().await?;
    println!("  All usage data deleted");
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};
    print!("  {prompt} [y/N] ");
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_ok() {
        matches!(input.trim(), "y" | "Y" | "yes" | "YES")
    } else {
        false
    }
}
