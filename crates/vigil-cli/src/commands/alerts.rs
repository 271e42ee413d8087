//! Alert command implementations

use anyhow::Result;
use vigil_core::models::{Alert, AlertQuery, Severity};
use vigil_core::AlertService;

use super::{parse_month, truncate};

/// Filters for `vigil alerts list`
#[derive(Debug, Default)]
pub struct ListOptions<'a> {
    pub month: Option<&'a str>,
    pub alert_type: Option<&'a str>,
    pub severity: Option<&'a str>,
    pub include_acknowledged: bool,
}

/// Collect every page of a month's alerts
pub fn collect_alerts(
    service: &AlertService,
    user_id: i64,
    opts: &ListOptions,
) -> Result<Vec<Alert>> {
    let mut query = AlertQuery {
        month: Some(parse_month(opts.month)?),
        alert_type: opts.alert_type.map(str::parse).transpose()?,
        severity: opts.severity.map(str::parse).transpose()?,
        acknowledged: if opts.include_acknowledged {
            None
        } else {
            Some(false)
        },
        size: AlertQuery::MAX_PAGE_SIZE,
        ..Default::default()
    };

    let mut alerts = Vec::new();
    loop {
        let page = service.list(user_id, &query)?;
        let last = page.last;
        alerts.extend(page.items);
        if last {
            break;
        }
        query.page += 1;
    }
    Ok(alerts)
}

pub fn cmd_alerts_list(
    service: &AlertService,
    user_id: i64,
    opts: &ListOptions,
    json: bool,
) -> Result<()> {
    let alerts = collect_alerts(service, user_id, opts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("✅ No alerts.");
        return Ok(());
    }

    println!(
        "{:>6}  {:<10}  {:<18}  {:>10}  {:<10}  {:<20}  {:<14}",
        "ID", "Severity", "Type", "Amount", "Date", "Merchant", "Category"
    );
    println!("{}", "─".repeat(98));
    for alert in &alerts {
        let icon = match alert.severity {
            Severity::Critical => "🔴",
            Severity::Moderate => "🟡",
        };
        let ack = if alert.acknowledged { " ✓" } else { "" };
        println!(
            "{:>6}  {} {:<7}  {:<18}  {:>10.2}  {:<10}  {:<20}  {:<14}{}",
            alert.id,
            icon,
            alert.severity.as_str(),
            alert.alert_type.as_str(),
            alert.amount,
            alert.txn_date,
            truncate(alert.merchant.as_deref().unwrap_or("-"), 20),
            truncate(alert.category.as_deref().unwrap_or("-"), 14),
            ack
        );
    }
    println!();
    println!("{} alert(s)", alerts.len());

    Ok(())
}

pub fn cmd_alerts_summary(service: &AlertService, user_id: i64) -> Result<()> {
    let summary = service.summary(user_id)?;

    println!("📊 Alert Summary");
    println!("   ─────────────────────────────");
    println!("   🔴 Critical (open): {}", summary.critical_open);
    println!("   🟡 Moderate (open): {}", summary.moderate_open);
    println!("   ✓  Acknowledged:    {}", summary.acknowledged_open);
    println!("   Total (not dismissed): {}", summary.total);
    match (summary.last_generated_at, summary.last_generated_count) {
        (Some(at), Some(count)) => {
            println!("   Last pass: {} alert(s) at {}", count, at.format("%Y-%m-%d %H:%M"))
        }
        _ => println!("   Last pass: never"),
    }

    Ok(())
}

pub fn cmd_alerts_recompute(
    service: &AlertService,
    user_id: i64,
    month: Option<&str>,
    all_users: bool,
) -> Result<()> {
    let month = parse_month(month)?;

    if all_users {
        println!("🔍 Recomputing {} for all users...", month);
        let batch = service.recompute_all_users(month)?;
        println!(
            "   Users: {} ({} succeeded, {} failed)",
            batch.users, batch.succeeded, batch.failed
        );
        println!("   Generated: {}", batch.generated);
        if batch.failed > 0 {
            anyhow::bail!("{} user(s) failed to recompute", batch.failed);
        }
        return Ok(());
    }

    println!("🔍 Recomputing {}...", month);
    let result = service.recompute(user_id, month)?;
    println!(
        "   Generated: {} (replaced {}, {} ms)",
        result.generated, result.replaced, result.duration_ms
    );

    Ok(())
}

pub fn cmd_alerts_backfill(service: &AlertService, user_id: i64, months: u32) -> Result<()> {
    println!("⏪ Backfilling {} month(s)...", months);

    let results = service.backfill(user_id, months)?;
    for result in &results {
        println!("   {}: {} alert(s)", result.month, result.generated);
    }
    let total: usize = results.iter().map(|r| r.generated).sum();
    println!("✅ Backfill complete: {} alert(s)", total);

    Ok(())
}

pub fn cmd_alerts_ack(service: &AlertService, user_id: i64, id: i64) -> Result<()> {
    let alert = service.acknowledge(user_id, id)?;
    println!("✓ Acknowledged alert {}: {}", alert.id, alert.title);
    Ok(())
}

pub fn cmd_alerts_dismiss(service: &AlertService, user_id: i64, id: i64) -> Result<()> {
    let alert = service.dismiss(user_id, id)?;
    println!("🗑  Dismissed alert {}: {}", alert.id, alert.title);
    Ok(())
}

pub fn cmd_alerts_audit(service: &AlertService, user_id: i64, id: i64) -> Result<()> {
    let trail = service.audit_trail(user_id, id)?;

    println!("Audit trail for alert {}:", id);
    for entry in &trail {
        println!(
            "   {}  {}",
            entry.at.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str()
        );
    }

    Ok(())
}
