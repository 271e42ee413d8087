//! Settings, suppression and recommendation commands

use anyhow::{Context, Result};
use chrono::NaiveDate;
use vigil_core::models::AlertThresholds;
use vigil_core::AlertService;

use super::parse_month;
use crate::cli::ThresholdArgs;

fn print_thresholds(t: &AlertThresholds) {
    fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
        v.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string())
    }

    println!("⚙️  Alert Settings");
    println!(
        "   Large transaction:  > {}x category average (min {:.2})",
        t.large_multiplier, t.large_min_amount
    );
    println!(
        "   Frequency:          > {} txns per merchant in {}h (min {:.2})",
        t.freq_max_txn, t.freq_window_hours, t.freq_min_amount
    );
    println!(
        "   Category spike:     > {}x {}-month average (min {:.2})",
        t.cat_spike_multiplier, t.cat_spike_lookback_months, t.cat_spike_min_amount
    );
    println!("   New merchant:       min {:.2}", t.new_merchant_min_amount);
    println!("   Critical overrides:");
    println!("      large absolute:          {}", opt(&t.critical_large_absolute));
    println!("      spike multiplier:        {}", opt(&t.critical_category_spike_multiplier));
    println!("      frequency count:         {}", opt(&t.critical_frequency_count));
    println!("      new merchant absolute:   {}", opt(&t.critical_new_merchant_absolute));
}

pub fn cmd_settings_show(service: &AlertService, user_id: i64) -> Result<()> {
    let settings = service.settings(user_id)?;
    print_thresholds(&settings.thresholds);
    Ok(())
}

/// Write new thresholds and show the stored result
pub fn cmd_settings_set(
    service: &AlertService,
    user_id: i64,
    thresholds: &AlertThresholds,
) -> Result<()> {
    let settings = service.update_settings(user_id, thresholds)?;
    println!("✅ Settings updated");
    print_thresholds(&settings.thresholds);
    Ok(())
}

/// Overlay the given flags on the current thresholds
pub fn merge_thresholds(current: AlertThresholds, args: &ThresholdArgs) -> AlertThresholds {
    AlertThresholds {
        large_multiplier: args.large_multiplier.unwrap_or(current.large_multiplier),
        large_min_amount: args.large_min_amount.unwrap_or(current.large_min_amount),
        freq_window_hours: args.freq_window_hours.unwrap_or(current.freq_window_hours),
        freq_max_txn: args.freq_max_txn.unwrap_or(current.freq_max_txn),
        freq_min_amount: args.freq_min_amount.unwrap_or(current.freq_min_amount),
        cat_spike_multiplier: args
            .cat_spike_multiplier
            .unwrap_or(current.cat_spike_multiplier),
        cat_spike_lookback_months: args
            .cat_spike_lookback_months
            .unwrap_or(current.cat_spike_lookback_months),
        cat_spike_min_amount: args
            .cat_spike_min_amount
            .unwrap_or(current.cat_spike_min_amount),
        new_merchant_min_amount: args
            .new_merchant_min_amount
            .unwrap_or(current.new_merchant_min_amount),
        critical_large_absolute: args
            .critical_large_absolute
            .or(current.critical_large_absolute),
        critical_category_spike_multiplier: args
            .critical_category_spike_multiplier
            .or(current.critical_category_spike_multiplier),
        critical_frequency_count: args
            .critical_frequency_count
            .or(current.critical_frequency_count),
        critical_new_merchant_absolute: args
            .critical_new_merchant_absolute
            .or(current.critical_new_merchant_absolute),
    }
}

pub fn cmd_settings_update(
    service: &AlertService,
    user_id: i64,
    args: &ThresholdArgs,
) -> Result<()> {
    let current = service.settings(user_id)?.thresholds;
    cmd_settings_set(service, user_id, &merge_thresholds(current, args))
}

// ========== Whitelist ==========

pub fn cmd_whitelist_list(service: &AlertService, user_id: i64) -> Result<()> {
    let entries = service.list_whitelist(user_id)?;
    if entries.is_empty() {
        println!("No whitelisted merchants.");
        return Ok(());
    }
    println!("Whitelisted merchants:");
    for entry in &entries {
        println!("   {}", entry.merchant);
    }
    Ok(())
}

pub fn cmd_whitelist_add(service: &AlertService, user_id: i64, merchant: &str) -> Result<()> {
    let entry = service.add_whitelist(user_id, merchant)?;
    println!("✅ Whitelisted {}", entry.merchant);
    Ok(())
}

pub fn cmd_whitelist_remove(service: &AlertService, user_id: i64, merchant: &str) -> Result<()> {
    if !service.remove_whitelist(user_id, merchant)? {
        anyhow::bail!("Merchant is not whitelisted: {}", merchant);
    }
    println!("✅ Removed {} from whitelist", merchant.trim());
    Ok(())
}

// ========== Muted categories ==========

pub fn cmd_muted_list(service: &AlertService, user_id: i64) -> Result<()> {
    let muted = service.list_muted(user_id)?;
    if muted.is_empty() {
        println!("No muted categories.");
        return Ok(());
    }
    let today = chrono::Local::now().date_naive();
    println!("Muted categories:");
    for m in &muted {
        let until = m
            .mute_until
            .map_or_else(|| "indefinitely".to_string(), |d| format!("until {}", d));
        let status = if m.is_active(today) { "" } else { " (expired)" };
        println!("   {} {}{}", m.category, until, status);
    }
    Ok(())
}

pub fn cmd_muted_add(
    service: &AlertService,
    user_id: i64,
    category: &str,
    until: Option<&str>,
) -> Result<()> {
    let until = until
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("Invalid --until date format (use YYYY-MM-DD)")?;

    let muted = service.mute_category(user_id, category, until)?;
    match muted.mute_until {
        Some(d) => println!("🔇 Muted {} until {}", muted.category, d),
        None => println!("🔇 Muted {}", muted.category),
    }
    Ok(())
}

pub fn cmd_muted_remove(service: &AlertService, user_id: i64, category: &str) -> Result<()> {
    if !service.unmute_category(user_id, category)? {
        anyhow::bail!("Category is not muted: {}", category);
    }
    println!("🔔 Unmuted {}", category.trim());
    Ok(())
}

// ========== Recommendations ==========

pub fn cmd_recommend(
    service: &AlertService,
    user_id: i64,
    month: Option<&str>,
    generate: bool,
) -> Result<()> {
    let month = parse_month(month)?;
    let recs = if generate {
        service.generate_recommendations(user_id, month)?
    } else {
        service.recommendations(user_id, month)?
    };

    if recs.is_empty() {
        println!("No recommendations for {}.", month);
        if !generate {
            println!("   💡 Tip: run with --generate to create them");
        }
        return Ok(());
    }

    println!("🎯 Recommendations for {}", month);
    for rec in &recs {
        println!("   {}", rec.title);
        println!("      {}", rec.message);
    }
    Ok(())
}

pub fn cmd_normalize_merchants(
    service: &AlertService,
    batch_size: usize,
    max_batches: usize,
) -> Result<()> {
    println!("🧹 Normalizing merchant names...");
    let updated = service.normalize_merchants(batch_size, max_batches)?;
    println!("✅ Updated {} transaction(s)", updated);
    Ok(())
}
