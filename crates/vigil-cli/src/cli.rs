//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Vigil - Catch unusual spending before it hurts
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Self-hosted spending anomaly detector", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "vigil.db", global = true)]
    pub db: PathBuf,

    /// User the command acts for (matches the server's local-dev identity by default)
    #[arg(short, long, default_value = "local-dev", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set VIGIL_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions from CSV (date, description, amount[, category, merchant])
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Skip recomputing the current month after import
        #[arg(long)]
        no_recompute: bool,
    },

    /// List, recompute and triage alerts
    Alerts {
        #[command(subcommand)]
        action: Option<AlertsAction>,
    },

    /// Show or change alert thresholds
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Manage whitelisted merchants
    Whitelist {
        #[command(subcommand)]
        action: Option<WhitelistAction>,
    },

    /// Manage muted categories
    Muted {
        #[command(subcommand)]
        action: Option<MutedAction>,
    },

    /// Show or generate category cap recommendations
    Recommend {
        /// Month (YYYY-MM, defaults to current)
        #[arg(short, long)]
        month: Option<String>,

        /// Regenerate before showing
        #[arg(long)]
        generate: bool,
    },

    /// Re-derive merchant names for stored transactions
    NormalizeMerchants {
        /// Transactions per batch
        #[arg(long, default_value = "500")]
        batch_size: usize,

        /// Maximum batches to process
        #[arg(long, default_value = "100")]
        max_batches: usize,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires Cloudflare Access authentication headers
        /// or an API key from VIGIL_API_KEYS.
        #[arg(long)]
        no_auth: bool,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum AlertsAction {
    /// List alerts for a month
    List {
        /// Month (YYYY-MM, defaults to current)
        #[arg(short, long)]
        month: Option<String>,

        /// Alert type: large_transaction, new_merchant, frequency, category_spike
        #[arg(short = 't', long = "type")]
        alert_type: Option<String>,

        /// Severity: critical, moderate
        #[arg(short, long)]
        severity: Option<String>,

        /// Include acknowledged alerts
        #[arg(long)]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show open alert counts
    Summary,

    /// Recompute alerts for a month
    Recompute {
        /// Month (YYYY-MM, defaults to current)
        #[arg(short, long)]
        month: Option<String>,

        /// Recompute every user instead of --user
        #[arg(long)]
        all_users: bool,
    },

    /// Recompute the last N months (oldest first)
    Backfill {
        /// Number of months, including the current one (1-24)
        #[arg(short = 'n', long, default_value = "6")]
        months: u32,
    },

    /// Acknowledge an alert
    Ack {
        /// Alert ID
        id: i64,
    },

    /// Dismiss an alert
    Dismiss {
        /// Alert ID
        id: i64,
    },

    /// Show an alert's audit trail
    Audit {
        /// Alert ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show current thresholds (default)
    Show,

    /// Change thresholds; omitted flags keep their current values
    Set {
        #[command(flatten)]
        overrides: ThresholdArgs,
    },

    /// Restore default thresholds
    Reset,
}

#[derive(Subcommand)]
pub enum WhitelistAction {
    /// List whitelisted merchants (default)
    List,

    /// Whitelist a merchant
    Add {
        /// Merchant name
        merchant: String,
    },

    /// Remove a merchant from the whitelist
    Remove {
        /// Merchant name
        merchant: String,
    },
}

#[derive(Subcommand)]
pub enum MutedAction {
    /// List muted categories (default)
    List,

    /// Mute a category
    Add {
        /// Category name
        category: String,

        /// Last muted day (YYYY-MM-DD); omit to mute indefinitely
        #[arg(long)]
        until: Option<String>,
    },

    /// Unmute a category
    Remove {
        /// Category name
        category: String,
    },
}

/// Threshold flags for `vigil settings set`
#[derive(Args, Debug, Default)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub large_multiplier: Option<f64>,
    #[arg(long)]
    pub large_min_amount: Option<f64>,
    #[arg(long)]
    pub freq_window_hours: Option<i64>,
    #[arg(long)]
    pub freq_max_txn: Option<i64>,
    #[arg(long)]
    pub freq_min_amount: Option<f64>,
    #[arg(long)]
    pub cat_spike_multiplier: Option<f64>,
    #[arg(long)]
    pub cat_spike_lookback_months: Option<u32>,
    #[arg(long)]
    pub cat_spike_min_amount: Option<f64>,
    #[arg(long)]
    pub new_merchant_min_amount: Option<f64>,
    /// Large transactions at or above this amount are critical
    #[arg(long)]
    pub critical_large_absolute: Option<f64>,
    /// Category spikes at or above this ratio are critical
    #[arg(long)]
    pub critical_category_spike_multiplier: Option<f64>,
    /// Frequency bursts of at least this many transactions are critical
    #[arg(long)]
    pub critical_frequency_count: Option<i64>,
    /// First purchases at or above this amount are critical
    #[arg(long)]
    pub critical_new_merchant_absolute: Option<f64>,
}
