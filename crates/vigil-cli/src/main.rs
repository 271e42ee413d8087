//! Vigil CLI - Spending anomaly detector
//!
//! Usage:
//!   vigil init                     Initialize database
//!   vigil import --file CSV        Import transactions and recompute
//!   vigil alerts                   List this month's open alerts
//!   vigil alerts backfill -n 6     Recompute the last six months
//!   vigil serve --port 3000        Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vigil_core::models::AlertThresholds;
use vigil_core::AlertService;

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { file, no_recompute } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            commands::cmd_import(&service, user_id, &file, no_recompute).map(|_| ())
        }
        Commands::Alerts { action } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            match action {
                None => commands::cmd_alerts_list(
                    &service,
                    user_id,
                    &commands::ListOptions::default(),
                    false,
                ),
                Some(AlertsAction::List {
                    month,
                    alert_type,
                    severity,
                    all,
                    json,
                }) => {
                    let opts = commands::ListOptions {
                        month: month.as_deref(),
                        alert_type: alert_type.as_deref(),
                        severity: severity.as_deref(),
                        include_acknowledged: all,
                    };
                    commands::cmd_alerts_list(&service, user_id, &opts, json)
                }
                Some(AlertsAction::Summary) => commands::cmd_alerts_summary(&service, user_id),
                Some(AlertsAction::Recompute { month, all_users }) => {
                    commands::cmd_alerts_recompute(&service, user_id, month.as_deref(), all_users)
                }
                Some(AlertsAction::Backfill { months }) => {
                    commands::cmd_alerts_backfill(&service, user_id, months)
                }
                Some(AlertsAction::Ack { id }) => commands::cmd_alerts_ack(&service, user_id, id),
                Some(AlertsAction::Dismiss { id }) => {
                    commands::cmd_alerts_dismiss(&service, user_id, id)
                }
                Some(AlertsAction::Audit { id }) => {
                    commands::cmd_alerts_audit(&service, user_id, id)
                }
            }
        }
        Commands::Settings { action } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            match action {
                None | Some(SettingsAction::Show) => commands::cmd_settings_show(&service, user_id),
                Some(SettingsAction::Set { overrides }) => {
                    commands::cmd_settings_update(&service, user_id, &overrides)
                }
                Some(SettingsAction::Reset) => {
                    commands::cmd_settings_set(&service, user_id, &AlertThresholds::default())
                }
            }
        }
        Commands::Whitelist { action } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            match action {
                None | Some(WhitelistAction::List) => {
                    commands::cmd_whitelist_list(&service, user_id)
                }
                Some(WhitelistAction::Add { merchant }) => {
                    commands::cmd_whitelist_add(&service, user_id, &merchant)
                }
                Some(WhitelistAction::Remove { merchant }) => {
                    commands::cmd_whitelist_remove(&service, user_id, &merchant)
                }
            }
        }
        Commands::Muted { action } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            match action {
                None | Some(MutedAction::List) => commands::cmd_muted_list(&service, user_id),
                Some(MutedAction::Add { category, until }) => {
                    commands::cmd_muted_add(&service, user_id, &category, until.as_deref())
                }
                Some(MutedAction::Remove { category }) => {
                    commands::cmd_muted_remove(&service, user_id, &category)
                }
            }
        }
        Commands::Recommend { month, generate } => {
            let (service, user_id) = commands::open_for_user(&cli.db, &cli.user, cli.no_encrypt)?;
            commands::cmd_recommend(&service, user_id, month.as_deref(), generate)
        }
        Commands::NormalizeMerchants {
            batch_size,
            max_batches,
        } => {
            let service = AlertService::new(commands::open_db(&cli.db, cli.no_encrypt)?);
            commands::cmd_normalize_merchants(&service, batch_size, max_batches)
        }
        Commands::Serve {
            port,
            host,
            no_auth,
            cors_origins,
        } => {
            commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt, cors_origins)
                .await
        }
    }
}
