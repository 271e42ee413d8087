//! Background scheduler for periodic recompute passes
//!
//! The server is the clock for batch work. Two intervals are read from the
//! environment:
//!
//! - `VIGIL_RECOMPUTE_INTERVAL_MINUTES`: recompute the current month for every
//!   user (default 60, 0 disables)
//! - `VIGIL_RECOMMENDATION_INTERVAL_HOURS`: regenerate recommendations for
//!   every user (default 24, 0 disables)

use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use vigil_core::models::YearMonth;
use vigil_core::AlertService;

pub const RECOMPUTE_INTERVAL_ENV: &str = "VIGIL_RECOMPUTE_INTERVAL_MINUTES";
pub const RECOMMENDATION_INTERVAL_ENV: &str = "VIGIL_RECOMMENDATION_INTERVAL_HOURS";

const DEFAULT_RECOMPUTE_MINUTES: u64 = 60;
const DEFAULT_RECOMMENDATION_HOURS: u64 = 24;
/// Longest accepted interval (one year)
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Intervals for the scheduled passes; 0 disables a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeScheduleConfig {
    pub recompute_interval_minutes: u64,
    pub recommendation_interval_hours: u64,
}

impl Default for RecomputeScheduleConfig {
    fn default() -> Self {
        Self {
            recompute_interval_minutes: DEFAULT_RECOMPUTE_MINUTES,
            recommendation_interval_hours: DEFAULT_RECOMMENDATION_HOURS,
        }
    }
}

impl RecomputeScheduleConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            recompute_interval_minutes: read_interval(
                RECOMPUTE_INTERVAL_ENV,
                DEFAULT_RECOMPUTE_MINUTES,
            ),
            recommendation_interval_hours: read_interval(
                RECOMMENDATION_INTERVAL_ENV,
                DEFAULT_RECOMMENDATION_HOURS,
            ),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.recompute_interval_minutes > 0 || self.recommendation_interval_hours > 0
    }

    pub fn recompute_period(&self) -> Duration {
        period_from_secs(self.recompute_interval_minutes.saturating_mul(60))
    }

    pub fn recommendation_period(&self) -> Duration {
        period_from_secs(self.recommendation_interval_hours.saturating_mul(3600))
    }
}

fn period_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_PERIOD)
}

fn read_interval(var: &str, default: u64) -> u64 {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var, value = %raw, default, "Invalid interval, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Start the scheduled passes as background tasks
///
/// Each pass waits one full interval before its first run. Passes run on the
/// blocking pool since they do synchronous SQLite work for every user.
pub fn start_recompute_scheduler(service: AlertService, config: RecomputeScheduleConfig) {
    if config.recompute_interval_minutes > 0 {
        info!(
            "Starting recompute scheduler: every {} minutes",
            config.recompute_interval_minutes
        );
        let service = service.clone();
        let period = config.recompute_period();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // Skip the immediate first tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let month = YearMonth::current();
                let svc = service.clone();
                match tokio::task::spawn_blocking(move || svc.recompute_all_users(month)).await {
                    Ok(Ok(batch)) => info!(
                        month = %month,
                        users = batch.users,
                        failed = batch.failed,
                        generated = batch.generated,
                        "Scheduled recompute completed"
                    ),
                    Ok(Err(e)) => error!(error = %e, "Scheduled recompute failed"),
                    Err(e) => error!(error = %e, "Scheduled recompute task failed"),
                }
            }
        });
    } else {
        warn!("{} is 0, scheduled recompute disabled", RECOMPUTE_INTERVAL_ENV);
    }

    if config.recommendation_interval_hours > 0 {
        info!(
            "Starting recommendation scheduler: every {} hours",
            config.recommendation_interval_hours
        );
        let period = config.recommendation_period();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let month = YearMonth::current();
                let svc = service.clone();
                let pass = move || svc.generate_all_recommendations(month);
                match tokio::task::spawn_blocking(pass).await {
                    Ok(Ok(batch)) => info!(
                        month = %month,
                        users = batch.users,
                        failed = batch.failed,
                        generated = batch.generated,
                        "Scheduled recommendations completed"
                    ),
                    Ok(Err(e)) => error!(error = %e, "Scheduled recommendations failed"),
                    Err(e) => error!(error = %e, "Scheduled recommendations task failed"),
                }
            }
        });
    } else {
        warn!(
            "{} is 0, scheduled recommendations disabled",
            RECOMMENDATION_INTERVAL_ENV
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecomputeScheduleConfig::default();
        assert_eq!(config.recompute_interval_minutes, 60);
        assert_eq!(config.recommendation_interval_hours, 24);
        assert!(config.is_enabled());
    }

    #[test]
    fn test_both_disabled() {
        let config = RecomputeScheduleConfig {
            recompute_interval_minutes: 0,
            recommendation_interval_hours: 0,
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_periods_saturate_on_huge_values() {
        let config = RecomputeScheduleConfig {
            recompute_interval_minutes: u64::MAX,
            recommendation_interval_hours: u64::MAX / 2,
        };
        assert_eq!(config.recompute_period(), MAX_PERIOD);
        assert_eq!(config.recommendation_period(), MAX_PERIOD);

        let config = RecomputeScheduleConfig::default();
        assert_eq!(config.recompute_period(), Duration::from_secs(3600));
        assert_eq!(config.recommendation_period(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_unset_variable_uses_default() {
        assert_eq!(read_interval("VIGIL_TEST_UNSET_INTERVAL", 42), 42);
    }
}
