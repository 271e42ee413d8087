//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, resolve_user, parse_month)
//! - `import` - CSV transaction import
//! - `alerts` - Alert listing, recompute, backfill and triage
//! - `settings` - Thresholds, whitelist, muted categories, recommendations
//! - `serve` - Web server command

pub mod alerts;
pub mod core;
pub mod import;
pub mod serve;
pub mod settings;

// Re-export command functions for main.rs
pub use alerts::*;
pub use core::*;
pub use import::*;
pub use serve::*;
pub use settings::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
