//! Spending alert engine
//!
//! ## Pieces
//!
//! - **Baselines** - trailing per-category monthly averages
//! - **Rules** - Large Transaction, Frequency, Category Spike, New Merchant
//! - **Severity** - critical/moderate classification and default display text
//! - **Engine** - the idempotent per-(user, month) recompute pass
//! - **Service** - acknowledge/dismiss, listing, settings, suppression lists
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_core::alerts::AlertService;
//! use vigil_core::models::YearMonth;
//!
//! let service = AlertService::new(db);
//! let result = service.recompute(user_id, YearMonth::current())?;
//! println!("{} alerts generated", result.generated);
//! ```

pub mod baseline;
pub mod engine;
pub mod rules;
pub mod service;
pub mod severity;

pub use baseline::{compute_baselines, Baselines};
pub use engine::{AlertService, DEFAULT_BACKFILL_MONTHS, MAX_BACKFILL_MONTHS};
pub use rules::{
    CategorySpikeRule, FrequencyRule, LargeTransactionRule, NewMerchantRule, Rule, RuleContext,
    RuleRegistry,
};
pub use service::{AlertListing, AlertTypeInfo, Capabilities};
