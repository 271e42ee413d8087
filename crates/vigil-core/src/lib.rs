//! Vigil Core Library
//!
//! Shared functionality for the Vigil spending alert engine:
//! - Database access and migrations
//! - Generic CSV transaction import and merchant normalization
//! - Rule-based anomaly detection with idempotent monthly recompute
//! - Acknowledge/dismiss workflow with an append-only audit trail
//! - Category cap recommendations
//! - Live event fan-out and a rate-limited notification bridge

pub mod alerts;
pub mod db;
pub mod error;
pub mod import;
pub mod merchant;
pub mod models;
pub mod notify;
pub mod recommendations;
pub mod stream;

/// Seeding helpers for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alerts::{AlertService, Capabilities, Rule, RuleRegistry};
pub use db::Database;
pub use error::{Error, Result};
pub use import::ImportStats;
pub use notify::{AlertNotifier, LogNotifier, NoopNotifier, RateLimitedNotifier};
pub use stream::{StreamEvent, StreamEventKind, StreamPublisher, Subscription};
