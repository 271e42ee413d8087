//! Data models for Vigil

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ========== Periods ==========

/// A calendar month, the unit of a recompute pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub const MIN_YEAR: i32 = 1;
    /// Keeps month arithmetic and date conversion well inside chrono's range
    pub const MAX_YEAR: i32 = 9999;

    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The month containing today's local date
    pub fn current() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month validated on construction")
    }

    pub fn last_day(&self) -> NaiveDate {
        self.plus_months(1)
            .first_day()
            .pred_opt()
            .expect("first of month always has a predecessor")
    }

    pub fn minus_months(&self, n: u32) -> Self {
        self.offset(-(n as i32))
    }

    pub fn plus_months(&self, n: u32) -> Self {
        self.offset(n as i32)
    }

    fn offset(&self, delta: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("Invalid month '{}', expected YYYY-MM", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

// ========== Users & Transactions ==========

/// A user of the alert engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction from the user's history (negative amount = outflow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
}

impl Transaction {
    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }

    /// Merchant name, empty when unknown
    pub fn merchant_name(&self) -> &str {
        self.merchant.as_deref().unwrap_or("")
    }

    /// Category key, empty when uncategorized
    pub fn category_key(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }
}

/// A transaction to be inserted
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub import_hash: String,
}

/// Outflow totals for one category over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: Option<String>,
    /// Signed sum of outflows (always <= 0)
    pub total_amount: f64,
    pub count: i64,
}

// ========== Alerts ==========

/// Kind of spending alert, one per detection rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LargeTransaction,
    NewMerchant,
    Frequency,
    CategorySpike,
}

impl AlertType {
    pub const ALL: [AlertType; 4] = [
        AlertType::LargeTransaction,
        AlertType::NewMerchant,
        AlertType::Frequency,
        AlertType::CategorySpike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LargeTransaction => "large_transaction",
            AlertType::NewMerchant => "new_merchant",
            AlertType::Frequency => "frequency",
            AlertType::CategorySpike => "category_spike",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertType::LargeTransaction => "Large Transactions",
            AlertType::NewMerchant => "New Merchants",
            AlertType::Frequency => "Frequency",
            AlertType::CategorySpike => "Category Spikes",
        }
    }

    /// Default title for alerts of this type
    pub fn default_title(&self) -> &'static str {
        match self {
            AlertType::LargeTransaction => "Large Transaction Detected",
            AlertType::NewMerchant => "New Merchant",
            AlertType::Frequency => "Unusual Frequency",
            AlertType::CategorySpike => "Category Spending Spike",
        }
    }

    /// Severity advertised to clients for this type
    pub fn advertised_severity(&self) -> Severity {
        match self {
            AlertType::LargeTransaction | AlertType::CategorySpike => Severity::Critical,
            AlertType::NewMerchant | AlertType::Frequency => Severity::Moderate,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "large_transaction" => Ok(AlertType::LargeTransaction),
            "new_merchant" => Ok(AlertType::NewMerchant),
            "frequency" => Ok(AlertType::Frequency),
            "category_spike" => Ok(AlertType::CategorySpike),
            _ => Err(Error::Validation(format!("Unknown alert type: {}", s))),
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Moderate,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Moderate => "moderate",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "critical" => Ok(Severity::Critical),
            "moderate" => Ok(Severity::Moderate),
            _ => Err(Error::Validation(format!("Unknown severity: {}", s))),
        }
    }
}

/// Per-rule detail captured when an alert is produced
///
/// Stored as a JSON document in the `metadata` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertMetadata {
    LargeTransaction {
        baseline_avg: f64,
        multiplier: f64,
        min_amount: f64,
        /// Effective threshold: max(baseline * multiplier, min_amount)
        threshold: f64,
    },
    Frequency {
        count: usize,
        window_hours: i64,
        min_amount: f64,
    },
    CategorySpike {
        baseline_avg: f64,
        multiplier: f64,
        threshold: f64,
        /// Period total divided by baseline
        ratio: f64,
        lookback_months: u32,
    },
    NewMerchant {
        min_amount: f64,
    },
}

/// Build the deduplication signature `type|merchant|category|(txnId or date)`
pub fn alert_signature(
    alert_type: AlertType,
    merchant: Option<&str>,
    category: Option<&str>,
    txn_id: Option<i64>,
    txn_date: NaiveDate,
) -> String {
    let discriminator = match txn_id {
        Some(id) => id.to_string(),
        None => txn_date.to_string(),
    };
    format!(
        "{}|{}|{}|{}",
        alert_type.as_str(),
        merchant.unwrap_or(""),
        category.unwrap_or(""),
        discriminator
    )
}

/// An alert produced by a rule, before deduplication and persistence
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAlert {
    pub alert_type: AlertType,
    pub severity: Option<Severity>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub amount: f64,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub txn_date: NaiveDate,
    pub txn_id: Option<i64>,
    pub metadata: AlertMetadata,
}

impl CandidateAlert {
    pub fn new(
        alert_type: AlertType,
        amount: f64,
        txn_date: NaiveDate,
        metadata: AlertMetadata,
    ) -> Self {
        Self {
            alert_type,
            severity: None,
            title: None,
            description: None,
            reason: None,
            amount,
            merchant: None,
            category: None,
            txn_date,
            txn_id: None,
            metadata,
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_txn_id(mut self, txn_id: i64) -> Self {
        self.txn_id = Some(txn_id);
        self
    }

    pub fn signature(&self) -> String {
        alert_signature(
            self.alert_type,
            self.merchant.as_deref(),
            self.category.as_deref(),
            self.txn_id,
            self.txn_date,
        )
    }
}

/// A finalized alert ready to be stored (all display fields resolved)
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub user_id: i64,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub reason: String,
    pub amount: f64,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub txn_date: NaiveDate,
    pub txn_id: Option<i64>,
    pub metadata: AlertMetadata,
}

/// A persisted spending alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_id: i64,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub amount: f64,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub txn_date: NaiveDate,
    pub reason: String,
    pub txn_id: Option<i64>,
    pub metadata: Option<AlertMetadata>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub dismissed: bool,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Acknowledged or dismissed alerts survive recompute
    pub fn is_retained(&self) -> bool {
        self.acknowledged || self.dismissed
    }

    pub fn signature(&self) -> String {
        alert_signature(
            self.alert_type,
            self.merchant.as_deref(),
            self.category.as_deref(),
            self.txn_id,
            self.txn_date,
        )
    }
}

// ========== Settings & Suppression ==========

/// Tunable rule thresholds and severity overrides for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub large_multiplier: f64,
    pub large_min_amount: f64,
    pub freq_window_hours: i64,
    pub freq_max_txn: i64,
    pub freq_min_amount: f64,
    pub cat_spike_multiplier: f64,
    pub cat_spike_lookback_months: u32,
    pub cat_spike_min_amount: f64,
    pub new_merchant_min_amount: f64,
    pub critical_large_absolute: Option<f64>,
    pub critical_category_spike_multiplier: Option<f64>,
    pub critical_frequency_count: Option<i64>,
    pub critical_new_merchant_absolute: Option<f64>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            large_multiplier: 1.5,
            large_min_amount: 0.0,
            freq_window_hours: 48,
            freq_max_txn: 4,
            freq_min_amount: 0.0,
            cat_spike_multiplier: 2.0,
            cat_spike_lookback_months: 3,
            cat_spike_min_amount: 0.0,
            new_merchant_min_amount: 0.0,
            critical_large_absolute: None,
            critical_category_spike_multiplier: None,
            critical_frequency_count: None,
            critical_new_merchant_absolute: None,
        }
    }
}

impl AlertThresholds {
    /// Maximum lookback window for baselines
    pub const MAX_LOOKBACK_MONTHS: u32 = 24;
    /// Maximum frequency window (30 days)
    pub const MAX_WINDOW_HOURS: i64 = 720;

    /// Reject malformed settings before they reach the rules
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(Error::Validation(format!("{} must be greater than 0", name)))
            }
        }
        fn non_negative(name: &str, v: f64) -> Result<()> {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(Error::Validation(format!("{} must not be negative", name)))
            }
        }

        positive("large_multiplier", self.large_multiplier)?;
        non_negative("large_min_amount", self.large_min_amount)?;
        if !(1..=Self::MAX_WINDOW_HOURS).contains(&self.freq_window_hours) {
            return Err(Error::Validation(format!(
                "freq_window_hours must be between 1 and {}",
                Self::MAX_WINDOW_HOURS
            )));
        }
        if self.freq_max_txn < 1 {
            return Err(Error::Validation(
                "freq_max_txn must be at least 1".to_string(),
            ));
        }
        non_negative("freq_min_amount", self.freq_min_amount)?;
        positive("cat_spike_multiplier", self.cat_spike_multiplier)?;
        if !(1..=Self::MAX_LOOKBACK_MONTHS).contains(&self.cat_spike_lookback_months) {
            return Err(Error::Validation(format!(
                "cat_spike_lookback_months must be between 1 and {}",
                Self::MAX_LOOKBACK_MONTHS
            )));
        }
        non_negative("cat_spike_min_amount", self.cat_spike_min_amount)?;
        non_negative("new_merchant_min_amount", self.new_merchant_min_amount)?;

        if let Some(v) = self.critical_large_absolute {
            positive("critical_large_absolute", v)?;
        }
        if let Some(v) = self.critical_category_spike_multiplier {
            positive("critical_category_spike_multiplier", v)?;
        }
        if let Some(v) = self.critical_frequency_count {
            if v < 1 {
                return Err(Error::Validation(
                    "critical_frequency_count must be at least 1".to_string(),
                ));
            }
        }
        if let Some(v) = self.critical_new_merchant_absolute {
            positive("critical_new_merchant_absolute", v)?;
        }
        Ok(())
    }
}

/// Stored per-user alert settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub user_id: i64,
    #[serde(flatten)]
    pub thresholds: AlertThresholds,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub last_generated_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A merchant whose transactions never raise merchant-based alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: i64,
    pub user_id: i64,
    pub merchant: String,
    pub created_at: DateTime<Utc>,
}

/// A category muted for large-transaction and spike detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutedCategory {
    pub id: i64,
    pub user_id: i64,
    pub category: String,
    /// Last day the mute applies; None mutes indefinitely
    pub mute_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl MutedCategory {
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.mute_until.map_or(true, |until| until >= today)
    }
}

// ========== Audit ==========

/// Action recorded in an alert's audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Acknowledged,
    Dismissed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Acknowledged => "acknowledged",
            AuditAction::Dismissed => "dismissed",
        }
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(AuditAction::Created),
            "acknowledged" => Ok(AuditAction::Acknowledged),
            "dismissed" => Ok(AuditAction::Dismissed),
            _ => Err(Error::InvalidData(format!("Unknown audit action: {}", s))),
        }
    }
}

/// One row of the append-only alert audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAuditEntry {
    pub id: i64,
    pub alert_id: i64,
    pub user_id: i64,
    pub action: AuditAction,
    pub at: DateTime<Utc>,
}

// ========== Recommendations ==========

/// Recommendation type for category caps
pub const SUGGESTED_LIMIT: &str = "suggested_limit";

/// A generated spending recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub user_id: i64,
    pub month: YearMonth,
    #[serde(rename = "type")]
    pub rec_type: String,
    pub priority: i64,
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub current_monthly_avg: Option<f64>,
    pub suggested_cap: Option<f64>,
    pub rationale: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A recommendation to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecommendation {
    pub rec_type: String,
    pub priority: i64,
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub current_monthly_avg: Option<f64>,
    pub suggested_cap: Option<f64>,
    pub rationale: Option<String>,
}

// ========== Queries & Results ==========

/// Sortable alert columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Amount,
    TxnDate,
    Severity,
    Type,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Amount => "amount",
            SortField::TxnDate => "txn_date",
            SortField::Severity => "severity",
            SortField::Type => "type",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "createdAt" | "created_at" => Some(SortField::CreatedAt),
            "amount" => Some(SortField::Amount),
            "txnDate" | "txn_date" => Some(SortField::TxnDate),
            "severity" => Some(SortField::Severity),
            "type" => Some(SortField::Type),
            _ => None,
        }
    }
}

/// Alert listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for AlertSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl AlertSort {
    /// Parse `field[,asc|desc]`; unknown fields fall back to newest-first
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split(',');
        let field = parts.next().and_then(SortField::parse);
        match field {
            Some(field) => Self {
                field,
                descending: !parts
                    .next()
                    .map(|d| d.trim().eq_ignore_ascii_case("asc"))
                    .unwrap_or(false),
            },
            None => Self::default(),
        }
    }
}

/// Filters and paging for alert search
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    /// Month of the alert's transaction date; None = current month
    pub month: Option<YearMonth>,
    pub alert_type: Option<AlertType>,
    pub severity: Option<Severity>,
    pub acknowledged: Option<bool>,
    /// Zero-based page number
    pub page: u32,
    /// Page size; 0 = default
    pub size: u32,
    pub sort: AlertSort,
}

impl AlertQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    pub const MAX_PAGE_SIZE: u32 = 200;

    pub fn page_size(&self) -> u32 {
        match self.size {
            0 => Self::DEFAULT_PAGE_SIZE,
            n => n.min(Self::MAX_PAGE_SIZE),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, size: u32, total_elements: i64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            (total_elements + size as i64 - 1) / size as i64
        };
        Self {
            items,
            page,
            size,
            total_elements,
            total_pages,
            first: page == 0,
            last: (page as i64 + 1) >= total_pages,
        }
    }
}

/// Open alert counts plus last-pass bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub critical_open: i64,
    pub moderate_open: i64,
    pub acknowledged_open: i64,
    pub total: i64,
    pub last_generated_count: Option<i64>,
    pub last_generated_at: Option<DateTime<Utc>>,
}

/// Outcome of one recompute pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeResult {
    pub month: YearMonth,
    pub generated: usize,
    pub replaced: usize,
    pub duration_ms: u64,
}

/// Outcome of a recompute across the whole user population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRecomputeResult {
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub generated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_bounds() {
        let ym: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(ym.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(ym.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(ym.minus_months(3).to_string(), "2023-11");
        assert_eq!(ym.plus_months(11).to_string(), "2025-01");
    }

    #[test]
    fn test_year_month_rejects_garbage() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024".parse::<YearMonth>().is_err());
        assert!("abcd-01".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_year_month_rejects_out_of_range_years() {
        for input in ["300000-01", "0000-06", "-5-01", "2147483647-12", "10000-01"] {
            let err = input.parse::<YearMonth>().unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{}", input);
        }

        let last: YearMonth = "9999-12".parse().unwrap();
        assert_eq!(last.last_day(), NaiveDate::from_ymd_opt(9999, 12, 31).unwrap());
        let first: YearMonth = "0001-01".parse().unwrap();
        assert_eq!(first.minus_months(24).first_day().year(), -1);
        assert!(YearMonth::new(10_000, 1).is_none());
    }

    #[test]
    fn test_signature_prefers_txn_id() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            alert_signature(AlertType::Frequency, Some("Cafe"), None, Some(42), date),
            "frequency|Cafe||42"
        );
        assert_eq!(
            alert_signature(AlertType::CategorySpike, None, Some("Dining"), None, date),
            "category_spike||Dining|2024-03-05"
        );
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(AlertThresholds::default().validate().is_ok());

        let bad = AlertThresholds {
            large_multiplier: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::Validation(_))));

        let bad = AlertThresholds {
            cat_spike_lookback_months: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = AlertThresholds {
            critical_frequency_count: Some(0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_sort_parse() {
        let sort = AlertSort::parse("amount,asc");
        assert_eq!(sort.field, SortField::Amount);
        assert!(!sort.descending);

        let sort = AlertSort::parse("txnDate");
        assert_eq!(sort.field, SortField::TxnDate);
        assert!(sort.descending);

        assert_eq!(AlertSort::parse("password;drop"), AlertSort::default());
    }

    #[test]
    fn test_page_metadata() {
        let page: Page<i32> = Page::new(vec![1, 2], 0, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.first);
        assert!(!page.last);

        let empty: Page<i32> = Page::new(vec![], 0, 50, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.last);
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = AlertMetadata::Frequency {
            count: 5,
            window_hours: 48,
            min_amount: 0.0,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "frequency");
        assert_eq!(json["count"], 5);
    }
}
