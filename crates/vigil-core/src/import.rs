//! Generic CSV transaction import
//!
//! Expected headers (case-insensitive, any order):
//! `date,description,amount[,category][,merchant]`.
//! Negative amounts are outflows.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info};

use crate::db::{Database, TransactionInsertResult};
use crate::error::{Error, Result};
use crate::merchant::normalize_merchant;
use crate::models::NewTransaction;

/// Outcome of importing one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub parsed: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    merchant: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| Error::InvalidData(format!("Missing '{}' column", name)))
        };
        Ok(Self {
            date: required("date")?,
            description: required("description")?,
            amount: required("amount")?,
            category: find("category"),
            merchant: find("merchant"),
        })
    }
}

/// Parse a CSV file into transactions for one user
///
/// Identical rows within a file are kept apart by their occurrence index,
/// so re-importing the same file inserts nothing new.
pub fn parse_csv<R: Read>(reader: R, user_id: i64) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut occurrences: HashMap<(NaiveDate, String, u64), u32> = HashMap::new();
    let mut transactions = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |idx: usize, name: &str| {
            record.get(idx).ok_or_else(|| {
                Error::InvalidData(format!("Row {}: missing {}", line + 1, name))
            })
        };
        let optional = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let date = parse_date(field(columns.date, "date")?)?;
        let description = field(columns.description, "description")?.to_string();
        let amount = parse_amount(field(columns.amount, "amount")?)?;
        let category = optional(columns.category);
        let merchant = optional(columns.merchant)
            .and_then(|m| normalize_merchant(&m))
            .or_else(|| normalize_merchant(&description));

        let occurrence = occurrences
            .entry((date, description.clone(), amount.to_bits()))
            .and_modify(|n| *n += 1)
            .or_insert(0);
        let import_hash = generate_hash(user_id, &date, &description, amount, *occurrence);

        transactions.push(NewTransaction {
            date,
            description,
            merchant,
            category,
            amount,
            import_hash,
        });
    }

    debug!("Parsed {} transactions", transactions.len());
    Ok(transactions)
}

/// Parse and insert a CSV file, skipping rows already imported
pub fn import_csv<R: Read>(db: &Database, user_id: i64, reader: R) -> Result<ImportStats> {
    let transactions = parse_csv(reader, user_id)?;
    let mut stats = ImportStats {
        parsed: transactions.len(),
        ..Default::default()
    };

    for tx in &transactions {
        match db.insert_transaction(user_id, tx)? {
            TransactionInsertResult::Inserted(_) => stats.inserted += 1,
            TransactionInsertResult::Duplicate(_) => stats.duplicates += 1,
        }
    }

    info!(
        user_id,
        parsed = stats.parsed,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        "Import complete"
    );
    Ok(stats)
}

/// Import a CSV file from disk
pub fn import_csv_file(
    db: &Database,
    user_id: i64,
    path: impl AsRef<std::path::Path>,
) -> Result<ImportStats> {
    let file = std::fs::File::open(path)?;
    import_csv(db, user_id, file)
}

/// Hash identifying one imported row for one user
fn generate_hash(
    user_id: i64,
    date: &NaiveDate,
    description: &str,
    amount: f64,
    occurrence: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_be_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update(occurrence.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Parse `YYYY-MM-DD` or `MM/DD/YYYY`
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("Unable to parse amount: {}", s)))
}
