//! Merchant name normalization
//!
//! Bank descriptions carry noise around the merchant name: POS markers,
//! trailing reference numbers, card network words, corporate suffixes.
//! Alerts group and suppress by merchant, so every merchant name goes
//! through [`normalize_merchant`] before it is stored.

use regex::Regex;
use std::sync::OnceLock;

/// Longest normalized merchant name kept
pub const MAX_MERCHANT_LEN: usize = 64;

struct Patterns {
    multi_space: Regex,
    trailing_number: Regex,
    leading_marker: Regex,
    card_word: Regex,
    specials: Regex,
    corporate_suffix: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        multi_space: Regex::new(r"\s+").expect("valid regex"),
        trailing_number: Regex::new(r"^(.*?)(?:[#*\n\r\t -]*[0-9]{2,}|[0-9]{4,})$")
            .expect("valid regex"),
        leading_marker: Regex::new(r"(?i)^(pos|atm|online|web|purchase|debit|credit)[: -]+")
            .expect("valid regex"),
        card_word: Regex::new(r"(?i)(visa|mastercard|amex|debit|credit)").expect("valid regex"),
        specials: Regex::new(r"[^A-Za-z0-9&'+ ]").expect("valid regex"),
        corporate_suffix: Regex::new(r"(?i)\b(inc|llc|ltd|co|corp|company|store|shop)\b")
            .expect("valid regex"),
    })
}

/// Canonical merchant name from a raw description, or None when nothing is left
pub fn normalize_merchant(raw: &str) -> Option<String> {
    let p = patterns();

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut s = p.multi_space.replace_all(trimmed, " ").into_owned();

    if let Some(caps) = p.trailing_number.captures(&s) {
        let head = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        // Short heads are usually the whole name ("7-11 1234")
        if head.len() > 3 {
            s = head.to_string();
        }
    }

    s = p.leading_marker.replace(&s, " ").into_owned();
    s = p.card_word.replace_all(&s, "").into_owned();
    s = p.specials.replace_all(&s, " ").into_owned();
    s = p.multi_space.replace_all(&s, " ").into_owned();
    s = p.corporate_suffix.replace_all(&s, "").into_owned();
    s = p.multi_space.replace_all(&s, " ").trim().to_string();

    if s.chars().count() > MAX_MERCHANT_LEN {
        s = s.chars().take(MAX_MERCHANT_LEN).collect::<String>().trim().to_string();
    }
    if s.is_empty() {
        return None;
    }

    Some(title_case(&s))
}

fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut capitalize = true;
    for c in input.chars() {
        if c.is_whitespace() {
            out.push(c);
            capitalize = true;
        } else if capitalize {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
