//! Fixed-point money, date and card-number primitives shared by the extractors.
//!
//! Nothing here knows about line shapes; every function returns `None` on a
//! malformed token and leaves error reporting to the caller, which has the line.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// An amount as printed, with its credit marker split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub is_credit: bool,
}

impl Money {
    /// Negative for credits. Zero stays zero even when marked `CR`.
    pub fn signed(&self) -> Decimal {
        if self.is_credit && !self.amount.is_zero() {
            -self.amount
        } else {
            self.amount
        }
    }
}

/// Parse `1,234.56` or `1,234.56CR`.
pub fn parse_money(token: &str) -> Option<Money> {
    let token: String = token.chars().filter(|c| *c != ' ').collect();
    let (body, is_credit) = match token.strip_suffix("CR") {
        Some(rest) => (rest, true),
        None => (token.as_str(), false),
    };
    let amount = parse_plain_amount(body)?;
    Some(Money { amount, is_credit })
}

/// Parse an unsigned two-decimal amount with optional thousands separators.
pub fn parse_plain_amount(token: &str) -> Option<Decimal> {
    let digits = token.replace(',', "");
    let (int_part, frac_part) = digits.split_once('.')?;
    if int_part.is_empty()
        || frac_part.len() != 2
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Decimal::from_str(&digits).ok()
}

/// Parse a strictly positive exchange rate such as `7.8235` or `0.05`.
pub fn parse_rate(token: &str) -> Option<Decimal> {
    let token = token.trim();
    let valid = match token.split_once('.') {
        Some((i, f)) => {
            !i.is_empty()
                && !f.is_empty()
                && i.bytes().all(|b| b.is_ascii_digit())
                && f.bytes().all(|b| b.is_ascii_digit())
        }
        None => !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()),
    };
    if !valid {
        return None;
    }
    let rate = Decimal::from_str(token).ok()?;
    (rate > Decimal::ZERO).then_some(rate)
}

/// Round half away from zero to cents.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn month_number(month: &str) -> Option<u32> {
    let m = match month.to_ascii_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(m)
}

/// Parse `12 JAN 2026` style parts.
pub fn parse_day_month_year(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let d: u32 = day.parse().ok()?;
    let m = month_number(month)?;
    let y: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a `15DEC` row date relative to the statement date.
///
/// Rows carry no year: a month later than the statement month belongs to the
/// previous year (December rows on a January statement).
pub fn parse_ddmon(token: &str, statement_date: NaiveDate) -> Option<NaiveDate> {
    if token.len() != 5 || !token.is_char_boundary(2) {
        return None;
    }
    let (day, month) = token.split_at(2);
    if !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let d: u32 = day.parse().ok()?;
    let m = month_number(month)?;
    let year = if m > statement_date.month() {
        statement_date.year() - 1
    } else {
        statement_date.year()
    };
    NaiveDate::from_ymd_opt(year, m, d)
}

/// Collapse a spaced card/account number to its 16 digits.
pub fn card_digits(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == 16 && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}
