//! Field extractors, one per line shape.
//!
//! Each extractor takes a line already classified as its shape and either
//! returns fully typed values or fails. Nothing is partially filled in.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ParseError, Result};
use crate::money::{self, Money};
use crate::normalize::{Line, squeeze_ws};
use crate::shape::Shape;
use crate::types::PaymentMethod;
use crate::vocab;

const AMOUNT: &str = r"[0-9][0-9,]*\.\d{2}";

/// `Account number ...` header, dual-currency or plain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHeader {
    pub account_number: String,
    pub sub_currency: Option<String>,
    pub amount_currency: Option<String>,
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHeader {
    pub card_number: String,
    pub cardholder_name: String,
}

/// `Statement date Statement balance DD MON YYYY CCY amount`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedBalance {
    pub date: NaiveDate,
    pub currency: String,
    pub balance: Decimal,
}

/// Primary transaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRow {
    pub post_date: NaiveDate,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub money: Money,
    pub region_code_alpha2: Option<String>,
    /// Inline `CCY amount` suffix of the description.
    pub foreign: Option<(String, Decimal)>,
}

/// `CCY amount [@ rate]` continuation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignAmount {
    pub currency: String,
    pub amount: Decimal,
    pub rate: Option<Decimal>,
}

pub struct Patterns {
    product: Regex,
    statement_date: Regex,
    statement_date_balance: Regex,
    account_dual: Regex,
    account_number: Regex,
    amount_columns: Regex,
    card_header: Regex,
    transaction: Regex,
    foreign_amount: Regex,
    exchange_rate: Regex,
    previous_balance: Regex,
    subtotal: Regex,
    statement_balance: Regex,
    credit_payment: Regex,
    purchases: Regex,
    total_balance: Regex,
}

impl Patterns {
    pub fn new() -> std::result::Result<Self, regex::Error> {
        let amount_line = |prefix: &str| Regex::new(&format!(r"^{prefix}({AMOUNT}(?:CR)?)$"));
        Ok(Self {
            product: Regex::new(&format!(
                r"^([A-Z][A-Z0-9 &/-]{{2,}}?)(?: ?HKD ?{AMOUNT}\*?)?$"
            ))?,
            statement_date: Regex::new(r"(?i)^statement ?date (\d{1,2}) ?([a-z]{3}) ?(\d{4})$")?,
            statement_date_balance: Regex::new(&format!(
                r"(?i)^statement ?date statement ?balance (\d{{1,2}}) ?([a-z]{{3}}) ?(\d{{4}}) (HKD|CNY|RMB) ?({AMOUNT})$"
            ))?,
            account_dual: Regex::new(&format!(
                r"(?i)^account ?number ((?:\d{{4}} ?){{3}}\d{{4}}) ?(HKD|RMB) ?sub-account statement ?balance (HKD|CNY|RMB) ?({AMOUNT})$"
            ))?,
            account_number: Regex::new(r"(?i)^account ?number ((?:\d{4} ?){3}\d{4})$")?,
            amount_columns: Regex::new(
                r"(?i)^post ?date trans(?:action)? ?date description amount ?\((HKD|CNY|RMB)\)$",
            )?,
            card_header: Regex::new(r"^((?:\d{4} ){3}\d{4}) ([A-Za-z][A-Za-z .,'()/-]{1,48})$")?,
            transaction: Regex::new(&format!(
                r"^(\d{{2}}[A-Z]{{3}}) (\d{{2}}[A-Z]{{3}}) (.+?) ({AMOUNT}(?:CR)?)$"
            ))?,
            foreign_amount: Regex::new(&format!(r"^([A-Z]{{3}}) ({AMOUNT})(?: ?@ ?(.*))?$"))?,
            exchange_rate: Regex::new(r"(?i)^\*exchange ?rate ?: ?([0-9]+(?:\.[0-9]+)?)$")?,
            previous_balance: amount_line("PREVIOUS BALANCE ")?,
            subtotal: amount_line("SUB-?TOTAL ?:? ?")?,
            statement_balance: amount_line("STATEMENT BALANCE ")?,
            credit_payment: amount_line("CREDIT/PAYMENT ?: ?")?,
            purchases: amount_line("PURCHASES AND INSTALMENTS ?: ?")?,
            total_balance: amount_line("TOTAL ACCOUNT BALANCE ?: ?")?,
        })
    }

    /// Product name from the line following `CARD TYPE`. A trailing credit
    /// limit (`HKD100,000.00`) is dropped.
    pub fn product(&self, line: &Line) -> Result<String> {
        let upper = line.text.to_ascii_uppercase();
        let caps = self
            .product
            .captures(&upper)
            .ok_or_else(|| ParseError::field("product line is not a card product name").at(line))?;
        let product = squeeze_ws(
            &caps[1]
                .replace("DUALCURRENCY", " DUAL CURRENCY")
                .replace("CREDITCARD", " CREDIT CARD"),
        );
        if product.chars().any(|c| c.is_ascii_digit()) || product.split(' ').count() > 8 {
            return Err(ParseError::field(format!("implausible product name {product:?}")).at(line));
        }
        Ok(product)
    }

    pub fn statement_date(&self, line: &Line) -> Result<NaiveDate> {
        let caps = self
            .statement_date
            .captures(&line.text)
            .ok_or_else(|| ParseError::field("malformed statement date line").at(line))?;
        money::parse_day_month_year(&caps[1], &caps[2], &caps[3])
            .ok_or_else(|| ParseError::field("invalid statement date").at(line))
    }

    pub fn statement_date_balance(&self, line: &Line) -> Result<DatedBalance> {
        let caps = self
            .statement_date_balance
            .captures(&line.text)
            .ok_or_else(|| ParseError::field("malformed statement date/balance line").at(line))?;
        let date = money::parse_day_month_year(&caps[1], &caps[2], &caps[3])
            .ok_or_else(|| ParseError::field("invalid statement date").at(line))?;
        let balance = money::parse_plain_amount(&caps[5])
            .ok_or_else(|| ParseError::field("invalid statement balance").at(line))?;
        Ok(DatedBalance {
            date,
            currency: caps[4].to_ascii_uppercase(),
            balance,
        })
    }

    pub fn account_header(&self, shape: Shape, line: &Line) -> Result<AccountHeader> {
        match shape {
            Shape::AccountHeaderDual => {
                let caps = self
                    .account_dual
                    .captures(&line.text)
                    .ok_or_else(|| ParseError::field("malformed sub-account header").at(line))?;
                let account_number = account_digits(&caps[1], line)?;
                let sub = caps[2].to_ascii_uppercase();
                let amount = caps[3].to_ascii_uppercase();
                let consistent = match sub.as_str() {
                    "HKD" => amount == "HKD",
                    _ => amount == "CNY" || amount == "RMB",
                };
                if !consistent {
                    return Err(ParseError::field(format!(
                        "{sub} sub-account cannot be denominated in {amount}"
                    ))
                    .at(line));
                }
                let balance = money::parse_plain_amount(&caps[4])
                    .ok_or_else(|| ParseError::field("invalid sub-account balance").at(line))?;
                Ok(AccountHeader {
                    account_number,
                    sub_currency: Some(sub),
                    amount_currency: Some(amount),
                    balance: Some(balance),
                })
            }
            _ => {
                let caps = self
                    .account_number
                    .captures(&line.text)
                    .ok_or_else(|| ParseError::field("malformed account number line").at(line))?;
                Ok(AccountHeader {
                    account_number: account_digits(&caps[1], line)?,
                    sub_currency: None,
                    amount_currency: None,
                    balance: None,
                })
            }
        }
    }

    pub fn amount_columns(&self, line: &Line) -> Result<String> {
        self.amount_columns
            .captures(&line.text)
            .map(|caps| caps[1].to_ascii_uppercase())
            .ok_or_else(|| ParseError::field("malformed column header").at(line))
    }

    pub fn card_header(&self, line: &Line) -> Result<CardHeader> {
        let caps = self
            .card_header
            .captures(&line.text)
            .ok_or_else(|| ParseError::field("malformed card header").at(line))?;
        let card_number = account_digits(&caps[1], line)?;
        let cardholder_name = squeeze_ws(&caps[2]);
        if !is_probable_cardholder(&cardholder_name) {
            return Err(
                ParseError::field(format!("implausible cardholder name {cardholder_name:?}")).at(line),
            );
        }
        Ok(CardHeader {
            card_number,
            cardholder_name,
        })
    }

    pub fn transaction(&self, line: &Line, statement_date: NaiveDate) -> Result<TxRow> {
        let caps = self.transaction.captures(&line.text).ok_or_else(|| {
            ParseError::field("transaction-like line could not be parsed").at(line)
        })?;
        let post_date = money::parse_ddmon(&caps[1], statement_date)
            .ok_or_else(|| ParseError::field(format!("invalid post date {:?}", &caps[1])).at(line))?;
        let transaction_date = money::parse_ddmon(&caps[2], statement_date).ok_or_else(|| {
            ParseError::field(format!("invalid transaction date {:?}", &caps[2])).at(line)
        })?;
        let money = money::parse_money(&caps[4])
            .ok_or_else(|| ParseError::field(format!("invalid amount {:?}", &caps[4])).at(line))?;

        let mut tokens: Vec<&str> = caps[3].split(' ').collect();

        let mut foreign = None;
        if tokens.len() >= 3 && vocab::looks_like_currency(tokens[tokens.len() - 2]) {
            if let Some(amount) = money::parse_plain_amount(tokens[tokens.len() - 1]) {
                let code = tokens[tokens.len() - 2];
                let currency = vocab::currency_code(code).ok_or_else(|| {
                    ParseError::unknown_tag(format!("unknown currency code {code:?}")).at(line)
                })?;
                foreign = Some((currency.to_string(), amount));
                tokens.truncate(tokens.len() - 2);
            }
        }

        let mut region_code_alpha2 = None;
        if tokens.len() >= 2 && vocab::looks_like_region(tokens[tokens.len() - 1]) {
            let code = tokens[tokens.len() - 1];
            if !vocab::is_region_code(code) {
                return Err(ParseError::unknown_tag(format!("unknown region code {code:?}")).at(line));
            }
            region_code_alpha2 = Some(code.to_string());
            tokens.pop();
        }

        let description = tokens.join(" ");
        if description.is_empty() {
            return Err(ParseError::field("empty merchant description").at(line));
        }

        Ok(TxRow {
            post_date,
            transaction_date,
            description,
            money,
            region_code_alpha2,
            foreign,
        })
    }

    pub fn foreign_amount(&self, line: &Line) -> Result<ForeignAmount> {
        let caps = self
            .foreign_amount
            .captures(&line.text)
            .ok_or_else(|| ParseError::field("malformed foreign amount line").at(line))?;
        let code = &caps[1];
        let currency = vocab::currency_code(code)
            .ok_or_else(|| ParseError::unknown_tag(format!("unknown currency code {code:?}")).at(line))?;
        let amount = money::parse_plain_amount(&caps[2])
            .ok_or_else(|| ParseError::field("invalid foreign amount").at(line))?;
        let rate = match caps.get(3) {
            Some(raw) => Some(money::parse_rate(raw.as_str()).ok_or_else(|| {
                ParseError::cross_currency("foreign amount carries '@' but no usable exchange rate")
                    .at(line)
            })?),
            None => None,
        };
        Ok(ForeignAmount {
            currency: currency.to_string(),
            amount,
            rate,
        })
    }

    pub fn exchange_rate(&self, line: &Line) -> Result<Decimal> {
        self.exchange_rate
            .captures(&line.text)
            .and_then(|caps| money::parse_rate(&caps[1]))
            .ok_or_else(|| ParseError::cross_currency("exchange rate line without a usable rate").at(line))
    }

    pub fn payment_tag(&self, line: &Line) -> Result<PaymentMethod> {
        vocab::payment_method(&line.text).ok_or_else(|| {
            ParseError::unknown_tag(format!("unrecognized payment tag {:?}", line.text)).at(line)
        })
    }

    /// Note text without its leading `*`.
    pub fn note(&self, line: &Line) -> String {
        line.text.trim_start_matches('*').trim().to_string()
    }

    /// Single-amount lines: previous balance, subtotal and the summary block.
    pub fn amount_line(&self, shape: Shape, line: &Line) -> Result<Money> {
        let (re, label) = match shape {
            Shape::PreviousBalance => (&self.previous_balance, "PREVIOUS BALANCE"),
            Shape::CardSubtotal => (&self.subtotal, "SUBTOTAL"),
            Shape::StatementBalance => (&self.statement_balance, "STATEMENT BALANCE"),
            Shape::CreditPaymentSummary => (&self.credit_payment, "CREDIT/PAYMENT"),
            Shape::PurchasesSummary => (&self.purchases, "PURCHASES AND INSTALMENTS"),
            Shape::TotalBalanceSummary => (&self.total_balance, "TOTAL ACCOUNT BALANCE"),
            other => {
                return Err(ParseError::structural(format!("{other:?} is not an amount line")).at(line));
            }
        };
        let caps = re
            .captures(&line.text)
            .ok_or_else(|| ParseError::field(format!("malformed {label} line")).at(line))?;
        let m = money::parse_money(&caps[1])
            .ok_or_else(|| ParseError::field(format!("invalid {label} amount")).at(line))?;

        match shape {
            Shape::CardSubtotal => {}
            Shape::CreditPaymentSummary => {
                if !m.is_credit && !m.amount.is_zero() {
                    return Err(ParseError::field("CREDIT/PAYMENT must be marked CR").at(line));
                }
            }
            _ => {
                if m.is_credit {
                    return Err(ParseError::field(format!("{label} cannot be CR")).at(line));
                }
            }
        }
        Ok(m)
    }
}

fn account_digits(raw: &str, line: &Line) -> Result<String> {
    money::card_digits(raw)
        .ok_or_else(|| ParseError::field(format!("invalid card/account number {raw:?}")).at(line))
}

fn is_probable_cardholder(name: &str) -> bool {
    const BLOCKED: &[&str] = &["PULSE", "DUALCURRENCY", "CARDTYPE", "STATEMENTDATE", "CREDITLIMIT", "ACCOUNTNUMBER"];
    let upper = name.to_ascii_uppercase();
    let compact = upper.replace(' ', "");
    let words = upper.split(' ').filter(|w| !w.is_empty()).count();
    !BLOCKED.iter().any(|b| compact.contains(b)) && (1..=6).contains(&words)
}
