//! Transaction and block assembly.
//!
//! Runs the field extractors over each segmented block and builds draft
//! records. Drafts keep their source lines for diagnostics and are only turned
//! into public types after cross-validation passes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt::Debug;

use crate::classify;
use crate::error::{ErrorKind, ParseError, Result};
use crate::extract::{AccountHeader, DatedBalance, Patterns};
use crate::money::Money;
use crate::normalize::Line;
use crate::segment::{CardBlock, Document, SubAccountBlock, Tagged};
use crate::shape::Shape;
use crate::types::{self, PaymentMethod, StatementTemplate, TransactionKind};

/// A declared figure and the line that printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub value: Decimal,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHeader {
    pub product: String,
    pub statement_date: NaiveDate,
    pub template: StatementTemplate,
    /// Single-currency statements print the balance next to the statement date.
    pub dated_balance: Option<DatedBalance>,
    /// First line that printed `dated_balance`.
    pub dated_balance_line: Option<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTransaction {
    pub line: Line,
    pub post_date: NaiveDate,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub money: Money,
    pub kind: TransactionKind,
    pub payment_method: Option<PaymentMethod>,
    pub region_code_alpha2: Option<String>,
    pub currency: String,
    pub currency_amount: Decimal,
    pub exchange_rate: Option<Decimal>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCard {
    pub line: Line,
    pub card_number: String,
    pub cardholder_name: String,
    pub subtotal: Option<(Money, Line)>,
    pub transactions: Vec<DraftTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSubAccount {
    pub line: Line,
    pub account_number: String,
    pub account_currency: String,
    pub amount_currency: String,
    pub header_balance: Option<Declared>,
    pub previous_balance: Option<Declared>,
    pub statement_balance: Option<Declared>,
    pub credit_payment: Option<Declared>,
    pub purchases_and_instalments: Option<Declared>,
    pub total_account_balance: Option<Declared>,
    pub cards: Vec<DraftCard>,
}

impl DraftSubAccount {
    pub fn base_currency(&self) -> &str {
        types::base_currency(&self.amount_currency)
    }
}

/// Per-block context the transaction assembler resolves against.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub template: StatementTemplate,
    pub statement_date: NaiveDate,
    pub base_currency: &'a str,
}

fn set_once<T: PartialEq + Debug>(slot: &mut Option<T>, value: T, label: &str, line: &Line) -> Result<()> {
    match slot {
        None => {
            *slot = Some(value);
            Ok(())
        }
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(ParseError::structural(format!(
            "conflicting {label}: {existing:?} vs {value:?}"
        ))
        .at(line)),
    }
}

fn set_declared(slot: &mut Option<Declared>, value: Decimal, label: &str, line: &Line) -> Result<()> {
    match slot {
        None => {
            *slot = Some(Declared { value, line: line.clone() });
            Ok(())
        }
        Some(existing) if existing.value == value => Ok(()),
        Some(existing) => Err(ParseError::structural(format!(
            "conflicting {label}: {} vs {value}",
            existing.value
        ))
        .at(line)),
    }
}

pub fn assemble_header(patterns: &Patterns, doc: &Document) -> Result<StatementHeader> {
    let mut product = None;
    let mut statement_date = None;
    let mut dated_balance: Option<DatedBalance> = None;
    let mut dated_balance_line = None;

    for Tagged { shape, line } in &doc.header {
        match shape {
            Shape::ProductLabel => {}
            Shape::Product => set_once(&mut product, patterns.product(line)?, "product", line)?,
            Shape::StatementDate => {
                set_once(&mut statement_date, patterns.statement_date(line)?, "statement date", line)?
            }
            Shape::StatementDateBalance => {
                let db = patterns.statement_date_balance(line)?;
                set_once(&mut statement_date, db.date, "statement date", line)?;
                set_once(&mut dated_balance, db, "statement balance", line)?;
                dated_balance_line.get_or_insert_with(|| line.clone());
            }
            other => {
                return Err(ParseError::structural(format!("{other:?} line in statement header")).at(line));
            }
        }
    }

    let product = product.ok_or_else(|| ParseError::structural("statement has no card product"))?;
    let statement_date =
        statement_date.ok_or_else(|| ParseError::structural("statement has no statement date"))?;

    let dual = doc
        .sub_accounts
        .iter()
        .filter(|s| s.header.iter().any(|t| t.shape == Shape::AccountHeaderDual))
        .count();
    let template = match dual {
        0 => StatementTemplate::SingleCurrency,
        n if n == doc.sub_accounts.len() => StatementTemplate::DualCurrency,
        _ => {
            return Err(ParseError::structural(
                "statement mixes single- and dual-currency account headers",
            ));
        }
    };

    match template {
        StatementTemplate::SingleCurrency if doc.sub_accounts.len() != 1 => {
            return Err(ParseError::structural(format!(
                "single-currency statement has {} accounts",
                doc.sub_accounts.len()
            )));
        }
        StatementTemplate::DualCurrency if dated_balance.is_some() => {
            return Err(ParseError::structural(
                "dual-currency statement prints a statement-level balance",
            ));
        }
        _ => {}
    }

    Ok(StatementHeader {
        product,
        statement_date,
        template,
        dated_balance,
        dated_balance_line,
    })
}

pub fn assemble_sub_account(
    patterns: &Patterns,
    block: &SubAccountBlock,
    header: &StatementHeader,
) -> Result<DraftSubAccount> {
    let (account, account_line) = match block.header.iter().find(|t| t.shape.is_account_header()) {
        Some(t) => (patterns.account_header(t.shape, &t.line)?, t.line.clone()),
        // Keyed on the card number; see `Segmenter`.
        None => {
            let card_line = block
                .cards
                .first()
                .and_then(|c| c.header.first())
                .map(|t| t.line.clone())
                .ok_or_else(|| ParseError::structural(format!("account {} has no header", block.account_number)))?;
            let implicit = AccountHeader {
                account_number: block.account_number.clone(),
                sub_currency: None,
                amount_currency: None,
                balance: None,
            };
            (implicit, card_line)
        }
    };

    let mut amount_currency = account.amount_currency.clone();
    let mut header_balance = None;
    if let Some(balance) = account.balance {
        header_balance = Some(Declared { value: balance, line: account_line.clone() });
    }
    if let Some(db) = &header.dated_balance {
        let line = header.dated_balance_line.as_ref().unwrap_or(&account_line);
        set_once(&mut amount_currency, db.currency.clone(), "amount currency", line)?;
        header_balance = Some(Declared { value: db.balance, line: line.clone() });
    }

    let mut previous_balance = None;
    for Tagged { shape, line } in &block.header {
        match shape {
            Shape::AccountHeaderDual | Shape::AccountNumber => {
                let repeat = patterns.account_header(*shape, line)?;
                if repeat != account {
                    return Err(ParseError::structural(
                        "repeated sub-account header disagrees with the first one",
                    )
                    .at(line));
                }
            }
            Shape::AmountColumns => {
                let ccy = patterns.amount_columns(line)?;
                match &amount_currency {
                    None => amount_currency = Some(ccy),
                    Some(known) if types::base_currency(known) == types::base_currency(&ccy) => {}
                    Some(known) => {
                        return Err(ParseError::structural(format!(
                            "amounts printed in {ccy} under a {known} sub-account"
                        ))
                        .at(line));
                    }
                }
            }
            Shape::PreviousBalance => {
                let m = patterns.amount_line(*shape, line)?;
                set_declared(&mut previous_balance, m.amount, "previous balance", line)?;
            }
            other => {
                return Err(ParseError::structural(format!("{other:?} line in sub-account header")).at(line));
            }
        }
    }

    let amount_currency = amount_currency.ok_or_else(|| {
        ParseError::structural(format!(
            "could not determine currency for account {}",
            account.account_number
        ))
        .at(&account_line)
    })?;
    let account_currency = account.sub_currency.unwrap_or_else(|| {
        if types::base_currency(&amount_currency) == "CNY" { "RMB" } else { "HKD" }.to_string()
    });

    let mut draft = DraftSubAccount {
        line: account_line,
        account_number: account.account_number,
        account_currency,
        amount_currency,
        header_balance,
        previous_balance,
        statement_balance: None,
        credit_payment: None,
        purchases_and_instalments: None,
        total_account_balance: None,
        cards: Vec::with_capacity(block.cards.len()),
    };

    for Tagged { shape, line } in &block.summary {
        let m = patterns.amount_line(*shape, line)?;
        let (slot, label) = match shape {
            Shape::StatementBalance => (&mut draft.statement_balance, "statement balance"),
            Shape::CreditPaymentSummary => (&mut draft.credit_payment, "CREDIT/PAYMENT"),
            Shape::PurchasesSummary => (&mut draft.purchases_and_instalments, "PURCHASES AND INSTALMENTS"),
            Shape::TotalBalanceSummary => (&mut draft.total_account_balance, "TOTAL ACCOUNT BALANCE"),
            other => {
                return Err(ParseError::structural(format!("{other:?} line in summary")).at(line));
            }
        };
        set_declared(slot, m.amount, label, line)?;
    }

    let ctx = Context {
        template: header.template,
        statement_date: header.statement_date,
        base_currency: types::base_currency(&draft.amount_currency),
    };
    let mut cards = Vec::with_capacity(block.cards.len());
    for card in &block.cards {
        cards.push(assemble_card(patterns, card, &ctx)?);
    }
    draft.cards = cards;

    Ok(draft)
}

pub fn assemble_card(patterns: &Patterns, block: &CardBlock, ctx: &Context<'_>) -> Result<DraftCard> {
    let first = &block.header[0].line;
    let header = patterns.card_header(first)?;
    for Tagged { line, .. } in &block.header[1..] {
        let repeat = patterns.card_header(line)?;
        if repeat.cardholder_name != header.cardholder_name {
            return Err(ParseError::structural(format!(
                "cardholder name changed for {}: {:?} vs {:?}",
                header.card_number, header.cardholder_name, repeat.cardholder_name
            ))
            .at(line));
        }
    }

    let mut transactions = Vec::new();
    let mut rows = block.rows.as_slice();
    while let Some((primary, rest)) = rows.split_first() {
        if primary.shape != Shape::TransactionRow {
            return Err(ParseError::structural("continuation row without a transaction").at(&primary.line));
        }
        // One primary row plus the continuation rows up to the next primary.
        let len = rest.iter().take_while(|t| t.shape.is_continuation()).count();
        let (continuations, remaining) = rest.split_at(len);
        transactions.push(assemble_transaction(patterns, primary, continuations, ctx)?);
        rows = remaining;
    }

    let subtotal = match &block.subtotal {
        Some(Tagged { shape, line }) => Some((patterns.amount_line(*shape, line)?, line.clone())),
        None => None,
    };

    Ok(DraftCard {
        line: first.clone(),
        card_number: header.card_number,
        cardholder_name: header.cardholder_name,
        subtotal,
        transactions,
    })
}

pub fn assemble_transaction(
    patterns: &Patterns,
    primary: &Tagged,
    continuations: &[Tagged],
    ctx: &Context<'_>,
) -> Result<DraftTransaction> {
    let line = &primary.line;
    let row = patterns.transaction(line, ctx.statement_date)?;

    let mut foreign = row.foreign.clone();
    let mut rate: Option<Decimal> = None;
    let mut payment_method = None;
    let mut notes = Vec::new();

    for Tagged { shape, line: cont } in continuations {
        match shape {
            Shape::ForeignAmount => {
                let fa = patterns.foreign_amount(cont)?;
                set_field(&mut foreign, (fa.currency, fa.amount), "foreign amount", cont)?;
                if let Some(r) = fa.rate {
                    set_field(&mut rate, r, "exchange rate", cont)?;
                }
            }
            Shape::ExchangeRate => {
                let r = patterns.exchange_rate(cont)?;
                set_field(&mut rate, r, "exchange rate", cont)?;
            }
            Shape::PaymentTag => {
                let method = patterns.payment_tag(cont)?;
                set_field(&mut payment_method, method, "payment method", cont)?;
            }
            Shape::Note => notes.push(patterns.note(cont)),
            other => {
                return Err(ParseError::structural(format!("{other:?} is not a continuation row")).at(cont));
            }
        }
    }

    let (currency, currency_amount, exchange_rate) = match foreign {
        Some((ccy, amount)) if ccy != ctx.base_currency => {
            let r = rate.ok_or_else(|| {
                ParseError::cross_currency(format!("{ccy} transaction has no exchange rate")).at(line)
            })?;
            (ccy, amount, Some(r))
        }
        Some((ccy, amount)) => {
            if rate.is_some() {
                return Err(ParseError::cross_currency(format!(
                    "exchange rate on a transaction already in {ccy}"
                ))
                .at(line));
            }
            if amount != row.money.amount {
                return Err(ParseError::conversion(format!(
                    "{ccy} {amount} printed beside a posted {ccy} {}",
                    row.money.amount
                ))
                .at(line));
            }
            (ccy, amount, None)
        }
        None => {
            if rate.is_some() {
                return Err(
                    ParseError::cross_currency("exchange rate without a foreign currency amount").at(line),
                );
            }
            (ctx.base_currency.to_string(), row.money.amount, None)
        }
    };

    let kind = classify::classify(ctx.template, &row.description, row.money.is_credit);

    Ok(DraftTransaction {
        line: line.clone(),
        post_date: row.post_date,
        transaction_date: row.transaction_date,
        description: row.description,
        money: row.money,
        kind,
        payment_method,
        region_code_alpha2: row.region_code_alpha2,
        currency,
        currency_amount,
        exchange_rate,
        notes,
    })
}

/// Like [`set_once`] but a disagreement inside one transaction is a field failure.
fn set_field<T: PartialEq + Debug>(slot: &mut Option<T>, value: T, label: &str, line: &Line) -> Result<()> {
    set_once(slot, value, label, line).map_err(|e| ParseError {
        kind: ErrorKind::FieldExtractionFailure,
        ..e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tagged(text: &str) -> Tagged {
        Tagged {
            shape: crate::shape::classify(text).unwrap(),
            line: Line {
                page: 1,
                number: 1,
                text: text.to_string(),
            },
        }
    }

    fn ctx() -> Context<'static> {
        Context {
            template: StatementTemplate::DualCurrency,
            statement_date: NaiveDate::from_ymd_opt(2026, 2, 25).unwrap(),
            base_currency: "HKD",
        }
    }

    #[test]
    fn test_plain_row_defaults_to_base_currency() {
        let p = Patterns::new().unwrap();
        let tx = assemble_transaction(&p, &tagged("10FEB 09FEB SUSHI SHOP HK 120.00"), &[], &ctx()).unwrap();
        assert_eq!(tx.currency, "HKD");
        assert_eq!(tx.currency_amount, dec!(120.00));
        assert!(tx.exchange_rate.is_none());
        assert_eq!(tx.kind, TransactionKind::Purchase);
    }

    #[test]
    fn test_foreign_row_with_rate_continuation() {
        let p = Patterns::new().unwrap();
        let tx = assemble_transaction(
            &p,
            &tagged("03FEB 01FEB AMAZON.COM SEATTLE US USD 100.00 782.35"),
            &[tagged("*EXCHANGE RATE: 7.8235"), tagged("APPLE PAY-MOBILE:4321"), tagged("*INCL. FEE")],
            &ctx(),
        )
        .unwrap();
        assert_eq!(tx.currency, "USD");
        assert_eq!(tx.currency_amount, dec!(100.00));
        assert_eq!(tx.exchange_rate, Some(dec!(7.8235)));
        assert_eq!(tx.payment_method, Some(PaymentMethod::ApplePay));
        assert_eq!(tx.notes, vec!["INCL. FEE".to_string()]);
    }

    #[test]
    fn test_foreign_amount_continuation_line() {
        let p = Patterns::new().unwrap();
        let tx = assemble_transaction(
            &p,
            &tagged("03FEB 01FEB BOOKSHOP LONDON GB 104.00"),
            &[tagged("GBP 10.40 @ 10.00")],
            &ctx(),
        )
        .unwrap();
        assert_eq!(tx.currency, "GBP");
        assert_eq!(tx.exchange_rate, Some(dec!(10.00)));
    }

    #[test]
    fn test_missing_rate_fails() {
        let p = Patterns::new().unwrap();
        let err = assemble_transaction(
            &p,
            &tagged("03FEB 01FEB AMAZON.COM US USD 100.00 782.35"),
            &[],
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteCrossCurrencyData);
    }

    #[test]
    fn test_rate_without_foreign_currency_fails() {
        let p = Patterns::new().unwrap();
        let err = assemble_transaction(
            &p,
            &tagged("10FEB 09FEB SUSHI SHOP HK 120.00"),
            &[tagged("*EXCHANGE RATE: 1.0")],
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteCrossCurrencyData);
    }

    #[test]
    fn test_conflicting_rates_fail() {
        let p = Patterns::new().unwrap();
        let err = assemble_transaction(
            &p,
            &tagged("03FEB 01FEB SHOP US USD 100.00 782.35"),
            &[tagged("*EXCHANGE RATE: 7.8235"), tagged("*EXCHANGE RATE: 7.9")],
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldExtractionFailure);
    }

    #[test]
    fn test_payment_classification() {
        let p = Patterns::new().unwrap();
        let tx = assemble_transaction(&p, &tagged("12FEB 12FEB PAID BY AUTOPAY 500.00CR"), &[], &ctx()).unwrap();
        assert_eq!(tx.kind, TransactionKind::Payment);
        assert_eq!(tx.money.signed(), dec!(-500.00));
    }
}
