//! Cross-validation of assembled sub-accounts against their declared figures.
//!
//! All comparisons are exact decimal equality, except the foreign conversion
//! check which allows the bank's rounding slack.

use rust_decimal::Decimal;

use crate::assemble::{Declared, DraftCard, DraftSubAccount, DraftTransaction};
use crate::error::{ParseError, Result};
use crate::money;
use crate::normalize::Line;
use crate::types::TransactionKind;

/// How far `currency_amount x rate` may land from the posted amount.
pub const CONVERSION_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Figures recomputed from a sub-account's transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub spend: Decimal,
    pub refund: Decimal,
    pub net_spend: Decimal,
    pub payment: Decimal,
    /// Previous balance plus spend minus refund and payment; set once validated.
    pub closing: Decimal,
}

impl Totals {
    pub fn from_transactions<'a>(txs: impl IntoIterator<Item = &'a DraftTransaction>) -> Result<Self> {
        let mut t = Totals::default();
        for tx in txs {
            let signed = tx.money.signed();
            let (slot, value) = match tx.kind {
                TransactionKind::Payment => (&mut t.payment, tx.money.amount),
                _ if signed > Decimal::ZERO => (&mut t.spend, signed),
                _ if signed < Decimal::ZERO => (&mut t.refund, signed.abs()),
                _ => continue,
            };
            *slot = slot.checked_add(value).ok_or_else(|| overflow(&tx.line))?;
        }
        t.net_spend = t.spend - t.refund;
        Ok(t)
    }

    /// Closing balance implied by an opening balance and these totals.
    pub fn closing_balance(&self, previous: &Declared) -> Result<Decimal> {
        previous
            .value
            .checked_add(self.spend)
            .and_then(|v| v.checked_sub(self.refund))
            .and_then(|v| v.checked_sub(self.payment))
            .ok_or_else(|| overflow(&previous.line))
    }
}

fn overflow(line: &Line) -> ParseError {
    ParseError::field("amount overflows decimal arithmetic").at(line)
}

/// Check every transaction, card and summary figure of one sub-account.
pub fn validate_sub_account(sub: &DraftSubAccount) -> Result<Totals> {
    for card in &sub.cards {
        for tx in &card.transactions {
            check_conversion(tx)?;
        }
        check_subtotal(card)?;
    }

    let previous = sub.previous_balance.as_ref().ok_or_else(|| {
        ParseError::structural(format!("sub-account {} has no PREVIOUS BALANCE", sub.account_number))
            .at(&sub.line)
    })?;
    let anchors: Vec<(&str, &Declared)> = [
        ("statement balance", sub.header_balance.as_ref()),
        ("STATEMENT BALANCE", sub.statement_balance.as_ref()),
        ("TOTAL ACCOUNT BALANCE", sub.total_account_balance.as_ref()),
    ]
    .into_iter()
    .filter_map(|(label, d)| d.map(|d| (label, d)))
    .collect();
    if anchors.is_empty() {
        return Err(ParseError::structural(format!(
            "sub-account {} declares no closing balance",
            sub.account_number
        ))
        .at(&sub.line));
    }

    let mut totals = Totals::from_transactions(sub.cards.iter().flat_map(|c| c.transactions.iter()))?;

    check_declared(sub, "PURCHASES AND INSTALMENTS", sub.purchases_and_instalments.as_ref(), totals.spend)?;
    check_declared(
        sub,
        "CREDIT/PAYMENT",
        sub.credit_payment.as_ref(),
        totals.refund.checked_add(totals.payment).ok_or_else(|| overflow(&sub.line))?,
    )?;

    let closing = totals.closing_balance(previous)?;
    for (label, declared) in anchors {
        if declared.value != closing {
            return Err(ParseError::summary(format!(
                "declared {label} {} but previous balance {} + spend {} - refund {} - payment {} = {closing}",
                declared.value, previous.value, totals.spend, totals.refund, totals.payment
            ))
            .at(&declared.line));
        }
    }

    totals.closing = closing;
    Ok(totals)
}

/// An absent summary line means its recomputed figure must be zero.
fn check_declared(sub: &DraftSubAccount, label: &str, declared: Option<&Declared>, recomputed: Decimal) -> Result<()> {
    match declared {
        Some(d) if d.value != recomputed => Err(ParseError::summary(format!(
            "declared {label} {} but transactions sum to {recomputed}",
            d.value
        ))
        .at(&d.line)),
        None if !recomputed.is_zero() => Err(ParseError::summary(format!(
            "no {label} line for sub-account {} but transactions sum to {recomputed}",
            sub.account_number
        ))
        .at(&sub.line)),
        _ => Ok(()),
    }
}

fn check_subtotal(card: &DraftCard) -> Result<()> {
    let Some((declared, line)) = &card.subtotal else {
        return Ok(());
    };
    let recomputed = card
        .transactions
        .iter()
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.money.signed()).ok_or_else(|| overflow(&t.line)))?;
    if declared.signed() != recomputed {
        return Err(ParseError::summary(format!(
            "card {} subtotal {} but its transactions sum to {recomputed}",
            card.card_number,
            declared.signed()
        ))
        .at(line));
    }
    Ok(())
}

fn check_conversion(tx: &DraftTransaction) -> Result<()> {
    let Some(rate) = tx.exchange_rate else {
        return Ok(());
    };
    let product = tx.currency_amount.checked_mul(rate).ok_or_else(|| overflow(&tx.line))?;
    let converted = money::round_cents(product);
    if (converted - tx.money.amount).abs() > CONVERSION_TOLERANCE {
        return Err(ParseError::conversion(format!(
            "{} {} at {rate} is {converted}, posted {}",
            tx.currency, tx.currency_amount, tx.money.amount
        ))
        .at(&tx.line));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::money::Money;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn line(text: &str) -> Line {
        Line {
            page: 1,
            number: 1,
            text: text.to_string(),
        }
    }

    fn tx(amount: Decimal, is_credit: bool, kind: TransactionKind) -> DraftTransaction {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        DraftTransaction {
            line: line("row"),
            post_date: date,
            transaction_date: date,
            description: "SHOP".to_string(),
            money: Money { amount, is_credit },
            kind,
            payment_method: None,
            region_code_alpha2: None,
            currency: "HKD".to_string(),
            currency_amount: amount,
            exchange_rate: None,
            notes: Vec::new(),
        }
    }

    fn declared(value: Decimal) -> Option<Declared> {
        Some(Declared {
            value,
            line: line("summary"),
        })
    }

    fn sub(transactions: Vec<DraftTransaction>) -> DraftSubAccount {
        DraftSubAccount {
            line: line("Account number 4567 1234 5678 9012"),
            account_number: "4567123456789012".to_string(),
            account_currency: "HKD".to_string(),
            amount_currency: "HKD".to_string(),
            header_balance: declared(dec!(1530.60)),
            previous_balance: declared(dec!(2000.00)),
            statement_balance: declared(dec!(1530.60)),
            credit_payment: declared(dec!(2000.00)),
            purchases_and_instalments: declared(dec!(1530.60)),
            total_account_balance: declared(dec!(1530.60)),
            cards: vec![DraftCard {
                line: line("card"),
                card_number: "4567123456789012".to_string(),
                cardholder_name: "CHAN TAI MAN".to_string(),
                subtotal: None,
                transactions,
            }],
        }
    }

    fn scenario_a() -> Vec<DraftTransaction> {
        vec![
            tx(dec!(230.50), false, TransactionKind::Purchase),
            tx(dec!(2000.00), true, TransactionKind::Payment),
            tx(dec!(1050.00), false, TransactionKind::Purchase),
            tx(dec!(250.10), false, TransactionKind::Purchase),
        ]
    }

    #[test]
    fn test_totals_split_payments_from_refunds() {
        let t = Totals::from_transactions(&[
            tx(dec!(100.00), false, TransactionKind::Purchase),
            tx(dec!(12.08), true, TransactionKind::Refund),
            tx(dec!(500.00), true, TransactionKind::Payment),
            tx(dec!(0.00), true, TransactionKind::Refund),
        ])
        .unwrap();
        assert_eq!(t.spend, dec!(100.00));
        assert_eq!(t.refund, dec!(12.08));
        assert_eq!(t.net_spend, dec!(87.92));
        assert_eq!(t.payment, dec!(500.00));
    }

    #[test]
    fn test_balanced_sub_account_passes() {
        let totals = validate_sub_account(&sub(scenario_a())).unwrap();
        assert_eq!(totals.net_spend, dec!(1530.60));
        assert_eq!(totals.closing, dec!(1530.60));
        assert_eq!(totals.payment, dec!(2000.00));
    }

    #[test]
    fn test_one_cent_off_is_summary_mismatch() {
        let mut s = sub(scenario_a());
        s.statement_balance = declared(dec!(1530.61));
        let err = validate_sub_account(&s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SummaryMismatch);

        let mut s = sub(scenario_a());
        s.purchases_and_instalments = declared(dec!(1530.59));
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::SummaryMismatch);
    }

    #[test]
    fn test_absent_summary_line_requires_zero() {
        let mut s = sub(scenario_a());
        s.credit_payment = None;
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::SummaryMismatch);
    }

    #[test]
    fn test_previous_balance_and_anchor_required() {
        let mut s = sub(scenario_a());
        s.previous_balance = None;
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::StructuralMismatch);

        let mut s = sub(scenario_a());
        s.header_balance = None;
        s.statement_balance = None;
        s.total_account_balance = None;
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_card_subtotal_must_match() {
        // 230.50 - 2000.00 + 1050.00 + 250.10
        let mut s = sub(scenario_a());
        s.cards[0].subtotal = Some((
            Money {
                amount: dec!(469.40),
                is_credit: true,
            },
            line("SUBTOTAL 469.40CR"),
        ));
        assert!(validate_sub_account(&s).is_ok());

        s.cards[0].subtotal = Some((
            Money {
                amount: dec!(469.40),
                is_credit: false,
            },
            line("SUBTOTAL 469.40"),
        ));
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::SummaryMismatch);
    }

    #[test]
    fn test_conversion_tolerance() {
        let mut t = tx(dec!(782.35), false, TransactionKind::Purchase);
        t.currency = "USD".to_string();
        t.currency_amount = dec!(100.00);
        t.exchange_rate = Some(dec!(7.8235));
        assert!(check_conversion(&t).is_ok());

        t.exchange_rate = Some(dec!(7.8200));
        assert!(check_conversion(&t).is_ok());

        t.exchange_rate = Some(dec!(7.8100));
        assert_eq!(check_conversion(&t).unwrap_err().kind, ErrorKind::ConversionMismatch);
    }

    #[test]
    fn test_overflowing_sum_is_field_failure() {
        let err = Totals::from_transactions(&[
            tx(Decimal::MAX, false, TransactionKind::Purchase),
            tx(dec!(1.00), false, TransactionKind::Purchase),
        ])
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldExtractionFailure);

        let mut s = sub(vec![tx(Decimal::MAX, false, TransactionKind::Purchase)]);
        s.cards[0].transactions.push(tx(dec!(1.00), false, TransactionKind::Purchase));
        s.cards[0].subtotal = Some((
            Money {
                amount: dec!(1.00),
                is_credit: false,
            },
            line("SUBTOTAL 1.00"),
        ));
        assert_eq!(validate_sub_account(&s).unwrap_err().kind, ErrorKind::FieldExtractionFailure);
    }

    #[test]
    fn test_overflowing_closing_balance_is_field_failure() {
        let mut s = sub(vec![tx(Decimal::MAX, false, TransactionKind::Purchase)]);
        s.previous_balance = declared(dec!(1.00));
        s.purchases_and_instalments = declared(Decimal::MAX);
        s.credit_payment = None;
        let err = validate_sub_account(&s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldExtractionFailure);
        assert_eq!(err.line.unwrap().text, "summary");
    }

    #[test]
    fn test_overflowing_conversion_is_field_failure() {
        let mut t = tx(dec!(1.00), false, TransactionKind::Purchase);
        t.currency = "USD".to_string();
        t.currency_amount = Decimal::MAX;
        t.exchange_rate = Some(dec!(7.8235));
        let err = check_conversion(&t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldExtractionFailure);
        assert_eq!(err.line.unwrap().text, "row");
    }
}
