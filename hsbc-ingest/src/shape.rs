//! Line shapes: the closed set of line kinds the template prints.
//!
//! Classification only looks at a line's leading keyword or token layout. A
//! line that starts like a shape but has a malformed body is still classified
//! as that shape, so the extractor reports it as a field failure rather than
//! a structural one.

use serde::Serialize;

use crate::normalize::starts_with_date_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    ProductLabel,
    /// Assigned by the segmenter to the line after `ProductLabel`; never returned by [`classify`].
    Product,
    StatementDate,
    StatementDateBalance,
    AccountHeaderDual,
    AccountNumber,
    AmountColumns,
    CardHeader,
    PreviousBalance,
    TransactionRow,
    ForeignAmount,
    ExchangeRate,
    PaymentTag,
    Note,
    CardSubtotal,
    StatementBalance,
    CreditPaymentSummary,
    PurchasesSummary,
    TotalBalanceSummary,
}

impl Shape {
    /// Continuation rows attach to the preceding transaction row.
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            Self::ForeignAmount | Self::ExchangeRate | Self::PaymentTag | Self::Note
        )
    }

    pub fn is_summary(self) -> bool {
        matches!(
            self,
            Self::StatementBalance
                | Self::CreditPaymentSummary
                | Self::PurchasesSummary
                | Self::TotalBalanceSummary
        )
    }

    pub fn is_account_header(self) -> bool {
        matches!(self, Self::AccountHeaderDual | Self::AccountNumber)
    }
}

pub fn classify(text: &str) -> Option<Shape> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if compact == "CARDTYPE" || compact == "CARDTYPECREDITLIMIT" {
        return Some(Shape::ProductLabel);
    }
    if compact.starts_with("STATEMENTDATESTATEMENTBALANCE") {
        return Some(Shape::StatementDateBalance);
    }
    if compact.starts_with("STATEMENTDATE") {
        return Some(Shape::StatementDate);
    }
    if compact.starts_with("ACCOUNTNUMBER") {
        return Some(if compact.contains("SUB-ACCOUNT") {
            Shape::AccountHeaderDual
        } else {
            Shape::AccountNumber
        });
    }
    if compact.starts_with("POSTDATE") {
        return Some(Shape::AmountColumns);
    }
    if compact.starts_with("PREVIOUSBALANCE") {
        return Some(Shape::PreviousBalance);
    }
    if compact.starts_with("STATEMENTBALANCE") {
        return Some(Shape::StatementBalance);
    }
    if compact.starts_with("CREDIT/PAYMENT") {
        return Some(Shape::CreditPaymentSummary);
    }
    if compact.starts_with("PURCHASESANDINSTALMENTS") {
        return Some(Shape::PurchasesSummary);
    }
    if compact.starts_with("TOTALACCOUNTBALANCE") {
        return Some(Shape::TotalBalanceSummary);
    }
    if compact.starts_with("SUBTOTAL") || compact.starts_with("SUB-TOTAL") {
        return Some(Shape::CardSubtotal);
    }
    if compact.starts_with("*EXCHANGERATE") {
        return Some(Shape::ExchangeRate);
    }
    if text.starts_with('*') {
        return Some(Shape::Note);
    }
    if starts_with_date_token(text) {
        return Some(Shape::TransactionRow);
    }
    if starts_with_card_number(text) {
        return Some(Shape::CardHeader);
    }
    if starts_with_currency_amount(text) {
        return Some(Shape::ForeignAmount);
    }
    if looks_like_payment_tag(text) {
        return Some(Shape::PaymentTag);
    }
    None
}

/// `dddd dddd dddd dddd ` followed by more text.
fn starts_with_card_number(text: &str) -> bool {
    let b = text.as_bytes();
    if b.len() < 21 {
        return false;
    }
    (0..19).all(|i| if i % 5 == 4 { b[i] == b' ' } else { b[i].is_ascii_digit() }) && b[19] == b' '
}

/// `USD 12.34 ...`
fn starts_with_currency_amount(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() >= 5 && b[..3].iter().all(u8::is_ascii_uppercase) && b[3] == b' ' && b[4].is_ascii_digit()
}

/// Uppercase tag line mentioning a wallet or QR scheme.
fn looks_like_payment_tag(text: &str) -> bool {
    let tag_chars = text
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '-' | ':'));
    tag_chars && (text.contains("PAY") || text.ends_with(" QR") || text == "QR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_shapes_ignore_case_and_spacing() {
        assert_eq!(classify("CARD TYPE"), Some(Shape::ProductLabel));
        assert_eq!(classify("Card type Credit limit"), Some(Shape::ProductLabel));
        assert_eq!(
            classify("Statement date Statement balance 12 JAN 2026 HKD 1,530.60"),
            Some(Shape::StatementDateBalance)
        );
        assert_eq!(classify("Statementdate 12 JAN 2026"), Some(Shape::StatementDate));
        assert_eq!(
            classify("Account number 6250 1111 2222 3333 HKD Sub-account Statement balance HKD 1.00"),
            Some(Shape::AccountHeaderDual)
        );
        assert_eq!(
            classify("Account number 4567 1234 5678 9012"),
            Some(Shape::AccountNumber)
        );
        assert_eq!(
            classify("Post date Trans date Description Amount (HKD)"),
            Some(Shape::AmountColumns)
        );
    }

    #[test]
    fn test_body_shapes() {
        assert_eq!(classify("4567 1234 5678 9012 CHAN TAI MAN"), Some(Shape::CardHeader));
        assert_eq!(classify("15DEC 13DEC PARKNSHOP HK 230.50"), Some(Shape::TransactionRow));
        assert_eq!(classify("15DEC garbage"), Some(Shape::TransactionRow));
        assert_eq!(classify("USD 12.34 @ 7.8"), Some(Shape::ForeignAmount));
        assert_eq!(classify("*EXCHANGE RATE: 7.8235"), Some(Shape::ExchangeRate));
        assert_eq!(classify("*FOREIGN TRANSACTION FEE WAIVED"), Some(Shape::Note));
        assert_eq!(classify("APPLE PAY-MOBILE:4321"), Some(Shape::PaymentTag));
        assert_eq!(classify("GOOGLE PAY"), Some(Shape::PaymentTag));
        assert_eq!(classify("UNIONPAY QR"), Some(Shape::PaymentTag));
        assert_eq!(classify("SUBTOTAL 500.00"), Some(Shape::CardSubtotal));
        assert_eq!(classify("CREDIT/PAYMENT : 0.00"), Some(Shape::CreditPaymentSummary));
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(classify("Mr CHAN TAI MAN"), None);
        assert_eq!(classify("FLAT 12A, 3/F"), None);
        assert_eq!(classify("4567 1234"), None);
    }
}
