//! Deterministic transaction classification for summary reconciliation.
//!
//! Each template carries an explicit table of payment descriptions. A credit
//! row whose description matches an entry is a bill payment; any other credit
//! is a refund; everything else is a purchase. The table is applied uniformly
//! and is the only place payment rows are recognized.

use crate::types::{StatementTemplate, TransactionKind};

/// Description prefixes of bill payments, shared by both HSBC HK templates.
const HSBC_HK_PAYMENTS: &[&str] = &[
    "PAID BY AUTOPAY",
    "PAYMENT - THANK YOU",
    "PPS PAYMENT",
    "PAYMENT RECEIVED",
];

pub fn payment_table(template: StatementTemplate) -> &'static [&'static str] {
    match template {
        StatementTemplate::SingleCurrency | StatementTemplate::DualCurrency => HSBC_HK_PAYMENTS,
    }
}

pub fn classify(template: StatementTemplate, description: &str, is_credit: bool) -> TransactionKind {
    if !is_credit {
        return TransactionKind::Purchase;
    }
    let desc = description.to_ascii_uppercase();
    if payment_table(template).iter().any(|p| desc.starts_with(p)) {
        TransactionKind::Payment
    } else {
        TransactionKind::Refund
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_rows() {
        let t = StatementTemplate::SingleCurrency;
        assert_eq!(classify(t, "PAID BY AUTOPAY", true), TransactionKind::Payment);
        assert_eq!(classify(t, "Payment - Thank You", true), TransactionKind::Payment);
        assert_eq!(classify(t, "PPS PAYMENT 1234", true), TransactionKind::Payment);
    }

    #[test]
    fn test_refund_and_purchase_rows() {
        let t = StatementTemplate::DualCurrency;
        assert_eq!(classify(t, "UNIQLO CENTRAL", true), TransactionKind::Refund);
        // Only credits can be payments.
        assert_eq!(classify(t, "PAID BY AUTOPAY", false), TransactionKind::Purchase);
        // Free text mentioning a payment is not enough.
        assert_eq!(classify(t, "REFUND OF PAYMENT RECEIVED", true), TransactionKind::Refund);
    }
}
