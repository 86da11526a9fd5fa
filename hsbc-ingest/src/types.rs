use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Statement layout the document was printed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementTemplate {
    /// One account, balance printed next to the statement date.
    SingleCurrency,
    /// HKD and RMB sub-accounts, each with its own header and summary.
    DualCurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    ApplePay,
    UnionpayQr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Refund,
    Payment,
}

/// A fully validated statement. Only produced by a successful parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Statement {
    #[serde(rename = "statement_product")]
    pub product: String,
    pub template: StatementTemplate,
    pub statement_date: NaiveDate,
    pub sub_accounts: Vec<SubAccount>,
}

impl Statement {
    /// `(statement_date, statement_product, account_number)` per sub-account,
    /// the key downstream storage deduplicates uploads on.
    pub fn dedup_keys(&self) -> Vec<(NaiveDate, String, String)> {
        self.sub_accounts
            .iter()
            .map(|s| (self.statement_date, self.product.clone(), s.account_number.clone()))
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.sub_accounts
            .iter()
            .flat_map(|s| s.cards.iter())
            .map(|c| c.transactions.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SubAccount {
    pub account_number: String,
    /// `HKD` or `RMB`.
    #[serde(rename = "sub_account_currency")]
    pub account_currency: String,
    /// Currency totals are printed in: `HKD`, `CNY` or `RMB`.
    pub amount_currency: String,
    pub summary: Summary,
    pub cards: Vec<Card>,
}

impl SubAccount {
    /// ISO code transactions are compared against (`RMB` canonicalized to `CNY`).
    pub fn base_currency(&self) -> &str {
        base_currency(&self.amount_currency)
    }
}

pub(crate) fn base_currency(amount_currency: &str) -> &str {
    if amount_currency == "RMB" { "CNY" } else { amount_currency }
}

/// Declared figures from the document, plus the reconciled split that was
/// checked against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Summary {
    pub previous_balance: Decimal,
    pub statement_balance: Decimal,
    pub credit_payment: Option<Decimal>,
    pub purchases_and_instalments: Option<Decimal>,
    pub total_account_balance: Option<Decimal>,
    pub spend: Decimal,
    pub refund: Decimal,
    pub net_spend: Decimal,
    pub payment: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Card {
    pub card_number: String,
    pub cardholder_name: String,
    /// Per-card net total, when the statement prints one.
    pub subtotal: Option<Decimal>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Transaction {
    pub post_date: NaiveDate,
    pub transaction_date: NaiveDate,
    pub description: String,
    /// Unsigned, as printed.
    pub amount: Decimal,
    /// Negative for `CR` rows.
    pub signed_amount: Decimal,
    pub is_credit: bool,
    pub kind: TransactionKind,
    pub payment_method: Option<PaymentMethod>,
    pub region_code_alpha2: Option<String>,
    pub currency: String,
    pub currency_amount: Decimal,
    pub exchange_rate: Option<Decimal>,
    pub notes: Vec<String>,
}
