//! Promotion of validated drafts into the public result types.

use crate::assemble::{DraftCard, DraftSubAccount, DraftTransaction, StatementHeader};
use crate::types::{Card, Statement, SubAccount, Summary, Transaction};
use crate::validate::Totals;

/// Build the final statement. Callers pass only drafts that passed validation.
pub fn build(header: StatementHeader, validated: Vec<(DraftSubAccount, Totals)>) -> Statement {
    Statement {
        product: header.product,
        template: header.template,
        statement_date: header.statement_date,
        sub_accounts: validated
            .into_iter()
            .map(|(sub, totals)| sub_account(sub, totals))
            .collect(),
    }
}

fn sub_account(sub: DraftSubAccount, totals: Totals) -> SubAccount {
    let previous_balance = sub.previous_balance.map(|d| d.value).unwrap_or_default();
    SubAccount {
        account_number: sub.account_number,
        account_currency: sub.account_currency,
        amount_currency: sub.amount_currency,
        summary: Summary {
            previous_balance,
            statement_balance: totals.closing,
            credit_payment: sub.credit_payment.map(|d| d.value),
            purchases_and_instalments: sub.purchases_and_instalments.map(|d| d.value),
            total_account_balance: sub.total_account_balance.map(|d| d.value),
            spend: totals.spend,
            refund: totals.refund,
            net_spend: totals.net_spend,
            payment: totals.payment,
        },
        cards: sub.cards.into_iter().map(card).collect(),
    }
}

fn card(card: DraftCard) -> Card {
    Card {
        card_number: card.card_number,
        cardholder_name: card.cardholder_name,
        subtotal: card.subtotal.map(|(m, _)| m.signed()),
        transactions: card.transactions.into_iter().map(transaction).collect(),
    }
}

fn transaction(tx: DraftTransaction) -> Transaction {
    Transaction {
        post_date: tx.post_date,
        transaction_date: tx.transaction_date,
        description: tx.description,
        amount: tx.money.amount,
        signed_amount: tx.money.signed(),
        is_credit: tx.money.is_credit,
        kind: tx.kind,
        payment_method: tx.payment_method,
        region_code_alpha2: tx.region_code_alpha2,
        currency: tx.currency,
        currency_amount: tx.currency_amount,
        exchange_rate: tx.exchange_rate,
        notes: tx.notes,
    }
}
