//! Section segmenter.
//!
//! A single pass over normalized lines driven by an explicit state machine.
//! Each state accepts a fixed set of line shapes; the first line that does not
//! fit the current state aborts the parse. The output is a tree of raw line
//! groups (statement header, sub-accounts, cards, summaries) tagged with their
//! shape, ready for field extraction.

use serde::Serialize;
use std::fmt;

use crate::error::{ParseError, Result};
use crate::extract::{AccountHeader, Patterns};
use crate::normalize::Line;
use crate::shape::{Shape, classify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentState {
    SeekStatementHeader,
    InSubaccountHeader,
    InCardHeader,
    InTransactions,
    InCardSubtotal,
    InSubaccountSummary,
    Done,
    Failed,
}

impl SegmentState {
    /// The section a line of this shape is read in.
    pub fn of_shape(shape: Shape) -> Self {
        match shape {
            Shape::ProductLabel | Shape::Product | Shape::StatementDate | Shape::StatementDateBalance => {
                Self::SeekStatementHeader
            }
            Shape::AccountHeaderDual | Shape::AccountNumber | Shape::AmountColumns | Shape::PreviousBalance => {
                Self::InSubaccountHeader
            }
            Shape::CardHeader => Self::InCardHeader,
            Shape::TransactionRow | Shape::ForeignAmount | Shape::ExchangeRate | Shape::PaymentTag | Shape::Note => {
                Self::InTransactions
            }
            Shape::CardSubtotal => Self::InCardSubtotal,
            Shape::StatementBalance
            | Shape::CreditPaymentSummary
            | Shape::PurchasesSummary
            | Shape::TotalBalanceSummary => Self::InSubaccountSummary,
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SeekStatementHeader => "SEEK_STATEMENT_HEADER",
            Self::InSubaccountHeader => "IN_SUBACCOUNT_HEADER",
            Self::InCardHeader => "IN_CARD_HEADER",
            Self::InTransactions => "IN_TRANSACTIONS",
            Self::InCardSubtotal => "IN_CARD_SUBTOTAL",
            Self::InSubaccountSummary => "IN_SUBACCOUNT_SUMMARY",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub shape: Shape,
    pub line: Line,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Product, statement date and statement-level balance lines, including
    /// repeats printed at the top of later pages.
    pub header: Vec<Tagged>,
    pub sub_accounts: Vec<SubAccountBlock>,
}

impl Document {
    fn tagged(&self) -> impl Iterator<Item = &Tagged> {
        let blocks = self.sub_accounts.iter().flat_map(|s| {
            let cards = s.cards.iter().flat_map(|c| c.header.iter().chain(&c.rows).chain(&c.subtotal));
            s.header.iter().chain(cards).chain(&s.summary)
        });
        self.header.iter().chain(blocks)
    }

    /// Attach the section of the offending line to an error raised after
    /// segmentation. Errors without a tagged line get `fallback`.
    pub fn locate(&self, err: ParseError, fallback: SegmentState) -> ParseError {
        if err.state.is_some() {
            return err;
        }
        let shape = err.line.as_ref().and_then(|at| {
            self.tagged()
                .find(|t| t.line.page == at.page && t.line.number == at.line)
                .map(|t| t.shape)
        });
        let state = shape.map_or(fallback, SegmentState::of_shape);
        err.in_state(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAccountBlock {
    /// Printed account number, or the card number when the statement has no
    /// `Account number` line.
    pub account_number: String,
    /// Sub-account currency from a dual-currency header.
    pub sub_currency: Option<String>,
    /// Account header (and its repeats), column headers and previous balance.
    pub header: Vec<Tagged>,
    pub cards: Vec<CardBlock>,
    pub summary: Vec<Tagged>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardBlock {
    pub card_number: String,
    /// Card header line and its repeats after page breaks.
    pub header: Vec<Tagged>,
    /// Transaction rows with their continuation rows, in document order.
    pub rows: Vec<Tagged>,
    pub subtotal: Option<Tagged>,
}

pub struct Segmenter<'a> {
    patterns: &'a Patterns,
    state: SegmentState,
    expecting_product: bool,
    /// Column headers seen before the sub-account they belong to.
    pending: Vec<Tagged>,
    doc: Document,
}

impl<'a> Segmenter<'a> {
    pub fn new(patterns: &'a Patterns) -> Self {
        Self {
            patterns,
            state: SegmentState::SeekStatementHeader,
            expecting_product: false,
            pending: Vec::new(),
            doc: Document::default(),
        }
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// Segment a whole document.
    pub fn run(mut self, lines: Vec<Line>) -> Result<Document> {
        for line in lines {
            let before = self.state;
            if let Err(err) = self.step(line) {
                self.state = SegmentState::Failed;
                return Err(if err.state.is_some() { err } else { err.in_state(before) });
            }
        }
        self.finish()
    }

    pub fn step(&mut self, line: Line) -> Result<()> {
        use SegmentState::*;

        if self.expecting_product {
            self.expecting_product = false;
            self.doc.header.push(Tagged { shape: Shape::Product, line });
            return Ok(());
        }

        let shape = classify(&line.text).ok_or_else(|| {
            ParseError::structural("line does not match any recognized shape").at(&line)
        })?;

        match (self.state, shape) {
            (SeekStatementHeader, Shape::ProductLabel) => {
                self.expecting_product = true;
                self.doc.header.push(Tagged { shape, line });
            }
            (Done | Failed, _) => {
                return Err(ParseError::structural("content after end of statement").at(&line));
            }
            // Printed at the top of every page.
            (_, Shape::StatementDate | Shape::StatementDateBalance) => {
                self.doc.header.push(Tagged { shape, line });
            }
            // Single-currency statements may go straight from the dated
            // balance to the columns and the card, keyed on the card number.
            (SeekStatementHeader, Shape::AmountColumns) if self.has_dated_balance() => {
                self.pending.push(Tagged { shape, line });
            }
            (SeekStatementHeader, Shape::CardHeader) if self.has_dated_balance() => {
                let card = self.patterns.card_header(&line)?;
                self.doc.sub_accounts.push(SubAccountBlock {
                    account_number: card.card_number,
                    sub_currency: None,
                    header: std::mem::take(&mut self.pending),
                    cards: Vec::new(),
                    summary: Vec::new(),
                });
                self.state = InSubaccountHeader;
                self.open_card(line)?;
            }
            (SeekStatementHeader | InSubaccountSummary, s) if s.is_account_header() => {
                let header = self.patterns.account_header(shape, &line)?;
                let repeat = self.state == InSubaccountSummary
                    && self.doc.sub_accounts.last().is_some_and(|sub| {
                        sub.account_number == header.account_number && sub.sub_currency == header.sub_currency
                    });
                if repeat {
                    // Summary continued on the next page.
                    self.current_sub_account(&line)?.header.push(Tagged { shape, line });
                } else {
                    self.open_sub_account(header, shape, line)?;
                    self.state = InSubaccountHeader;
                }
            }
            (InSubaccountHeader | InCardHeader | InTransactions | InCardSubtotal, s)
                if s.is_account_header() =>
            {
                // Only the current sub-account may repeat before its summary.
                let header = self.patterns.account_header(shape, &line)?;
                let current = self.current_sub_account(&line)?;
                if header.account_number != current.account_number
                    || header.sub_currency != current.sub_currency
                {
                    return Err(ParseError::structural(format!(
                        "sub-account {} starts before sub-account {} has a summary",
                        header.account_number, current.account_number
                    ))
                    .at(&line));
                }
                current.header.push(Tagged { shape, line });
            }
            (
                InSubaccountHeader | InCardHeader | InTransactions | InCardSubtotal | InSubaccountSummary,
                Shape::AmountColumns,
            )
            | (InSubaccountHeader | InCardHeader, Shape::PreviousBalance) => {
                self.current_sub_account(&line)?.header.push(Tagged { shape, line });
            }
            (InSubaccountHeader | InCardHeader | InTransactions | InCardSubtotal, Shape::CardHeader) => {
                self.open_card(line)?;
            }
            (InCardHeader | InTransactions, Shape::TransactionRow) => {
                self.current_card(&line)?.rows.push(Tagged { shape, line });
                self.state = InTransactions;
            }
            (InTransactions, s) if s.is_continuation() => {
                self.current_card(&line)?.rows.push(Tagged { shape, line });
            }
            (InCardHeader | InTransactions, Shape::CardSubtotal) => {
                let card = self.current_card(&line)?;
                card.subtotal = Some(Tagged { shape, line });
                self.state = InCardSubtotal;
            }
            (InSubaccountHeader | InCardHeader | InTransactions | InCardSubtotal | InSubaccountSummary, s)
                if s.is_summary() =>
            {
                self.current_sub_account(&line)?.summary.push(Tagged { shape, line });
                self.state = InSubaccountSummary;
            }
            (state, shape) => {
                return Err(ParseError::structural(format!(
                    "{shape:?} line is not valid in state {state}"
                ))
                .at(&line));
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Document> {
        if self.expecting_product {
            return Err(ParseError::structural("document ended before the product line")
                .in_state(self.state));
        }
        match self.state {
            SegmentState::InSubaccountSummary => {
                self.state = SegmentState::Done;
                Ok(self.doc)
            }
            SegmentState::SeekStatementHeader => Err(ParseError::structural(
                "no sub-account header found",
            )
            .in_state(self.state)),
            state => Err(ParseError::structural(
                "document ended before the sub-account summary",
            )
            .in_state(state)),
        }
    }

    fn has_dated_balance(&self) -> bool {
        self.doc.header.iter().any(|t| t.shape == Shape::StatementDateBalance)
    }

    fn open_sub_account(&mut self, header: AccountHeader, shape: Shape, line: Line) -> Result<()> {
        // Dual-currency statements print the same account number once per
        // sub-account currency.
        if self
            .doc
            .sub_accounts
            .iter()
            .any(|s| s.account_number == header.account_number && s.sub_currency == header.sub_currency)
        {
            return Err(ParseError::structural(format!(
                "sub-account {} appears twice",
                header.account_number
            ))
            .at(&line));
        }
        let mut lines = vec![Tagged { shape, line }];
        lines.append(&mut self.pending);
        self.doc.sub_accounts.push(SubAccountBlock {
            account_number: header.account_number,
            sub_currency: header.sub_currency,
            header: lines,
            cards: Vec::new(),
            summary: Vec::new(),
        });
        Ok(())
    }

    fn open_card(&mut self, line: Line) -> Result<()> {
        let header = self.patterns.card_header(&line)?;
        let state = self.state;
        let sub = self.current_sub_account(&line)?;

        let resuming = matches!(state, SegmentState::InTransactions | SegmentState::InCardHeader)
            && sub.cards.last().is_some_and(|c| c.card_number == header.card_number);
        if resuming {
            if let Some(card) = sub.cards.last_mut() {
                card.header.push(Tagged { shape: Shape::CardHeader, line });
            }
            return Ok(());
        }

        if sub.cards.iter().any(|c| c.card_number == header.card_number) {
            return Err(ParseError::structural(format!(
                "card {} reopened after its block was closed",
                header.card_number
            ))
            .at(&line));
        }
        sub.cards.push(CardBlock {
            card_number: header.card_number,
            header: vec![Tagged { shape: Shape::CardHeader, line }],
            rows: Vec::new(),
            subtotal: None,
        });
        self.state = SegmentState::InCardHeader;
        Ok(())
    }

    fn current_sub_account(&mut self, line: &Line) -> Result<&mut SubAccountBlock> {
        self.doc
            .sub_accounts
            .last_mut()
            .ok_or_else(|| ParseError::structural("line outside any sub-account").at(line))
    }

    fn current_card(&mut self, line: &Line) -> Result<&mut CardBlock> {
        self.current_sub_account(line)?
            .cards
            .last_mut()
            .ok_or_else(|| ParseError::structural("line outside any card block").at(line))
    }
}
