//! hsbc-ingest: HSBC HK credit-card eStatement parsing.
//!
//! Takes per-page text already extracted from the PDF and returns either a
//! fully cross-validated [`Statement`] or a single [`ParseError`]. There is no
//! partial output and no shared state between parses.

pub mod assemble;
pub mod classify;
pub mod error;
pub mod extract;
pub mod money;
pub mod normalize;
pub mod segment;
pub mod shape;
pub mod statement;
pub mod types;
pub mod validate;
pub mod vocab;

pub use error::{ErrorKind, LineRef, ParseError, Result};
pub use normalize::Line;
pub use segment::SegmentState;
pub use types::{
    Card, PaymentMethod, Statement, StatementTemplate, SubAccount, Summary, Transaction, TransactionKind,
};

use extract::Patterns;
use normalize::Normalizer;
use segment::Segmenter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Extra regexes for page furniture to drop before segmentation.
    pub extra_boilerplate: Vec<String>,
}

/// A reusable parser. Holds only compiled patterns; every call is independent.
pub struct Parser {
    normalizer: Normalizer,
    patterns: Patterns,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Result<Self> {
        let normalizer = Normalizer::new(&options.extra_boilerplate)?;
        let patterns = Patterns::new()
            .map_err(|e| ParseError::new(ErrorKind::InvalidPattern, format!("built-in pattern: {e}")))?;
        Ok(Self { normalizer, patterns })
    }

    /// Normalized logical lines, for diagnostics.
    pub fn lines(&self, pages: &[Vec<String>]) -> Vec<Line> {
        self.normalizer.normalize(pages)
    }

    pub fn parse_pages(&self, pages: &[Vec<String>]) -> Result<Statement> {
        let lines = self.normalizer.normalize(pages);
        let doc = Segmenter::new(&self.patterns).run(lines)?;

        let header = assemble::assemble_header(&self.patterns, &doc)
            .map_err(|e| doc.locate(e, SegmentState::SeekStatementHeader))?;
        let mut validated = Vec::with_capacity(doc.sub_accounts.len());
        for block in &doc.sub_accounts {
            let checked = assemble::assemble_sub_account(&self.patterns, block, &header).and_then(|draft| {
                let totals = validate::validate_sub_account(&draft)?;
                Ok((draft, totals))
            });
            validated.push(checked.map_err(|e| doc.locate(e, SegmentState::InSubaccountSummary))?);
        }
        Ok(statement::build(header, validated))
    }

    /// Parse pre-extracted text with pages separated by form feeds.
    pub fn parse_text(&self, text: &str) -> Result<Statement> {
        self.parse_pages(&normalize::split_pages(text))
    }
}

pub fn parse_pages(pages: &[Vec<String>]) -> Result<Statement> {
    Parser::new(ParseOptions::default())?.parse_pages(pages)
}

pub fn parse_text(text: &str) -> Result<Statement> {
    Parser::new(ParseOptions::default())?.parse_text(text)
}
