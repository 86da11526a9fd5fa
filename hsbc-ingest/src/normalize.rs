//! Text normalizer: raw per-page lines in, one flat sequence of logical lines out.
//!
//! Pure structural cleanup. Whitespace is collapsed, known page furniture is
//! dropped through an explicit deny set, and a transaction row whose amount
//! wrapped onto the next physical line is joined back. Anything not on the deny
//! set passes through untouched so the segmenter can reject it.

use regex::Regex;

use crate::error::{ErrorKind, ParseError, Result};
use crate::shape::{Shape, classify};

/// A normalized logical line with its position in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based page number.
    pub page: usize,
    /// 1-based physical line number within the page (first line of a joined row).
    pub number: usize,
    pub text: String,
}

const BOILERPLATE: &[&str] = &[
    r"(?i)^page \d+( of \d+)?$",
    r"^\d+ ?/ ?\d+$",
    r"(?i)^the hongkong and shanghai banking corporation limited\b",
    r"(?i)^www\.hsbc\.com\.hk\b",
    r"(?i)^\(?(to be )?continued\)?$",
    r"(?i)^\(?cont'?d\)?$",
];

pub struct Normalizer {
    deny: Vec<Regex>,
}

impl Normalizer {
    /// Built-in deny set plus caller-supplied patterns.
    pub fn new(extra_boilerplate: &[String]) -> Result<Self> {
        let mut deny = Vec::with_capacity(BOILERPLATE.len() + extra_boilerplate.len());
        for pattern in BOILERPLATE.iter().copied().chain(extra_boilerplate.iter().map(String::as_str)) {
            let re = Regex::new(pattern).map_err(|e| {
                ParseError::new(
                    ErrorKind::InvalidPattern,
                    format!("boilerplate pattern {pattern:?} does not compile: {e}"),
                )
            })?;
            deny.push(re);
        }
        Ok(Self { deny })
    }

    pub fn normalize(&self, pages: &[Vec<String>]) -> Vec<Line> {
        let mut out: Vec<Line> = Vec::new();

        for (page_idx, page) in pages.iter().enumerate() {
            // Rows never wrap across a page break.
            let mut open_row = false;

            for (line_idx, raw) in page.iter().enumerate() {
                let text = squeeze_ws(raw);
                if text.is_empty() || self.is_boilerplate(&text) {
                    continue;
                }

                if open_row && is_wrapped_tail(&text) {
                    if let Some(prev) = out.last_mut() {
                        prev.text.push(' ');
                        prev.text.push_str(&text);
                    }
                    open_row = false;
                    continue;
                }

                open_row = is_open_row(&text);
                out.push(Line {
                    page: page_idx + 1,
                    number: line_idx + 1,
                    text,
                });
            }
        }

        out
    }

    fn is_boilerplate(&self, text: &str) -> bool {
        self.deny.iter().any(|re| re.is_match(text))
    }
}

/// Normalize with the built-in deny set only.
pub fn normalize_pages(pages: &[Vec<String>]) -> Result<Vec<Line>> {
    Ok(Normalizer::new(&[])?.normalize(pages))
}

/// Split extracted text into pages on form feed, then into lines.
pub fn split_pages(text: &str) -> Vec<Vec<String>> {
    text.split('\x0c')
        .map(|page| page.lines().map(str::to_string).collect())
        .collect()
}

pub fn squeeze_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `15DEC` at the start of a line, followed by a space or end of line.
pub fn starts_with_date_token(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() >= 5
        && b[0].is_ascii_digit()
        && b[1].is_ascii_digit()
        && b[2..5].iter().all(u8::is_ascii_uppercase)
        && (b.len() == 5 || b[5] == b' ')
}

/// A `DDMON DDMON ...` row that has not reached its amount yet.
fn is_open_row(text: &str) -> bool {
    if !starts_with_date_token(text) || text.len() < 12 || !starts_with_date_token(&text[6..]) {
        return false;
    }
    let last = text.rsplit(' ').next().unwrap_or("");
    let last = last.strip_suffix("CR").unwrap_or(last);
    crate::money::parse_plain_amount(last).is_none()
}

/// The rest of a wrapped row: plain text or a `CCY amount` tail. Dated rows
/// and keyword lines always start a logical line of their own.
fn is_wrapped_tail(text: &str) -> bool {
    !starts_with_date_token(text) && matches!(classify(text), None | Some(Shape::ForeignAmount))
}
