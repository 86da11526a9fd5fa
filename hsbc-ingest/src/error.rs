//! Engine error type.
//!
//! Every failure is fatal: a parse either yields a fully validated
//! [`Statement`](crate::Statement) or exactly one `ParseError`.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::normalize::Line;
use crate::segment::SegmentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A line did not fit any shape valid for the current segmenter state.
    StructuralMismatch,
    /// A recognized line shape whose sub-field (date, amount, number) is malformed.
    FieldExtractionFailure,
    /// Foreign currency without an exchange rate, or a rate without a foreign currency.
    IncompleteCrossCurrencyData,
    /// Recomputed totals disagree with the declared summary.
    SummaryMismatch,
    /// A payment-method-like or region/currency-like token outside the known vocabulary.
    UnknownTag,
    /// Foreign amount times exchange rate does not land on the posted amount.
    ConversionMismatch,
    /// A caller-supplied boilerplate pattern failed to compile.
    InvalidPattern,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StructuralMismatch => "StructuralMismatch",
            Self::FieldExtractionFailure => "FieldExtractionFailure",
            Self::IncompleteCrossCurrencyData => "IncompleteCrossCurrencyData",
            Self::SummaryMismatch => "SummaryMismatch",
            Self::UnknownTag => "UnknownTag",
            Self::ConversionMismatch => "ConversionMismatch",
            Self::InvalidPattern => "InvalidPattern",
        };
        f.write_str(name)
    }
}

/// Position and content of the offending logical line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRef {
    pub page: usize,
    pub line: usize,
    pub text: String,
}

impl From<&Line> for LineRef {
    fn from(line: &Line) -> Self {
        Self {
            page: line.page,
            line: line.number,
            text: line.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}{}", render_context(.line, .state))]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: Option<LineRef>,
    pub state: Option<SegmentState>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            state: None,
        }
    }

    /// Attach the offending line.
    pub fn at(mut self, line: &Line) -> Self {
        self.line = Some(LineRef::from(line));
        self
    }

    /// Attach the segmenter state the failure happened in.
    pub fn in_state(mut self, state: SegmentState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StructuralMismatch, message)
    }

    pub fn field(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldExtractionFailure, message)
    }

    pub fn cross_currency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompleteCrossCurrencyData, message)
    }

    pub fn summary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SummaryMismatch, message)
    }

    pub fn unknown_tag(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownTag, message)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConversionMismatch, message)
    }
}

fn render_context(line: &Option<LineRef>, state: &Option<SegmentState>) -> String {
    let mut out = String::new();
    if let Some(l) = line {
        out.push_str(&format!(" (page {} line {}: {:?})", l.page, l.line, l.text));
    }
    if let Some(s) = state {
        out.push_str(&format!(" [{s}]"));
    }
    out
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_line_and_state() {
        let line = Line {
            page: 2,
            number: 14,
            text: "15DEC 13DEC SHOP HK 12.0".to_string(),
        };
        let err = ParseError::field("malformed amount")
            .at(&line)
            .in_state(SegmentState::InTransactions);

        let rendered = err.to_string();
        assert!(rendered.starts_with("FieldExtractionFailure: malformed amount"));
        assert!(rendered.contains("page 2 line 14"));
        assert!(rendered.contains("SHOP HK 12.0"));
        assert!(rendered.ends_with("[IN_TRANSACTIONS]"));
    }

    #[test]
    fn test_serializes_kind_as_snake_case() {
        let err = ParseError::summary("credit total differs");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "summary_mismatch");
        assert!(json["line"].is_null());
    }
}
