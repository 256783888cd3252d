use thiserror::Error;

use crate::totals::DocumentKind;

pub type PricingResult<T> = Result<T, PricingError>;

/// Pricing failures. All of them are caller-correctable input problems.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// A line item is malformed. `line` is the zero-based row index when the
    /// item was priced as part of a document.
    #[error("invalid line item{}: {reason}", line_label(.line))]
    InvalidLineItem { line: Option<usize>, reason: String },

    #[error("{0} requires at least one line item")]
    EmptyDocument(DocumentKind),

    /// Paid or credited amount is unusable (negative, overflow).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl PricingError {
    pub fn invalid_line(reason: impl Into<String>) -> Self {
        Self::InvalidLineItem {
            line: None,
            reason: reason.into(),
        }
    }

    /// Attach the row index to a line error; other errors pass through.
    pub fn at_line(self, index: usize) -> Self {
        match self {
            Self::InvalidLineItem { reason, .. } => Self::InvalidLineItem {
                line: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Row index of the offending line, for inline error display.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::InvalidLineItem { line, .. } => *line,
            _ => None,
        }
    }
}

fn line_label(line: &Option<usize>) -> String {
    match line {
        Some(index) => format!(" #{}", index + 1),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_errors_display_one_based_row() {
        let err = PricingError::invalid_line("quantity must not be negative").at_line(2);
        assert_eq!(err.line(), Some(2));
        assert_eq!(
            err.to_string(),
            "invalid line item #3: quantity must not be negative"
        );
    }

    #[test]
    fn at_line_leaves_other_errors_alone() {
        let err = PricingError::EmptyDocument(DocumentKind::Invoice).at_line(4);
        assert_eq!(err, PricingError::EmptyDocument(DocumentKind::Invoice));
        assert_eq!(err.to_string(), "invoice requires at least one line item");
    }
}
