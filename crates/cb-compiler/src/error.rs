//! Parse errors
//!
//! Every error here is local to one filter line: the line is dropped and
//! counted, the batch continues.

use cb_core::{PatternError, RegexDialectError};

/// Error produced while normalizing or parsing one filter line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("Unsupported regex: {0}")]
    Regex(#[from] RegexDialectError),
}

impl SyntaxError {
    pub(crate) fn rule(message: impl Into<String>) -> Self {
        Self::InvalidRule(message.into())
    }

    pub(crate) fn modifier(message: impl Into<String>) -> Self {
        Self::InvalidModifier(message.into())
    }

    pub(crate) fn pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern(message.into())
    }
}
