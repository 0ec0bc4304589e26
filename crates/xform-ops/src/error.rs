//! Error types for transform operations.

use thiserror::Error;

/// Result type for transform operations.
pub type OpResult<T> = Result<T, OpError>;

/// Errors raised while building, validating or rewriting operations.
#[derive(Debug, Error)]
pub enum OpError {
    /// An operation's parameters violate its invariants.
    ///
    /// Raised synchronously by `validate()`; the message names the
    /// offending value and the violated bound.
    #[error("validation error: {0}")]
    Validation(String),

    /// Two operations cannot be composed into one.
    ///
    /// Callers are expected to check `may_compose` first.
    #[error("composition error: {0}")]
    Composition(String),

    /// An operation's data does not admit a usable inverse.
    #[error("inversion error: {0}")]
    Inversion(String),
}

impl OpError {
    /// Creates a [`OpError::Validation`] error.
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a [`OpError::Composition`] error.
    #[inline]
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Creates a [`OpError::Inversion`] error.
    #[inline]
    pub fn inversion(msg: impl Into<String>) -> Self {
        Self::Inversion(msg.into())
    }
}
