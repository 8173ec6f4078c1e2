use thiserror::Error;

use crate::posting::PostingKind;

/// Ledger rule failure.
///
/// `InsufficientBalance` is the one business-rule rejection callers are
/// expected to surface to end users; everything else is either bad input or
/// a bug upstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient points balance (balance: {balance}, requested: {requested})")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("idempotency key '{key}' was already used for a {existing} posting")]
    IdempotencyConflict { key: String, existing: PostingKind },

    #[error("points arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
