//! Points ledger storage boundary.
//!
//! A store owns three record sets (balances, transactions, activities) plus
//! the posting headers that carry idempotency keys. Every balance change goes
//! through [`LedgerStore::post`], which runs the whole read-modify-write
//! sequence for one user atomically:
//!
//! 1. ensure the user's balance record exists and lock it
//! 2. if an idempotency key is given and already recorded, return the stored receipt
//! 3. run the planner against the locked balance
//! 4. persist the posting header, transactions, activity and new balance
//!
//! A planner error aborts the sequence with nothing written, including the
//! lazily created balance record.

use async_trait::async_trait;
use thiserror::Error;

use loyalty_core::UserId;
use loyalty_points::{
    LedgerError, LedgerPosting, PointTransaction, PointsBalance, PointsSummary, PostingKind,
    PostingReceipt, RecentActivity,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Computes a posting from the user's locked balance.
pub type Planner<'a> = dyn Fn(i64) -> Result<LedgerPosting, LedgerError> + Send + Sync + 'a;

/// Ledger storage error.
///
/// `Ledger` carries business-rule rejections from the planner unchanged;
/// the remaining variants are infrastructure failures.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    #[error("storage failure in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("stored ledger data is corrupt: {0}")]
    Corrupt(String),
}

impl LedgerStoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    /// The business-rule error inside, if this is one.
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            LedgerStoreError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically apply one posting for `user_id` (see module docs).
    async fn post(
        &self,
        user_id: &UserId,
        kind: PostingKind,
        idempotency_key: Option<&str>,
        planner: &Planner<'_>,
    ) -> Result<PostingReceipt, LedgerStoreError>;

    /// Balance record, if the user ever had a posting.
    async fn balance(&self, user_id: &UserId) -> Result<Option<PointsBalance>, LedgerStoreError>;

    /// Newest-first activities, at most `limit`.
    async fn recent_activities(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<RecentActivity>, LedgerStoreError>;

    /// Newest-first transactions, at most `limit`.
    async fn recent_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, LedgerStoreError>;

    /// Balance plus lifetime earned/redeemed totals.
    async fn summary(&self, user_id: &UserId) -> Result<PointsSummary, LedgerStoreError>;
}

/// Reject a posting the planner built for a different user or kind.
pub(crate) fn check_posting(
    user_id: &UserId,
    kind: PostingKind,
    posting: &LedgerPosting,
) -> Result<(), LedgerStoreError> {
    if posting.user_id() != user_id {
        return Err(LedgerStoreError::Corrupt(format!(
            "planner produced a posting for '{}' while '{}' was locked",
            posting.user_id(),
            user_id
        )));
    }
    if posting.kind() != kind {
        return Err(LedgerStoreError::Corrupt(format!(
            "planner produced a {} posting, expected {}",
            posting.kind(),
            kind
        )));
    }
    Ok(())
}

/// Resolve a stored receipt found under the same idempotency key.
pub(crate) fn replay_receipt(
    stored: PostingReceipt,
    kind: PostingKind,
    key: &str,
) -> Result<PostingReceipt, LedgerStoreError> {
    if stored.kind != kind {
        return Err(LedgerError::IdempotencyConflict {
            key: key.to_string(),
            existing: stored.kind,
        }
        .into());
    }
    Ok(stored.into_replayed())
}
