//! Loyalty points ledger (balances, transactions, activity history).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Stores
//! call the planners here while holding the user's balance lock and persist
//! whatever `LedgerPosting` comes back.

pub mod error;
pub mod model;
pub mod posting;
pub mod rules;
pub mod summary;

pub use error::LedgerError;
pub use model::{
    ActivityKind, PointTransaction, PointsBalance, RecentActivity, TransactionKind,
    TransactionSource,
};
pub use posting::{
    plan_activity, plan_redemption, LedgerPosting, PostingKind, PostingReceipt, RecordActivity,
    RedeemPoints,
};
pub use rules::{earned_points, points_to_cents, CENTS_PER_POINT, POINTS_PER_CURRENCY_UNIT};
pub use summary::{signed_total, PointsSummary};
