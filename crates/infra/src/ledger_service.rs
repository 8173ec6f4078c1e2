//! Ledger application service: validates commands, runs them through a
//! [`LedgerStore`] and logs outcomes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use loyalty_core::UserId;
use loyalty_points::{
    plan_activity, plan_redemption, LedgerError, PointTransaction, PointsSummary, PostingKind,
    PostingReceipt, RecentActivity, RecordActivity, RedeemPoints,
};

use crate::ledger_store::{LedgerStore, LedgerStoreError};

/// Activities shown on the dashboard.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Transactions shown in the points history.
pub const RECENT_TRANSACTION_LIMIT: usize = 10;

/// What a client sees on their dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    /// Zero when the user never had a posting.
    pub balance: i64,
    pub recent_activities: Vec<RecentActivity>,
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record a shop/financing activity: debit, credit, history, atomically.
    #[instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, kind = %cmd.kind, reference_id = %cmd.reference_id)
    )]
    pub async fn record_activity(&self, cmd: RecordActivity) -> Result<PostingReceipt, LedgerStoreError> {
        cmd.validate()?;

        let receipt = self
            .store
            .post(
                &cmd.user_id,
                PostingKind::Activity,
                cmd.idempotency_key.as_deref(),
                &|balance| plan_activity(balance, &cmd, Utc::now()),
            )
            .await
            .inspect_err(log_rejection)?;

        tracing::info!(
            posting_id = %receipt.posting_id,
            new_balance = receipt.new_balance,
            points_earned = receipt.points_earned,
            points_spent = receipt.points_spent,
            replayed = receipt.replayed,
            "activity recorded"
        );
        Ok(receipt)
    }

    /// Redeem points directly from the balance.
    #[instrument(skip(self, cmd), fields(user_id = %cmd.user_id, points = cmd.points))]
    pub async fn redeem(&self, cmd: RedeemPoints) -> Result<PostingReceipt, LedgerStoreError> {
        cmd.validate()?;

        let receipt = self
            .store
            .post(
                &cmd.user_id,
                PostingKind::Redemption,
                cmd.idempotency_key.as_deref(),
                &|balance| plan_redemption(balance, &cmd, Utc::now()),
            )
            .await
            .inspect_err(log_rejection)?;

        tracing::info!(
            posting_id = %receipt.posting_id,
            new_balance = receipt.new_balance,
            replayed = receipt.replayed,
            "points redeemed"
        );
        Ok(receipt)
    }

    pub async fn dashboard(&self, user_id: &UserId) -> Result<Dashboard, LedgerStoreError> {
        let balance = self.store.balance(user_id).await?.map(|b| b.balance).unwrap_or(0);
        let recent_activities = self
            .store
            .recent_activities(user_id, RECENT_ACTIVITY_LIMIT)
            .await?;
        Ok(Dashboard {
            balance,
            recent_activities,
        })
    }

    pub async fn summary(&self, user_id: &UserId) -> Result<PointsSummary, LedgerStoreError> {
        self.store.summary(user_id).await
    }

    pub async fn recent_transactions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PointTransaction>, LedgerStoreError> {
        self.store
            .recent_transactions(user_id, RECENT_TRANSACTION_LIMIT)
            .await
    }
}

fn log_rejection(err: &LedgerStoreError) {
    if let Some(LedgerError::InsufficientBalance { balance, requested }) = err.as_ledger() {
        tracing::warn!(balance, requested, "posting rejected: insufficient balance");
    }
}
