use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use loyalty_core::UserId;
use loyalty_points::{
    PointTransaction, PointsBalance, PointsSummary, PostingKind, PostingReceipt, RecentActivity,
};

use super::{check_posting, replay_receipt, LedgerStore, LedgerStoreError, Planner};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdempotencyKey {
    user_id: UserId,
    key: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<UserId, PointsBalance>,
    /// Append-only, in commit order.
    transactions: Vec<PointTransaction>,
    /// Append-only, in commit order.
    activities: Vec<RecentActivity>,
    receipts: HashMap<IdempotencyKey, PostingReceipt>,
}

/// In-memory points ledger.
///
/// Intended for tests/dev. Every posting runs under the store-wide write
/// lock, so postings are serialized across all users.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transaction ever written for `user_id`, oldest first.
    pub fn journal(&self, user_id: &UserId) -> Vec<PointTransaction> {
        self.state
            .read()
            .map(|s| {
                s.transactions
                    .iter()
                    .filter(|t| &t.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of activity records written for `user_id`.
    pub fn activity_count(&self, user_id: &UserId) -> usize {
        self.state
            .read()
            .map(|s| s.activities.iter().filter(|a| &a.user_id == user_id).count())
            .unwrap_or(0)
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, LedgerStoreError> {
        self.state
            .read()
            .map_err(|_| LedgerStoreError::storage("read", "lock poisoned"))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn post(
        &self,
        user_id: &UserId,
        kind: PostingKind,
        idempotency_key: Option<&str>,
        planner: &Planner<'_>,
    ) -> Result<PostingReceipt, LedgerStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerStoreError::storage("post", "lock poisoned"))?;

        if let Some(key) = idempotency_key {
            let lookup = IdempotencyKey {
                user_id: user_id.clone(),
                key: key.to_string(),
            };
            if let Some(stored) = state.receipts.get(&lookup) {
                return replay_receipt(stored.clone(), kind, key);
            }
        }

        let current = state.balances.get(user_id).map(|b| b.balance).unwrap_or(0);

        // Nothing below may fail once the state starts changing.
        let posting = planner(current)?;
        check_posting(user_id, kind, &posting)?;

        let now = Utc::now();
        let balance = state
            .balances
            .entry(user_id.clone())
            .or_insert_with(|| PointsBalance::opened(user_id.clone(), now));
        balance.balance = posting.new_balance();
        balance.updated_at = now;

        if let Some(key) = &posting.idempotency_key {
            state.receipts.insert(
                IdempotencyKey {
                    user_id: user_id.clone(),
                    key: key.clone(),
                },
                posting.receipt.clone(),
            );
        }
        state.transactions.extend(posting.transactions.iter().cloned());
        if let Some(activity) = &posting.activity {
            state.activities.push(activity.clone());
        }

        Ok(posting.receipt)
    }

    async fn balance(&self, user_id: &UserId) -> Result<Option<PointsBalance>, LedgerStoreError> {
        Ok(self.read_state()?.balances.get(user_id).cloned())
    }

    async fn recent_activities(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<RecentActivity>, LedgerStoreError> {
        Ok(self
            .read_state()?
            .activities
            .iter()
            .rev()
            .filter(|a| &a.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, LedgerStoreError> {
        Ok(self
            .read_state()?
            .transactions
            .iter()
            .rev()
            .filter(|t| &t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn summary(&self, user_id: &UserId) -> Result<PointsSummary, LedgerStoreError> {
        let state = self.read_state()?;
        let balance = state.balances.get(user_id).map(|b| b.balance).unwrap_or(0);
        Ok(PointsSummary::from_transactions(
            balance,
            state.transactions.iter().filter(|t| &t.user_id == user_id),
        ))
    }
}
