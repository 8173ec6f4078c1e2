//! Ledger postings: the unit of atomic balance change.
//!
//! A store locks the user's balance, hands the current value to one of the
//! planners below and persists the resulting [`LedgerPosting`] in a single
//! transaction. Planners never touch storage, so a rejected plan means
//! nothing was written.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loyalty_core::{ActivityId, PostingId, TransactionId, UserId};

use crate::error::LedgerError;
use crate::model::{ActivityKind, PointTransaction, RecentActivity, TransactionKind, TransactionSource};
use crate::rules::{earned_points, points_to_cents};

/// Command: record a shop/financing activity reported by another backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordActivity {
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub description: String,
    /// Monetary value of the event, in currency units. Must be positive.
    pub value: Decimal,
    /// Points the user spends as a discount on this event.
    pub points_spent: i64,
    pub reference_id: String,
    pub idempotency_key: Option<String>,
}

impl RecordActivity {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.description.trim().is_empty() {
            return Err(LedgerError::validation("description is required"));
        }
        if self.reference_id.trim().is_empty() {
            return Err(LedgerError::validation("referenceId is required"));
        }
        if self.value <= Decimal::ZERO {
            return Err(LedgerError::validation("value must be positive"));
        }
        if self.points_spent < 0 {
            return Err(LedgerError::validation("pointsSpent must not be negative"));
        }
        Ok(())
    }
}

/// Command: a user redeems points outside of a shop/financing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemPoints {
    pub user_id: UserId,
    pub points: i64,
    pub reason: Option<String>,
    pub order_id: Option<String>,
    pub idempotency_key: Option<String>,
}

impl RedeemPoints {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.points < 1 {
            return Err(LedgerError::validation("points must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    Activity,
    Redemption,
}

impl PostingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PostingKind::Activity => "activity",
            PostingKind::Redemption => "redemption",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "activity" => Ok(PostingKind::Activity),
            "redemption" => Ok(PostingKind::Redemption),
            other => Err(LedgerError::validation(format!("unknown posting kind '{other}'"))),
        }
    }
}

impl core::fmt::Display for PostingKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a committed posting, as reported to the caller.
///
/// Stored alongside the posting so an idempotent retry can return the
/// original answer without recomputing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingReceipt {
    pub posting_id: PostingId,
    pub kind: PostingKind,
    pub user_id: UserId,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub points_earned: i64,
    pub points_spent: i64,
    /// Only set for redemptions.
    pub monetary_value_cents: Option<i64>,
    /// True when this receipt was served from an earlier posting with the
    /// same idempotency key.
    #[serde(default)]
    pub replayed: bool,
}

impl PostingReceipt {
    pub fn into_replayed(mut self) -> Self {
        self.replayed = true;
        self
    }
}

/// Everything one posting writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPosting {
    pub receipt: PostingReceipt,
    pub idempotency_key: Option<String>,
    pub transactions: Vec<PointTransaction>,
    pub activity: Option<RecentActivity>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerPosting {
    pub fn posting_id(&self) -> PostingId {
        self.receipt.posting_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.receipt.user_id
    }

    pub fn new_balance(&self) -> i64 {
        self.receipt.new_balance
    }

    pub fn kind(&self) -> PostingKind {
        self.receipt.kind
    }
}

/// Plan the writes for a shop/financing activity against `balance`.
///
/// Debit first (rejected when it exceeds the balance), then credit
/// `floor(value × 2)`. One transaction record per non-zero movement, one
/// activity record with the net change.
pub fn plan_activity(
    balance: i64,
    cmd: &RecordActivity,
    now: DateTime<Utc>,
) -> Result<LedgerPosting, LedgerError> {
    cmd.validate()?;

    let earned = earned_points(cmd.value)?;
    let spent = cmd.points_spent;

    if spent > 0 && balance < spent {
        return Err(LedgerError::InsufficientBalance {
            balance,
            requested: spent,
        });
    }

    let posting_id = PostingId::new();
    let mut transactions = Vec::with_capacity(2);
    let mut next_balance = balance;

    if spent > 0 {
        next_balance = next_balance.checked_sub(spent).ok_or(LedgerError::Overflow)?;
        transactions.push(PointTransaction {
            id: TransactionId::new(),
            posting_id,
            user_id: cmd.user_id.clone(),
            kind: TransactionKind::Spend,
            amount: -spent,
            source: cmd.kind.discount_source(),
            reference_id: cmd.reference_id.clone(),
            description: format!("Discount on: {}", cmd.description),
            created_at: now,
        });
    }

    if earned > 0 {
        next_balance = next_balance.checked_add(earned).ok_or(LedgerError::Overflow)?;
        transactions.push(PointTransaction {
            id: TransactionId::new(),
            posting_id,
            user_id: cmd.user_id.clone(),
            kind: TransactionKind::Earn,
            amount: earned,
            source: cmd.kind.earn_source(),
            reference_id: cmd.reference_id.clone(),
            description: format!("Points for: {}", cmd.description),
            created_at: now,
        });
    }

    let activity = RecentActivity {
        id: ActivityId::new(),
        posting_id,
        user_id: cmd.user_id.clone(),
        kind: cmd.kind,
        description: cmd.description.clone(),
        value: cmd.value,
        points_change: next_balance - balance,
        reference_id: cmd.reference_id.clone(),
        created_at: now,
    };

    Ok(LedgerPosting {
        receipt: PostingReceipt {
            posting_id,
            kind: PostingKind::Activity,
            user_id: cmd.user_id.clone(),
            previous_balance: balance,
            new_balance: next_balance,
            points_earned: earned,
            points_spent: spent,
            monetary_value_cents: None,
            replayed: false,
        },
        idempotency_key: cmd.idempotency_key.clone(),
        transactions,
        activity: Some(activity),
        occurred_at: now,
    })
}

/// Plan a direct redemption of points against `balance`.
///
/// Writes a single `spend` transaction tagged `redemption`. Redemptions are
/// not shop/financing events, so no activity record is produced.
pub fn plan_redemption(
    balance: i64,
    cmd: &RedeemPoints,
    now: DateTime<Utc>,
) -> Result<LedgerPosting, LedgerError> {
    cmd.validate()?;

    if balance < cmd.points {
        return Err(LedgerError::InsufficientBalance {
            balance,
            requested: cmd.points,
        });
    }

    let cents = points_to_cents(cmd.points)?;
    let posting_id = PostingId::new();
    let next_balance = balance - cmd.points;

    let reference_id = cmd
        .order_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("redemption:{posting_id}"));
    let description = cmd
        .reason
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Points redemption".to_string());

    let transaction = PointTransaction {
        id: TransactionId::new(),
        posting_id,
        user_id: cmd.user_id.clone(),
        kind: TransactionKind::Spend,
        amount: -cmd.points,
        source: TransactionSource::Redemption,
        reference_id,
        description,
        created_at: now,
    };

    Ok(LedgerPosting {
        receipt: PostingReceipt {
            posting_id,
            kind: PostingKind::Redemption,
            user_id: cmd.user_id.clone(),
            previous_balance: balance,
            new_balance: next_balance,
            points_earned: 0,
            points_spent: cmd.points,
            monetary_value_cents: Some(cents),
            replayed: false,
        },
        idempotency_key: cmd.idempotency_key.clone(),
        transactions: vec![transaction],
        activity: None,
        occurred_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use proptest::prelude::*;

    use crate::summary::signed_total;

    fn user() -> UserId {
        UserId::parse("user-1").unwrap()
    }

    fn activity(kind: ActivityKind, value: &str, spent: i64) -> RecordActivity {
        RecordActivity {
            user_id: user(),
            kind,
            description: "Notebook".to_string(),
            value: Decimal::from_str(value).unwrap(),
            points_spent: spent,
            reference_id: "order-1".to_string(),
            idempotency_key: None,
        }
    }

    #[test]
    fn earn_only_activity_writes_one_transaction_and_one_activity() {
        let posting = plan_activity(0, &activity(ActivityKind::Shop, "150.60", 0), Utc::now()).unwrap();

        assert_eq!(posting.new_balance(), 301);
        assert_eq!(posting.receipt.points_earned, 301);
        assert_eq!(posting.transactions.len(), 1);
        let tx = &posting.transactions[0];
        assert_eq!(tx.kind, TransactionKind::Earn);
        assert_eq!(tx.amount, 301);
        assert_eq!(tx.source, TransactionSource::ShopPurchase);
        assert_eq!(tx.description, "Points for: Notebook");

        let act = posting.activity.as_ref().unwrap();
        assert_eq!(act.points_change, 301);
        assert_eq!(act.posting_id, posting.posting_id());
    }

    #[test]
    fn spend_and_earn_apply_debit_before_credit() {
        let posting =
            plan_activity(100, &activity(ActivityKind::Financing, "10", 80), Utc::now()).unwrap();

        assert_eq!(posting.new_balance(), 100 - 80 + 20);
        assert_eq!(posting.transactions.len(), 2);
        assert_eq!(posting.transactions[0].kind, TransactionKind::Spend);
        assert_eq!(posting.transactions[0].amount, -80);
        assert_eq!(posting.transactions[0].source, TransactionSource::FinancingDiscount);
        assert_eq!(posting.transactions[0].description, "Discount on: Notebook");
        assert_eq!(posting.transactions[1].source, TransactionSource::FinancingContract);
        assert_eq!(posting.activity.unwrap().points_change, -60);
    }

    #[test]
    fn credit_from_same_activity_cannot_fund_its_own_debit() {
        // 50 points would be earned, but the debit is checked against the prior balance.
        let err = plan_activity(10, &activity(ActivityKind::Shop, "25", 30), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                balance: 10,
                requested: 30
            }
        );
    }

    #[test]
    fn sub_point_value_records_activity_without_transactions() {
        let posting = plan_activity(7, &activity(ActivityKind::Shop, "0.3", 0), Utc::now()).unwrap();
        assert!(posting.transactions.is_empty());
        assert_eq!(posting.new_balance(), 7);
        assert_eq!(posting.activity.unwrap().points_change, 0);
    }

    #[test]
    fn invalid_activity_is_rejected_before_planning() {
        let mut cmd = activity(ActivityKind::Shop, "10", 0);
        cmd.value = Decimal::ZERO;
        assert!(matches!(plan_activity(0, &cmd, Utc::now()), Err(LedgerError::Validation(_))));

        let mut cmd = activity(ActivityKind::Shop, "10", 0);
        cmd.reference_id = "  ".to_string();
        assert!(matches!(plan_activity(0, &cmd, Utc::now()), Err(LedgerError::Validation(_))));

        let cmd = activity(ActivityKind::Shop, "10", -1);
        assert!(matches!(plan_activity(0, &cmd, Utc::now()), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn redemption_spends_points_and_prices_them() {
        let cmd = RedeemPoints {
            user_id: user(),
            points: 300,
            reason: Some("checkout-discount".to_string()),
            order_id: Some("ord_1".to_string()),
            idempotency_key: Some("k1".to_string()),
        };
        let posting = plan_redemption(4200, &cmd, Utc::now()).unwrap();

        assert_eq!(posting.new_balance(), 3900);
        assert_eq!(posting.receipt.monetary_value_cents, Some(3000));
        assert_eq!(posting.kind(), PostingKind::Redemption);
        assert!(posting.activity.is_none());
        assert_eq!(posting.transactions[0].source, TransactionSource::Redemption);
        assert_eq!(posting.transactions[0].reference_id, "ord_1");
        assert_eq!(posting.idempotency_key.as_deref(), Some("k1"));
    }

    #[test]
    fn redemption_defaults_reference_and_description() {
        let cmd = RedeemPoints {
            user_id: user(),
            points: 1,
            reason: None,
            order_id: None,
            idempotency_key: None,
        };
        let posting = plan_redemption(1, &cmd, Utc::now()).unwrap();
        let tx = &posting.transactions[0];
        assert!(tx.reference_id.starts_with("redemption:"));
        assert_eq!(tx.description, "Points redemption");
    }

    #[test]
    fn redemption_beyond_balance_is_rejected() {
        let cmd = RedeemPoints {
            user_id: user(),
            points: 5,
            reason: None,
            order_id: None,
            idempotency_key: None,
        };
        assert!(matches!(
            plan_redemption(4, &cmd, Utc::now()),
            Err(LedgerError::InsufficientBalance { balance: 4, requested: 5 })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: final balance = prior − debit + floor(value × 2) whenever
        /// the debit is covered.
        #[test]
        fn balance_moves_by_credit_minus_debit(
            prior in 0i64..10_000_000,
            cents in 1i64..100_000_000,
            spent in 0i64..10_000_000,
        ) {
            let value = Decimal::new(cents, 2);
            let mut cmd = activity(ActivityKind::Shop, "1", spent);
            cmd.value = value;

            match plan_activity(prior, &cmd, Utc::now()) {
                Ok(posting) => {
                    prop_assert!(spent <= prior);
                    let expected = prior - spent + earned_points(value).unwrap();
                    prop_assert_eq!(posting.new_balance(), expected);
                    prop_assert_eq!(signed_total(&posting.transactions), expected - prior);
                }
                Err(LedgerError::InsufficientBalance { .. }) => prop_assert!(spent > prior),
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }

        /// Property: replaying a sequence of postings keeps the balance equal
        /// to the signed sum of every transaction written, and never negative.
        #[test]
        fn balance_tracks_signed_transaction_sum(
            ops in prop::collection::vec((0i64..50_000, 0i64..20_000), 1..40)
        ) {
            let mut balance = 0i64;
            let mut journal: Vec<PointTransaction> = Vec::new();

            for (cents, spent) in ops {
                let mut cmd = activity(ActivityKind::Financing, "1", spent);
                cmd.value = Decimal::new(cents.max(1), 2);

                if let Ok(posting) = plan_activity(balance, &cmd, Utc::now()) {
                    balance = posting.new_balance();
                    journal.extend(posting.transactions);
                }

                prop_assert!(balance >= 0);
                prop_assert_eq!(signed_total(&journal), balance);
            }
        }
    }
}
