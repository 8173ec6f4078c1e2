use serde::{Deserialize, Serialize};

use crate::model::{PointTransaction, TransactionKind};

/// Lifetime totals for one user. Totals saturate at `i64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSummary {
    pub balance: i64,
    pub total_earned: i64,
    /// Every point spent, whether as a discount or a direct redemption.
    pub total_redeemed: i64,
}

impl PointsSummary {
    pub fn from_transactions<'a, I>(balance: i64, transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a PointTransaction>,
    {
        let mut summary = Self {
            balance,
            ..Self::default()
        };
        for tx in transactions {
            match tx.kind {
                TransactionKind::Earn => {
                    summary.total_earned = summary.total_earned.saturating_add(tx.magnitude())
                }
                TransactionKind::Spend => {
                    summary.total_redeemed = summary.total_redeemed.saturating_add(tx.magnitude())
                }
            }
        }
        summary
    }
}

/// Sum of signed amounts; equals the balance for a user's full journal.
pub fn signed_total(transactions: &[PointTransaction]) -> i64 {
    transactions.iter().map(|t| t.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loyalty_core::{PostingId, TransactionId, UserId};

    use crate::model::TransactionSource;

    fn tx(kind: TransactionKind, amount: i64) -> PointTransaction {
        PointTransaction {
            id: TransactionId::new(),
            posting_id: PostingId::new(),
            user_id: UserId::parse("u").unwrap(),
            kind,
            amount,
            source: TransactionSource::ShopPurchase,
            reference_id: "r".to_string(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_split_by_direction() {
        let journal = vec![
            tx(TransactionKind::Earn, 5600),
            tx(TransactionKind::Spend, -1000),
            tx(TransactionKind::Spend, -400),
        ];
        let summary = PointsSummary::from_transactions(4200, &journal);
        assert_eq!(summary.total_earned, 5600);
        assert_eq!(summary.total_redeemed, 1400);
        assert_eq!(signed_total(&journal), summary.balance);
    }

    #[test]
    fn lifetime_totals_saturate_instead_of_overflowing() {
        let journal = vec![
            tx(TransactionKind::Earn, i64::MAX - 10),
            tx(TransactionKind::Spend, -(i64::MAX - 10)),
            tx(TransactionKind::Earn, i64::MAX - 10),
            tx(TransactionKind::Spend, -(i64::MAX - 20)),
        ];
        let summary = PointsSummary::from_transactions(10, &journal);
        assert_eq!(summary.total_earned, i64::MAX);
        assert_eq!(summary.total_redeemed, i64::MAX);
        assert_eq!(summary.balance, 10);
    }
}
