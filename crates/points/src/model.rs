use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loyalty_core::{ActivityId, PostingId, TransactionId, UserId};

use crate::error::LedgerError;

/// Business event category reported by the shop and financing backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Shop,
    Financing,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 2] = [ActivityKind::Shop, ActivityKind::Financing];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Shop => "shop",
            ActivityKind::Financing => "financing",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "shop" => Ok(ActivityKind::Shop),
            "financing" => Ok(ActivityKind::Financing),
            other => Err(LedgerError::validation(format!(
                "unknown activity type '{other}' (expected 'shop' or 'financing')"
            ))),
        }
    }

    /// Source tag for points earned from this kind of event.
    pub fn earn_source(self) -> TransactionSource {
        match self {
            ActivityKind::Shop => TransactionSource::ShopPurchase,
            ActivityKind::Financing => TransactionSource::FinancingContract,
        }
    }

    /// Source tag for points spent as a discount on this kind of event.
    pub fn discount_source(self) -> TransactionSource {
        match self {
            ActivityKind::Shop => TransactionSource::ShopDiscount,
            ActivityKind::Financing => TransactionSource::FinancingDiscount,
        }
    }
}

impl core::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a point movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earn,
    Spend,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Spend => "spend",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "earn" => Ok(TransactionKind::Earn),
            "spend" => Ok(TransactionKind::Spend),
            other => Err(LedgerError::validation(format!("unknown transaction type '{other}'"))),
        }
    }
}

/// Where a point movement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    ShopPurchase,
    FinancingContract,
    ShopDiscount,
    FinancingDiscount,
    Redemption,
}

impl TransactionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionSource::ShopPurchase => "shop_purchase",
            TransactionSource::FinancingContract => "financing_contract",
            TransactionSource::ShopDiscount => "shop_discount",
            TransactionSource::FinancingDiscount => "financing_discount",
            TransactionSource::Redemption => "redemption",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "shop_purchase" => Ok(TransactionSource::ShopPurchase),
            "financing_contract" => Ok(TransactionSource::FinancingContract),
            "shop_discount" => Ok(TransactionSource::ShopDiscount),
            "financing_discount" => Ok(TransactionSource::FinancingDiscount),
            "redemption" => Ok(TransactionSource::Redemption),
            other => Err(LedgerError::validation(format!("unknown transaction source '{other}'"))),
        }
    }
}

/// Current point balance of a user (one per user, created lazily).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub user_id: UserId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PointsBalance {
    /// Fresh zero balance, as created on a user's first posting.
    pub fn opened(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Immutable record of one point movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: TransactionId,
    pub posting_id: PostingId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Signed amount: positive for `Earn`, negative for `Spend`.
    pub amount: i64,
    pub source: TransactionSource,
    pub reference_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl PointTransaction {
    /// Unsigned size of the movement.
    pub fn magnitude(&self) -> i64 {
        self.amount.abs()
    }
}

/// Immutable summary of a business event, shown in the user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub id: ActivityId,
    pub posting_id: PostingId,
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub description: String,
    /// Monetary value of the event, in currency units.
    pub value: Decimal,
    /// Net change applied to the balance (earned minus spent).
    pub points_change: i64,
    pub reference_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_tags_round_trip_through_their_string_form() {
        for kind in ActivityKind::ALL {
            assert_eq!(ActivityKind::parse(kind.as_str()).unwrap(), kind);
        }
        for kind in [TransactionKind::Earn, TransactionKind::Spend] {
            assert_eq!(TransactionKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(ActivityKind::parse("loan").is_err());
        assert!(TransactionSource::parse("gift").is_err());
    }

    #[test]
    fn serde_names_match_storage_tags() {
        let json = serde_json::to_value(TransactionSource::FinancingDiscount).unwrap();
        assert_eq!(json, TransactionSource::FinancingDiscount.as_str());
        let json = serde_json::to_value(ActivityKind::Shop).unwrap();
        assert_eq!(json, "shop");
    }

    #[test]
    fn sources_follow_activity_kind() {
        assert_eq!(ActivityKind::Shop.earn_source(), TransactionSource::ShopPurchase);
        assert_eq!(ActivityKind::Shop.discount_source(), TransactionSource::ShopDiscount);
        assert_eq!(
            ActivityKind::Financing.earn_source(),
            TransactionSource::FinancingContract
        );
        assert_eq!(
            ActivityKind::Financing.discount_source(),
            TransactionSource::FinancingDiscount
        );
    }
}
