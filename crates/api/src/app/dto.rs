use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use loyalty_core::UserId;
use loyalty_infra::Dashboard;
use loyalty_points::{
    earned_points, ActivityKind, PointTransaction, PointsSummary, PostingReceipt, RecentActivity,
    RecordActivity, RedeemPoints,
};

use crate::app::errors::FieldIssue;

// -------------------------
// Request parsing
// -------------------------
//
// Bodies arrive as raw JSON values so that every bad field is reported,
// not only the first one serde trips over.

/// `POST /api/internal/activities`
///
/// `pointsEarned` is accepted for compatibility but ignored: the credit is
/// always derived from `value`.
pub fn parse_record_activity(
    body: &Value,
    idempotency_key: Option<String>,
) -> Result<RecordActivity, Vec<FieldIssue>> {
    let mut fields = Fields::new(body)?;

    let user_id = fields.user_id("userId");
    let kind = fields.required_str("type").and_then(|raw| match ActivityKind::parse(&raw) {
        Ok(kind) => Some(kind),
        Err(_) => {
            fields.issue("type", "must be 'shop' or 'financing'");
            None
        }
    });
    let description = fields.required_str("description");
    let value = fields.positive_decimal("value");
    let _ = fields.optional_non_negative("pointsEarned");
    let points_spent = fields.integer("pointsSpent", 0, true);
    let reference_id = fields.required_str("referenceId");

    fields.finish()?;
    match (user_id, kind, description, value, points_spent, reference_id) {
        (Some(user_id), Some(kind), Some(description), Some(value), Some(points_spent), Some(reference_id)) => {
            Ok(RecordActivity {
                user_id,
                kind,
                description,
                value,
                points_spent,
                reference_id,
                idempotency_key,
            })
        }
        _ => Err(vec![FieldIssue::new("body", "malformed request")]),
    }
}

/// `POST /api/engagement/points/redeem`; the user comes from the token.
pub fn parse_redeem(
    body: &Value,
    user_id: UserId,
    idempotency_key: Option<String>,
) -> Result<RedeemPoints, Vec<FieldIssue>> {
    let mut fields = Fields::new(body)?;

    let points = fields.integer("points", 1, true);
    let reason = fields.optional_str("reason");
    let order_id = fields.optional_str("orderId");

    fields.finish()?;
    match points {
        Some(points) => Ok(RedeemPoints {
            user_id,
            points,
            reason,
            order_id,
            idempotency_key,
        }),
        None => Err(vec![FieldIssue::new("points", "is required")]),
    }
}

struct Fields<'a> {
    obj: &'a Map<String, Value>,
    issues: Vec<FieldIssue>,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Value) -> Result<Self, Vec<FieldIssue>> {
        match body.as_object() {
            Some(obj) => Ok(Self {
                obj,
                issues: Vec::new(),
            }),
            None => Err(vec![FieldIssue::new("body", "must be a JSON object")]),
        }
    }

    fn issue(&mut self, field: &str, message: &str) {
        self.issues.push(FieldIssue::new(field, message));
    }

    fn finish(self) -> Result<(), Vec<FieldIssue>> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self.issues)
        }
    }

    /// Present and not `null`.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn required_str(&mut self, field: &str) -> Option<String> {
        match self.get(field) {
            None => {
                self.issue(field, "is required");
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.issue(field, "must not be empty");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.issue(field, "must be a string");
                None
            }
        }
    }

    fn optional_str(&mut self, field: &str) -> Option<String> {
        match self.get(field) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()).filter(|s| !s.trim().is_empty()),
            Some(_) => {
                self.issue(field, "must be a string");
                None
            }
        }
    }

    fn user_id(&mut self, field: &str) -> Option<UserId> {
        let raw = self.required_str(field)?;
        match UserId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                self.issue(field, &e.to_string());
                None
            }
        }
    }

    fn positive_decimal(&mut self, field: &str) -> Option<Decimal> {
        let number = match self.get(field) {
            None => {
                self.issue(field, "is required");
                return None;
            }
            Some(Value::Number(n)) => n,
            Some(_) => {
                self.issue(field, "must be a number");
                return None;
            }
        };
        let text = number.to_string();
        let value = match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
            Ok(v) => v,
            Err(_) => {
                let message = match number.as_f64() {
                    Some(v) if v <= 0.0 => "must be positive",
                    Some(v) if v < 1.0 => "is below the supported precision (28 decimal places)",
                    _ => "is too large",
                };
                self.issue(field, message);
                return None;
            }
        };
        if value <= Decimal::ZERO {
            self.issue(field, "must be positive");
            return None;
        }
        // The credit derived from the value must fit a points balance.
        if earned_points(value).is_err() {
            self.issue(field, "is too large");
            return None;
        }
        Some(value)
    }

    fn optional_non_negative(&mut self, field: &str) -> Option<f64> {
        match self.get(field) {
            None => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v >= 0.0 => Some(v),
                _ => {
                    self.issue(field, "must not be negative");
                    None
                }
            },
            Some(_) => {
                self.issue(field, "must be a number");
                None
            }
        }
    }

    fn integer(&mut self, field: &str, min: i64, required: bool) -> Option<i64> {
        let value = match self.get(field) {
            None if required => {
                self.issue(field, "is required");
                return None;
            }
            None => return None,
            Some(Value::Number(n)) => n,
            Some(_) => {
                self.issue(field, "must be a number");
                return None;
            }
        };
        let Some(value) = value.as_i64() else {
            self.issue(field, "must be a whole number");
            return None;
        };
        if value < min {
            let message = if min == 0 {
                "must not be negative".to_string()
            } else {
                format!("must be at least {min}")
            };
            self.issue(field, &message);
            return None;
        }
        Some(value)
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn activity_receipt_to_json(r: &PostingReceipt) -> Value {
    json!({
        "message": "activity recorded",
        "postingId": r.posting_id.to_string(),
        "newBalance": r.new_balance,
        "pointsEarned": r.points_earned,
        "pointsSpent": r.points_spent,
        "replayed": r.replayed,
    })
}

pub fn redemption_to_json(r: &PostingReceipt) -> Value {
    json!({
        "postingId": r.posting_id.to_string(),
        "redeemedPoints": r.points_spent,
        "monetaryValueCents": r.monetary_value_cents.unwrap_or(0),
        "newBalance": r.new_balance,
        "replayed": r.replayed,
    })
}

pub fn activity_to_json(a: RecentActivity) -> Value {
    json!({
        "id": a.id.to_string(),
        "type": a.kind.as_str(),
        "description": a.description,
        "value": a.value.to_f64(),
        "pointsChange": a.points_change,
        "referenceId": a.reference_id,
        "createdAt": a.created_at.to_rfc3339(),
    })
}

pub fn transaction_to_json(t: PointTransaction) -> Value {
    json!({
        "id": t.id.to_string(),
        "type": t.kind.as_str(),
        "amount": t.amount,
        "source": t.source.as_str(),
        "referenceId": t.reference_id,
        "description": t.description,
        "createdAt": t.created_at.to_rfc3339(),
    })
}

pub fn dashboard_to_json(d: Dashboard) -> Value {
    json!({
        "balance": d.balance,
        "recentActivities": d.recent_activities.into_iter().map(activity_to_json).collect::<Vec<_>>(),
    })
}

pub fn summary_to_json(s: PointsSummary) -> Value {
    json!({
        "balance": s.balance,
        "totalEarned": s.total_earned,
        "totalRedeemed": s.total_redeemed,
    })
}
