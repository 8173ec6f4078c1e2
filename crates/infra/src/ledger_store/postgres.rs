//! Postgres-backed points ledger.
//!
//! ## Locking
//!
//! `post()` runs in one transaction:
//! 1. `INSERT … ON CONFLICT DO NOTHING` creates the balance row on first use
//! 2. `SELECT … FOR UPDATE` locks it, serializing postings per user
//! 3. idempotency lookup, planning and all inserts happen under that lock
//! 4. the balance row is updated and the transaction committed
//!
//! Any error before commit drops the transaction, which rolls back every
//! write, including the freshly created balance row.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerStoreError |
//! |------------|----------------------|------------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (other) | Any other | `Storage` |
//! | Other | N/A | `Storage` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use loyalty_core::{ActivityId, PostingId, TransactionId, UserId};
use loyalty_points::{
    ActivityKind, LedgerPosting, PointTransaction, PointsBalance, PointsSummary, PostingKind,
    PostingReceipt, RecentActivity, TransactionKind, TransactionSource,
};

use super::{check_posting, replay_receipt, LedgerStore, LedgerStoreError, Planner};

/// Postgres-backed points ledger.
///
/// Cheap to clone; the pool is shared.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self, planner),
        fields(
            user_id = %user_id,
            kind = %kind,
            idempotent = idempotency_key.is_some(),
            new_balance = tracing::field::Empty
        ),
        err(level = "warn")
    )]
    async fn post(
        &self,
        user_id: &UserId,
        kind: PostingKind,
        idempotency_key: Option<&str>,
        planner: &Planner<'_>,
    ) -> Result<PostingReceipt, LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = lock_balance(&mut tx, user_id).await?;

        if let Some(key) = idempotency_key {
            if let Some(stored) = find_receipt(&mut tx, user_id, key).await? {
                rollback(tx).await;
                return replay_receipt(stored, kind, key);
            }
        }

        let posting = match planner(current).map_err(LedgerStoreError::from).and_then(|p| {
            check_posting(user_id, kind, &p)?;
            Ok(p)
        }) {
            Ok(p) => p,
            Err(e) => {
                rollback(tx).await;
                return Err(e);
            }
        };

        write_posting(&mut tx, &posting).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("new_balance", posting.new_balance());
        Ok(posting.receipt)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn balance(&self, user_id: &UserId) -> Result<Option<PointsBalance>, LedgerStoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM user_points
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("balance", e))?;

        row.map(|r| balance_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn recent_activities(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<RecentActivity>, LedgerStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                activity_id,
                posting_id,
                user_id,
                kind,
                description,
                value,
                points_change,
                reference_id,
                created_at
            FROM recent_activities
            WHERE user_id = $1
            ORDER BY created_at DESC, activity_id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_activities", e))?;

        rows.iter().map(activity_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn recent_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, LedgerStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                transaction_id,
                posting_id,
                user_id,
                kind,
                amount,
                source,
                reference_id,
                description,
                created_at
            FROM point_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, transaction_id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn summary(&self, user_id: &UserId) -> Result<PointsSummary, LedgerStoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE((SELECT balance FROM user_points WHERE user_id = $1), 0) AS balance,
                LEAST(COALESCE(SUM(amount) FILTER (WHERE kind = 'earn'), 0), 9223372036854775807)::BIGINT
                    AS total_earned,
                LEAST(COALESCE(-SUM(amount) FILTER (WHERE kind = 'spend'), 0), 9223372036854775807)::BIGINT
                    AS total_redeemed
            FROM point_transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("summary", e))?;

        Ok(PointsSummary {
            balance: get(&row, "balance")?,
            total_earned: get(&row, "total_earned")?,
            total_redeemed: get(&row, "total_redeemed")?,
        })
    }
}

/// Nothing was written in `tx`, so a failed rollback only costs the
/// connection; the caller's outcome stands either way.
async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed; connection will be discarded");
    }
}

/// Create the balance row if needed, then lock it and read the balance.
async fn lock_balance(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
) -> Result<i64, LedgerStoreError> {
    sqlx::query(
        r#"
        INSERT INTO user_points (user_id, balance)
        VALUES ($1, 0)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_balance", e))?;

    sqlx::query_scalar::<_, i64>("SELECT balance FROM user_points WHERE user_id = $1 FOR UPDATE")
        .bind(user_id.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_balance", e))
}

async fn find_receipt(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
    key: &str,
) -> Result<Option<PostingReceipt>, LedgerStoreError> {
    let receipt: Option<Json<PostingReceipt>> = sqlx::query_scalar(
        r#"
        SELECT receipt
        FROM ledger_postings
        WHERE user_id = $1 AND idempotency_key = $2
        "#,
    )
    .bind(user_id.as_str())
    .bind(key)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("find_receipt", e))?;

    Ok(receipt.map(|Json(r)| r))
}

async fn write_posting(
    tx: &mut Transaction<'_, Postgres>,
    posting: &LedgerPosting,
) -> Result<(), LedgerStoreError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_postings (
            posting_id,
            user_id,
            kind,
            idempotency_key,
            receipt,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(posting.posting_id().as_uuid())
    .bind(posting.user_id().as_str())
    .bind(posting.kind().as_str())
    .bind(posting.idempotency_key.as_deref())
    .bind(Json(&posting.receipt))
    .bind(posting.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_posting", e))?;

    for t in &posting.transactions {
        sqlx::query(
            r#"
            INSERT INTO point_transactions (
                transaction_id,
                posting_id,
                user_id,
                kind,
                amount,
                source,
                reference_id,
                description,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(t.id.as_uuid())
        .bind(t.posting_id.as_uuid())
        .bind(t.user_id.as_str())
        .bind(t.kind.as_str())
        .bind(t.amount)
        .bind(t.source.as_str())
        .bind(&t.reference_id)
        .bind(&t.description)
        .bind(t.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    }

    if let Some(a) = &posting.activity {
        sqlx::query(
            r#"
            INSERT INTO recent_activities (
                activity_id,
                posting_id,
                user_id,
                kind,
                description,
                value,
                points_change,
                reference_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(a.id.as_uuid())
        .bind(a.posting_id.as_uuid())
        .bind(a.user_id.as_str())
        .bind(a.kind.as_str())
        .bind(&a.description)
        .bind(a.value)
        .bind(a.points_change)
        .bind(&a.reference_id)
        .bind(a.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_activity", e))?;
    }

    sqlx::query(
        r#"
        UPDATE user_points
        SET balance = $2, updated_at = $3
        WHERE user_id = $1
        "#,
    )
    .bind(posting.user_id().as_str())
    .bind(posting.new_balance())
    .bind(posting.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_balance", e))?;

    Ok(())
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> LedgerStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => LedgerStoreError::Conflict(msg),
                _ => LedgerStoreError::storage(operation, msg),
            }
        }
        sqlx::Error::PoolClosed => LedgerStoreError::storage(operation, "connection pool closed"),
        sqlx::Error::PoolTimedOut => {
            LedgerStoreError::storage(operation, "timed out waiting for a connection")
        }
        other => LedgerStoreError::storage(operation, other.to_string()),
    }
}

// Row decoding

fn get<'r, T>(row: &'r PgRow, column: &'static str) -> Result<T, LedgerStoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| LedgerStoreError::Corrupt(format!("failed to read {column}: {e}")))
}

fn user_id_from(raw: String) -> Result<UserId, LedgerStoreError> {
    UserId::parse(&raw).map_err(|e| LedgerStoreError::Corrupt(e.to_string()))
}

fn corrupt(e: impl ToString) -> LedgerStoreError {
    LedgerStoreError::Corrupt(e.to_string())
}

fn balance_from_row(row: &PgRow) -> Result<PointsBalance, LedgerStoreError> {
    Ok(PointsBalance {
        user_id: user_id_from(get(row, "user_id")?)?,
        balance: get(row, "balance")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<PointTransaction, LedgerStoreError> {
    Ok(PointTransaction {
        id: TransactionId::from_uuid(get(row, "transaction_id")?),
        posting_id: PostingId::from_uuid(get(row, "posting_id")?),
        user_id: user_id_from(get(row, "user_id")?)?,
        kind: TransactionKind::parse(&get::<String>(row, "kind")?).map_err(corrupt)?,
        amount: get(row, "amount")?,
        source: TransactionSource::parse(&get::<String>(row, "source")?).map_err(corrupt)?,
        reference_id: get(row, "reference_id")?,
        description: get(row, "description")?,
        created_at: get(row, "created_at")?,
    })
}

fn activity_from_row(row: &PgRow) -> Result<RecentActivity, LedgerStoreError> {
    Ok(RecentActivity {
        id: ActivityId::from_uuid(get(row, "activity_id")?),
        posting_id: PostingId::from_uuid(get(row, "posting_id")?),
        user_id: user_id_from(get(row, "user_id")?)?,
        kind: ActivityKind::parse(&get::<String>(row, "kind")?).map_err(corrupt)?,
        description: get(row, "description")?,
        value: get::<Decimal>(row, "value")?,
        points_change: get(row, "points_change")?,
        reference_id: get(row, "reference_id")?,
        created_at: get(row, "created_at")?,
    })
}
