//! SMS balance and ledger repository
//!
//! Every mutation runs as: lock the balance row, check hold and funds, update
//! the balance, append the ledger row, commit. Dropping the transaction at any
//! point rolls the whole unit back.

use crate::domain::{LedgerMutation, SmsBalance, SmsTransaction, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySqlConnection, MySqlPool};

const BALANCE_COLUMNS: &str =
    "tenant_id, balance, version, integrity_hold, hold_reason, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, tenant_id, sequence, type, amount, balance_after, description, created_by, created_at";

/// MySQL error numbers raised when row locks cannot be acquired
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsRepository: Send + Sync {
    async fn find_balance(&self, tenant_id: StringUuid) -> Result<Option<SmsBalance>>;
    /// Apply `mutation` atomically and return the new balance with its ledger row.
    ///
    /// Fails with `IntegrityViolation` while a hold is set and with
    /// `InsufficientCredit` when the balance would go negative.
    async fn apply_mutation(
        &self,
        tenant_id: StringUuid,
        mutation: &LedgerMutation,
    ) -> Result<(SmsBalance, SmsTransaction)>;
    /// Newest first
    async fn list_transactions(
        &self,
        tenant_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SmsTransaction>>;
    async fn count_transactions(&self, tenant_id: StringUuid) -> Result<i64>;
    /// Full ledger in replay order. `sequence` is assigned under the balance
    /// lock, so it is the commit order; `created_at` is informational.
    async fn ledger(&self, tenant_id: StringUuid) -> Result<Vec<SmsTransaction>>;
    /// Set (`Some(reason)`) or clear (`None`) the integrity hold
    async fn set_hold(&self, tenant_id: StringUuid, reason: Option<String>) -> Result<()>;
}

pub struct SmsRepositoryImpl {
    pool: MySqlPool,
}

impl SmsRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Map lock contention to `ConcurrencyConflict`; everything else stays a database error.
pub(crate) fn map_lock_error(err: sqlx::Error) -> AppError {
    let number = err
        .as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .map(|db| db.number());

    match number {
        Some(ER_LOCK_DEADLOCK) => AppError::ConcurrencyConflict("deadlock detected".to_string()),
        Some(ER_LOCK_WAIT_TIMEOUT) => {
            AppError::ConcurrencyConflict("lock wait timeout exceeded".to_string())
        }
        _ => AppError::Database(err),
    }
}

pub(crate) async fn select_balance(
    conn: &mut MySqlConnection,
    tenant_id: StringUuid,
    for_update: bool,
) -> Result<Option<SmsBalance>> {
    let sql = format!(
        "SELECT {} FROM sms_balances WHERE tenant_id = ?{}",
        BALANCE_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, SmsBalance>(&sql)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_lock_error)
}

pub(crate) async fn insert_transaction(
    conn: &mut MySqlConnection,
    row: &SmsTransaction,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sms_transactions (id, tenant_id, sequence, type, amount, balance_after, description, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.id)
    .bind(row.tenant_id)
    .bind(row.sequence)
    .bind(row.transaction_type)
    .bind(row.amount)
    .bind(row.balance_after)
    .bind(&row.description)
    .bind(row.created_by)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_lock_error)?;
    Ok(())
}

#[async_trait]
impl SmsRepository for SmsRepositoryImpl {
    async fn find_balance(&self, tenant_id: StringUuid) -> Result<Option<SmsBalance>> {
        let mut conn = self.pool.acquire().await?;
        select_balance(&mut conn, tenant_id, false).await
    }

    async fn apply_mutation(
        &self,
        tenant_id: StringUuid,
        mutation: &LedgerMutation,
    ) -> Result<(SmsBalance, SmsTransaction)> {
        let mut tx = self.pool.begin().await?;

        let current = select_balance(&mut *tx, tenant_id, true)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("SMS balance for tenant {} not found", tenant_id)))?;
        // Stamped once the row lock is held
        let now = Utc::now();

        mutation.check_against(&current)?;

        let row = mutation.to_transaction(&current, now);
        let updated = sqlx::query(
            "UPDATE sms_balances SET balance = ?, version = ?, updated_at = ? WHERE tenant_id = ? AND version = ?",
        )
        .bind(row.balance_after)
        .bind(row.sequence)
        .bind(now)
        .bind(tenant_id)
        .bind(current.version)
        .execute(&mut *tx)
        .await
        .map_err(map_lock_error)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::ConcurrencyConflict(format!(
                "SMS balance for tenant {} changed during update",
                tenant_id
            )));
        }

        insert_transaction(&mut *tx, &row).await?;
        tx.commit().await.map_err(map_lock_error)?;

        let balance = SmsBalance {
            balance: row.balance_after,
            version: row.sequence,
            updated_at: now,
            ..current
        };
        Ok((balance, row))
    }

    async fn list_transactions(
        &self,
        tenant_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SmsTransaction>> {
        let rows = sqlx::query_as::<_, SmsTransaction>(&format!(
            "SELECT {} FROM sms_transactions WHERE tenant_id = ? \
             ORDER BY sequence DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_transactions(&self, tenant_id: StringUuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sms_transactions WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn ledger(&self, tenant_id: StringUuid) -> Result<Vec<SmsTransaction>> {
        let rows = sqlx::query_as::<_, SmsTransaction>(&format!(
            "SELECT {} FROM sms_transactions WHERE tenant_id = ? ORDER BY sequence ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn set_hold(&self, tenant_id: StringUuid, reason: Option<String>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sms_balances SET integrity_hold = ?, hold_reason = ?, updated_at = NOW() WHERE tenant_id = ?",
        )
        .bind(reason.is_some())
        .bind(reason)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "SMS balance for tenant {} not found",
                tenant_id
            )));
        }
        Ok(())
    }
}
