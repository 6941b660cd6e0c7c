//! Subscription catalog, current subscriptions and their history

use crate::domain::{
    StringUuid, SubscriptionHistory, SubscriptionPlan, SubscriptionStatus, TenantSubscription,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool};

const PLAN_COLUMNS: &str =
    "id, name, price, billing_cycle, features, welcome_sms_bonus, sort_order, is_active";
const CURRENT_COLUMNS: &str = "tenant_id, plan_id, status, started_at, expires_at, price_snapshot, billing_cycle, updated_at";
const HISTORY_COLUMNS: &str = "id, tenant_id, plan_id, status, started_at, expires_at, price_snapshot, billing_cycle, archived_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Active catalog entries ordered by sort_order
    async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>>;
    async fn find_plan(&self, id: StringUuid) -> Result<Option<SubscriptionPlan>>;
    async fn find_current(&self, tenant_id: StringUuid) -> Result<Option<TenantSubscription>>;
    /// Overwrite the current row if its stored status is still `expected`.
    /// Returns false when another writer moved it first.
    async fn update_current(
        &self,
        expected: SubscriptionStatus,
        next: &TenantSubscription,
    ) -> Result<bool>;
    /// Archive the existing current row (if any) and install `next`, in one transaction
    async fn replace_current(
        &self,
        next: &TenantSubscription,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionHistory>>;
    /// Newest first
    async fn list_history(&self, tenant_id: StringUuid) -> Result<Vec<SubscriptionHistory>>;
    /// Mark every overdue trial/active row expired; returns the number changed
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SubscriptionRepositoryImpl {
    pool: MySqlPool,
}

impl SubscriptionRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_current_subscription(
    conn: &mut MySqlConnection,
    sub: &TenantSubscription,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tenant_subscriptions (tenant_id, plan_id, status, started_at, expires_at, price_snapshot, billing_cycle, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(sub.tenant_id)
    .bind(sub.plan_id)
    .bind(sub.status)
    .bind(sub.started_at)
    .bind(sub.expires_at)
    .bind(sub.price_snapshot)
    .bind(sub.billing_cycle)
    .bind(sub.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl SubscriptionRepository for SubscriptionRepositoryImpl {
    async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {} FROM subscription_plans WHERE is_active = TRUE ORDER BY sort_order ASC, name ASC",
            PLAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    async fn find_plan(&self, id: StringUuid) -> Result<Option<SubscriptionPlan>> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {} FROM subscription_plans WHERE id = ?",
            PLAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn find_current(&self, tenant_id: StringUuid) -> Result<Option<TenantSubscription>> {
        let sub = sqlx::query_as::<_, TenantSubscription>(&format!(
            "SELECT {} FROM tenant_subscriptions WHERE tenant_id = ?",
            CURRENT_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn update_current(
        &self,
        expected: SubscriptionStatus,
        next: &TenantSubscription,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_subscriptions
            SET status = ?, started_at = ?, expires_at = ?, updated_at = ?
            WHERE tenant_id = ? AND plan_id = ? AND status = ?
            "#,
        )
        .bind(next.status)
        .bind(next.started_at)
        .bind(next.expires_at)
        .bind(next.updated_at)
        .bind(next.tenant_id)
        .bind(next.plan_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_current(
        &self,
        next: &TenantSubscription,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionHistory>> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, TenantSubscription>(&format!(
            "SELECT {} FROM tenant_subscriptions WHERE tenant_id = ? FOR UPDATE",
            CURRENT_COLUMNS
        ))
        .bind(next.tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let archived = match existing {
            Some(current) => {
                let history = SubscriptionHistory::archive(&current, now);
                sqlx::query(
                    r#"
                    INSERT INTO subscription_history (id, tenant_id, plan_id, status, started_at, expires_at, price_snapshot, billing_cycle, archived_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(history.id)
                .bind(history.tenant_id)
                .bind(history.plan_id)
                .bind(history.status)
                .bind(history.started_at)
                .bind(history.expires_at)
                .bind(history.price_snapshot)
                .bind(history.billing_cycle)
                .bind(history.archived_at)
                .execute(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM tenant_subscriptions WHERE tenant_id = ?")
                    .bind(next.tenant_id)
                    .execute(&mut *tx)
                    .await?;
                Some(history)
            }
            None => None,
        };

        insert_current_subscription(&mut *tx, next).await?;
        tx.commit().await?;

        Ok(archived)
    }

    async fn list_history(&self, tenant_id: StringUuid) -> Result<Vec<SubscriptionHistory>> {
        let rows = sqlx::query_as::<_, SubscriptionHistory>(&format!(
            "SELECT {} FROM subscription_history WHERE tenant_id = ? ORDER BY archived_at DESC",
            HISTORY_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_subscriptions
            SET status = 'expired', updated_at = ?
            WHERE status IN ('trial', 'active') AND expires_at <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
