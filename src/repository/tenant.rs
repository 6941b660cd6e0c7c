//! Tenant repository

use super::role_permission::insert_role_permission_set;
use super::map_conflict_if_duplicate;
use super::scope::{Scope, ScopedEntity, ScopedStore};
use super::sms::{insert_transaction, select_balance};
use super::subscription::insert_current_subscription;
use crate::domain::{
    LedgerMutation, ProvisionedTenant, SmsBalance, SmsTransactionType, StringUuid, Tenant,
    TenantProvisioning,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

impl ScopedEntity for Tenant {
    const TABLE: &'static str = "tenants";
    const COLUMNS: &'static str = "id, name, owner_id, business_type, is_active, is_deleted, deleted_at, deleted_by, created_at, updated_at";
    const TENANT_COLUMN: &'static str = "id";
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find(&self, scope: Scope, id: StringUuid) -> Result<Option<Tenant>>;
    async fn list(&self, scope: Scope) -> Result<Vec<Tenant>>;
    /// The active, non-deleted tenant owned by `owner_id`
    async fn find_owned_by(&self, owner_id: StringUuid) -> Result<Option<Tenant>>;
    /// Insert the tenant together with its seeded rows in one transaction
    async fn create_provisioned(&self, plan: &TenantProvisioning) -> Result<ProvisionedTenant>;
    async fn soft_delete(
        &self,
        id: StringUuid,
        actor: Option<StringUuid>,
        now: DateTime<Utc>,
    ) -> Result<()>;
    async fn restore(&self, id: StringUuid) -> Result<()>;
    async fn hard_delete(&self, id: StringUuid) -> Result<()>;
}

pub struct TenantRepositoryImpl {
    store: ScopedStore<Tenant>,
}

impl TenantRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            store: ScopedStore::new(pool),
        }
    }
}

#[async_trait]
impl TenantRepository for TenantRepositoryImpl {
    async fn find(&self, scope: Scope, id: StringUuid) -> Result<Option<Tenant>> {
        self.store.find(scope, id).await
    }

    async fn list(&self, scope: Scope) -> Result<Vec<Tenant>> {
        self.store.list(scope).await
    }

    async fn find_owned_by(&self, owner_id: StringUuid) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE owner_id = ? AND is_active = TRUE AND is_deleted = FALSE \
             ORDER BY created_at ASC LIMIT 1",
            Tenant::COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(tenant)
    }

    async fn create_provisioned(&self, plan: &TenantProvisioning) -> Result<ProvisionedTenant> {
        let tenant = &plan.tenant;
        let now = tenant.created_at;
        let mut tx = self.store.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, owner_id, business_type, is_active, is_deleted, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, FALSE, ?, ?)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(tenant.owner_id)
        .bind(tenant.business_type)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_conflict_if_duplicate(e, "Principal already owns an active tenant"))?;

        for set in &plan.role_permissions {
            insert_role_permission_set(&mut *tx, set).await?;
        }

        if let Some(subscription) = &plan.subscription {
            insert_current_subscription(&mut *tx, subscription).await?;
        }

        // A balance row may already exist; only a freshly created one receives the bonus entry.
        let seeded_version: i64 = if plan.welcome_bonus > 0 { 1 } else { 0 };
        let created = sqlx::query(
            r#"
            INSERT IGNORE INTO sms_balances (tenant_id, balance, version, integrity_hold, hold_reason, updated_at)
            VALUES (?, ?, ?, FALSE, NULL, ?)
            "#,
        )
        .bind(tenant.id)
        .bind(plan.welcome_bonus)
        .bind(seeded_version)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let mut bonus_transaction = None;
        if created && plan.welcome_bonus > 0 {
            let row = LedgerMutation {
                transaction_type: SmsTransactionType::Bonus,
                delta: plan.welcome_bonus,
                description: "Welcome bonus".to_string(),
                created_by: None,
            }
            .to_transaction(&SmsBalance::new(tenant.id, now), now);
            insert_transaction(&mut *tx, &row).await?;
            bonus_transaction = Some(row);
        }

        let sms_balance = select_balance(&mut *tx, tenant.id, false)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("SMS balance missing after provisioning")))?;

        tx.commit().await?;

        Ok(ProvisionedTenant {
            tenant: tenant.clone(),
            subscription: plan.subscription.clone(),
            sms_balance,
            bonus_transaction,
        })
    }

    async fn soft_delete(
        &self,
        id: StringUuid,
        actor: Option<StringUuid>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.soft_delete(id, actor, now).await
    }

    async fn restore(&self, id: StringUuid) -> Result<()> {
        self.store.restore(id).await
    }

    async fn hard_delete(&self, id: StringUuid) -> Result<()> {
        self.store.hard_delete(id).await
    }
}
