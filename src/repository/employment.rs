//! Employment repository

use super::map_conflict_if_duplicate;
use super::scope::{Scope, ScopedEntity, ScopedStore};
use crate::domain::{Employment, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

impl ScopedEntity for Employment {
    const TABLE: &'static str = "employments";
    const COLUMNS: &'static str = "id, tenant_id, principal_id, role_level, is_active, is_deleted, deleted_at, deleted_by, created_at, updated_at";
    const TENANT_COLUMN: &'static str = "tenant_id";
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmploymentRepository: Send + Sync {
    async fn find(&self, scope: Scope, id: StringUuid) -> Result<Option<Employment>>;
    async fn list(&self, scope: Scope) -> Result<Vec<Employment>>;
    /// The principal's active, non-deleted employment in `tenant_id`
    async fn find_in_tenant(
        &self,
        tenant_id: StringUuid,
        principal_id: StringUuid,
    ) -> Result<Option<Employment>>;
    /// The principal's active, non-deleted employment whose tenant is also usable
    async fn find_active_for_principal(&self, principal_id: StringUuid)
        -> Result<Option<Employment>>;
    /// Whether the principal has any employment visible through `scope`
    async fn exists_for_principal(&self, scope: Scope, principal_id: StringUuid) -> Result<bool>;
    async fn create(&self, employment: &Employment) -> Result<Employment>;
    async fn soft_delete(
        &self,
        id: StringUuid,
        actor: Option<StringUuid>,
        now: DateTime<Utc>,
    ) -> Result<()>;
    async fn restore(&self, id: StringUuid) -> Result<()>;
}

pub struct EmploymentRepositoryImpl {
    store: ScopedStore<Employment>,
}

impl EmploymentRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            store: ScopedStore::new(pool),
        }
    }
}

#[async_trait]
impl EmploymentRepository for EmploymentRepositoryImpl {
    async fn find(&self, scope: Scope, id: StringUuid) -> Result<Option<Employment>> {
        self.store.find(scope, id).await
    }

    async fn list(&self, scope: Scope) -> Result<Vec<Employment>> {
        self.store.list(scope).await
    }

    async fn find_in_tenant(
        &self,
        tenant_id: StringUuid,
        principal_id: StringUuid,
    ) -> Result<Option<Employment>> {
        let employment = sqlx::query_as::<_, Employment>(&format!(
            "SELECT {} FROM employments \
             WHERE tenant_id = ? AND principal_id = ? AND is_active = TRUE AND is_deleted = FALSE",
            Employment::COLUMNS
        ))
        .bind(tenant_id)
        .bind(principal_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(employment)
    }

    async fn find_active_for_principal(
        &self,
        principal_id: StringUuid,
    ) -> Result<Option<Employment>> {
        let employment = sqlx::query_as::<_, Employment>(
            r#"
            SELECT e.id, e.tenant_id, e.principal_id, e.role_level, e.is_active,
                   e.is_deleted, e.deleted_at, e.deleted_by, e.created_at, e.updated_at
            FROM employments e
            JOIN tenants t ON t.id = e.tenant_id
            WHERE e.principal_id = ? AND e.is_active = TRUE AND e.is_deleted = FALSE
              AND t.is_active = TRUE AND t.is_deleted = FALSE
            ORDER BY e.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(principal_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(employment)
    }

    async fn exists_for_principal(&self, scope: Scope, principal_id: StringUuid) -> Result<bool> {
        self.store.exists(scope, "principal_id", principal_id).await
    }

    async fn create(&self, employment: &Employment) -> Result<Employment> {
        sqlx::query(
            r#"
            INSERT INTO employments (id, tenant_id, principal_id, role_level, is_active, is_deleted, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, FALSE, ?, ?)
            "#,
        )
        .bind(employment.id)
        .bind(employment.tenant_id)
        .bind(employment.principal_id)
        .bind(employment.role_level)
        .bind(employment.is_active)
        .bind(employment.created_at)
        .bind(employment.updated_at)
        .execute(self.store.pool())
        .await
        .map_err(|e| {
            map_conflict_if_duplicate(
                e,
                &format!("Principal {} is already employed", employment.principal_id),
            )
        })?;

        self.find(Scope::tenant(employment.tenant_id), employment.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create employment")))
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
}
