//! Hiring and dismissing employees of a tenant

use crate::domain::{CreateEmploymentInput, Deletion, Employment, StringUuid, Tenant};
use crate::error::{AppError, Result};
use crate::repository::{EmploymentRepository, PrincipalRepository, Scope};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct EmploymentService<E: EmploymentRepository, P: PrincipalRepository> {
    repo: Arc<E>,
    principal_repo: Arc<P>,
}

impl<E: EmploymentRepository, P: PrincipalRepository> EmploymentService<E, P> {
    pub fn new(repo: Arc<E>, principal_repo: Arc<P>) -> Self {
        Self {
            repo,
            principal_repo,
        }
    }

    pub async fn list(&self, tenant_id: StringUuid) -> Result<Vec<Employment>> {
        self.repo.list(Scope::tenant(tenant_id)).await
    }

    pub async fn hire(
        &self,
        tenant: &Tenant,
        input: CreateEmploymentInput,
        now: DateTime<Utc>,
    ) -> Result<Employment> {
        input.validate()?;

        let principal = self
            .principal_repo
            .find_by_id(input.principal_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                AppError::NotFound(format!("Principal {} not found", input.principal_id))
            })?;

        if tenant.is_owned_by(principal.id) {
            return Err(AppError::Conflict(
                "The owner cannot be employed by their own tenant".to_string(),
            ));
        }
        self.ensure_not_employed(principal.id).await?;

        let employment = Employment {
            id: StringUuid::new_v4(),
            tenant_id: tenant.id,
            principal_id: principal.id,
            role_level: input.role_level,
            is_active: true,
            deletion: Deletion::default(),
            created_at: now,
            updated_at: now,
        };
        let created = self.repo.create(&employment).await?;
        info!(
            tenant_id = %tenant.id,
            principal_id = %principal.id,
            role_level = %created.role_level,
            "Employee hired"
        );
        Ok(created)
    }

    /// Soft delete; the record stays restorable.
    pub async fn dismiss(
        &self,
        tenant_id: StringUuid,
        id: StringUuid,
        actor: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.repo
            .find(Scope::tenant(tenant_id), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;

        self.repo.soft_delete(id, Some(actor), now).await?;
        info!(tenant_id = %tenant_id, employment_id = %id, actor = %actor, "Employee dismissed");
        Ok(())
    }

    pub async fn restore(&self, tenant_id: StringUuid, id: StringUuid) -> Result<Employment> {
        let deleted = self
            .repo
            .find(Scope::tenant(tenant_id).deleted_only(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dismissed employee {} not found", id)))?;

        self.ensure_not_employed(deleted.principal_id).await?;
        self.repo.restore(id).await?;

        self.repo
            .find(Scope::tenant(tenant_id), id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to restore employee")))
    }

    /// A principal holds at most one live employment.
    async fn ensure_not_employed(&self, principal_id: StringUuid) -> Result<()> {
        if self
            .repo
            .exists_for_principal(Scope::unscoped(), principal_id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Principal {} is already employed",
                principal_id
            )));
        }
        Ok(())
    }
}
