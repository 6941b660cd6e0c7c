//! Tenant business logic

use crate::config::SubscriptionConfig;
use crate::domain::{
    CreateTenantInput, Principal, ProvisionedTenant, StringUuid, Tenant, TenantProvisioning,
};
use crate::error::{AppError, Result};
use crate::repository::{Scope, SubscriptionRepository, TenantRepository};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct TenantService<R: TenantRepository, S: SubscriptionRepository> {
    repo: Arc<R>,
    subscription_repo: Arc<S>,
    config: SubscriptionConfig,
}

impl<R: TenantRepository, S: SubscriptionRepository> TenantService<R, S> {
    pub fn new(repo: Arc<R>, subscription_repo: Arc<S>, config: SubscriptionConfig) -> Self {
        Self {
            repo,
            subscription_repo,
            config,
        }
    }

    /// Sign up a tenant for `owner`, seeding role permissions, a trial
    /// subscription and the SMS balance in the same transaction.
    pub async fn create(
        &self,
        owner: &Principal,
        input: CreateTenantInput,
        now: DateTime<Utc>,
    ) -> Result<ProvisionedTenant> {
        input.validate()?;

        if self.repo.find_owned_by(owner.id).await?.is_some() {
            return Err(AppError::Conflict(
                "Principal already owns an active tenant".to_string(),
            ));
        }

        let default_plan = self.subscription_repo.list_active_plans().await?.into_iter().next();
        if default_plan.is_none() {
            let err = AppError::Configuration("No active subscription plan in catalog".to_string());
            warn!(owner_id = %owner.id, error = %err, "Provisioning tenant without a subscription");
        }

        let tenant = Tenant {
            id: StringUuid::new_v4(),
            name: input.name.trim().to_string(),
            owner_id: owner.id,
            business_type: input.business_type,
            is_active: true,
            deletion: Default::default(),
            created_at: now,
            updated_at: now,
        };
        let plan = TenantProvisioning::plan(tenant, default_plan.as_ref(), now, self.config.trial_days);
        let provisioned = self.repo.create_provisioned(&plan).await?;

        counter!(
            "tenantry_tenants_provisioned_total",
            "subscription" => if provisioned.subscription.is_some() { "trial" } else { "none" }
        )
        .increment(1);
        info!(
            tenant_id = %provisioned.tenant.id,
            owner_id = %owner.id,
            plan_id = ?provisioned.subscription.as_ref().map(|s| s.plan_id),
            sms_balance = provisioned.sms_balance.balance,
            "Tenant provisioned"
        );
        Ok(provisioned)
    }

    pub async fn get(&self, id: StringUuid) -> Result<Tenant> {
        self.repo
            .find(Scope::tenant(id), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {} not found", id)))
    }

    /// Look up a tenant regardless of deletion state.
    pub async fn find_any(&self, id: StringUuid) -> Result<Tenant> {
        self.repo
            .find(Scope::unscoped().including_deleted(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {} not found", id)))
    }

    pub async fn soft_delete(
        &self,
        id: StringUuid,
        actor: Option<StringUuid>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.repo.soft_delete(id, actor, now).await?;
        info!(tenant_id = %id, actor = ?actor, "Tenant soft-deleted");
        Ok(())
    }

    /// Undo a soft delete. The owner may have signed up again meanwhile.
    pub async fn restore(&self, id: StringUuid) -> Result<Tenant> {
        let deleted = self
            .repo
            .find(Scope::unscoped().deleted_only(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deleted tenant {} not found", id)))?;

        if self.repo.find_owned_by(deleted.owner_id).await?.is_some() {
            return Err(AppError::Conflict(
                "Owner already has another active tenant".to_string(),
            ));
        }

        self.repo.restore(id).await?;
        info!(tenant_id = %id, "Tenant restored");
        self.get(id).await
    }
}
