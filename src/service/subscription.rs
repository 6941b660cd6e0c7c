//! Subscription lifecycle and plan feature lookups

use crate::domain::{
    Feature, PlanFeatures, StringUuid, SubscriptionHistory, SubscriptionPlan, SubscriptionStatus,
    TenantSubscription,
};
use crate::error::{AppError, Result};
use crate::repository::SubscriptionRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

pub struct SubscriptionService<R: SubscriptionRepository> {
    repo: Arc<R>,
}

impl<R: SubscriptionRepository> SubscriptionService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        self.repo.list_active_plans().await
    }

    /// Lowest sort-order active plan, used for new tenants.
    pub async fn default_plan(&self) -> Result<Option<SubscriptionPlan>> {
        Ok(self.repo.list_active_plans().await?.into_iter().next())
    }

    pub async fn current(&self, tenant_id: StringUuid) -> Result<Option<TenantSubscription>> {
        self.repo.find_current(tenant_id).await
    }

    pub async fn history(&self, tenant_id: StringUuid) -> Result<Vec<SubscriptionHistory>> {
        self.repo.list_history(tenant_id).await
    }

    /// trial -> active. The paid period starts now.
    pub async fn activate(
        &self,
        tenant_id: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<TenantSubscription> {
        self.transition(tenant_id, SubscriptionStatus::Active, now).await
    }

    /// active -> cancelled
    pub async fn cancel(
        &self,
        tenant_id: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<TenantSubscription> {
        self.transition(tenant_id, SubscriptionStatus::Cancelled, now)
            .await
    }

    /// trial|active -> expired
    pub async fn expire(
        &self,
        tenant_id: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<TenantSubscription> {
        self.transition(tenant_id, SubscriptionStatus::Expired, now)
            .await
    }

    async fn transition(
        &self,
        tenant_id: StringUuid,
        to: SubscriptionStatus,
        now: DateTime<Utc>,
    ) -> Result<TenantSubscription> {
        let current = self.require_current(tenant_id).await?;
        let from = current.status;

        if !from.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "Cannot move subscription from {} to {}",
                from, to
            )));
        }
        // A lapsed subscription can only be expired, never revived or cancelled.
        if to != SubscriptionStatus::Expired
            && current.effective_status(now) == SubscriptionStatus::Expired
        {
            return Err(AppError::Conflict(
                "Subscription has already expired".to_string(),
            ));
        }

        let mut next = current.clone();
        next.status = to;
        next.updated_at = now;
        if to == SubscriptionStatus::Active {
            next.started_at = now;
            next.expires_at = now + current.billing_cycle.length();
        }

        if !self.repo.update_current(from, &next).await? {
            return Err(AppError::Conflict(
                "Subscription was modified concurrently".to_string(),
            ));
        }

        info!(tenant_id = %tenant_id, from = %from, to = %to, "Subscription status changed");
        Ok(next)
    }

    /// Switch to `plan_id`: a fresh active period at the plan's current price.
    /// The replaced row is archived in the same transaction.
    pub async fn change_plan(
        &self,
        tenant_id: StringUuid,
        plan_id: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<TenantSubscription> {
        let plan = self
            .repo
            .find_plan(plan_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))?;

        let next = TenantSubscription::activated(tenant_id, &plan, now);
        let archived = self.repo.replace_current(&next, now).await?;

        info!(
            tenant_id = %tenant_id,
            plan_id = %plan.id,
            previous_plan_id = ?archived.as_ref().map(|h| h.plan_id),
            "Subscription plan changed"
        );
        Ok(next)
    }

    /// Persist expiry for every overdue subscription. Intended for a periodic job.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let expired = self.repo.expire_due(now).await?;
        if expired > 0 {
            info!(count = expired, "Expired overdue subscriptions");
        }
        Ok(expired)
    }

    /// Features granted right now, or `None` when the tenant has no subscription
    /// or it is expired or cancelled.
    pub async fn enabled_features(
        &self,
        tenant_id: StringUuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PlanFeatures>> {
        let Some(current) = self.repo.find_current(tenant_id).await? else {
            return Ok(None);
        };
        if !current.grants_features(now) {
            return Ok(None);
        }
        let plan = self.repo.find_plan(current.plan_id).await?;
        Ok(plan.map(|p| p.features))
    }

    pub async fn is_feature_enabled(
        &self,
        tenant_id: StringUuid,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .enabled_features(tenant_id, now)
            .await?
            .is_some_and(|features| features.has(feature)))
    }

    async fn require_current(&self, tenant_id: StringUuid) -> Result<TenantSubscription> {
        self.repo.find_current(tenant_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Subscription for tenant {} not found", tenant_id))
        })
    }
}
