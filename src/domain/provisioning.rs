//! Everything created alongside a new tenant, persisted as one unit

use super::capability::RolePermissionSet;
use super::principal::RoleLevel;
use super::sms::{SmsBalance, SmsTransaction};
use super::subscription::{SubscriptionPlan, TenantSubscription};
use super::tenant::Tenant;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Rows to insert when a tenant signs up.
#[derive(Debug, Clone)]
pub struct TenantProvisioning {
    pub tenant: Tenant,
    /// `None` when the catalog has no active plan
    pub subscription: Option<TenantSubscription>,
    /// Starting SMS balance, also recorded as a bonus transaction when positive
    pub welcome_bonus: i64,
    pub role_permissions: Vec<RolePermissionSet>,
}

impl TenantProvisioning {
    pub fn plan(
        tenant: Tenant,
        default_plan: Option<&SubscriptionPlan>,
        now: DateTime<Utc>,
        trial_days: i64,
    ) -> Self {
        let subscription =
            default_plan.map(|plan| TenantSubscription::trial(tenant.id, plan, now, trial_days));
        let welcome_bonus = default_plan.map(|p| p.welcome_sms_bonus.max(0)).unwrap_or(0);
        let role_permissions = RoleLevel::ALL
            .iter()
            .map(|level| {
                let mut set = RolePermissionSet::defaults(tenant.id, *level);
                set.updated_at = now;
                set
            })
            .collect();

        Self {
            tenant,
            subscription,
            welcome_bonus,
            role_permissions,
        }
    }
}

/// What `create_provisioned` actually wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub subscription: Option<TenantSubscription>,
    pub sms_balance: SmsBalance,
    pub bonus_transaction: Option<SmsTransaction>,
}
