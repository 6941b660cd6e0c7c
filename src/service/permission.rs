//! Authorization decisions and role permission administration

use crate::config::TenancyConfig;
use crate::domain::{
    Capability, CapabilityClass, CapabilityMap, EffectivePermissions, Principal, RoleLevel,
    RolePermissionSet, StringUuid, Tenant,
};
use crate::error::{AppError, Result};
use crate::repository::{EmploymentRepository, RolePermissionRepository, SubscriptionRepository};
use crate::service::context::ambient;
use crate::service::SubscriptionService;
use chrono::Utc;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which rule settled a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRule {
    Superuser,
    Impersonation,
    NoTenant,
    Owner,
    RoleFlag,
    FeatureGate,
    NoEmployment,
    Error,
}

impl DecisionRule {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionRule::Superuser => "superuser",
            DecisionRule::Impersonation => "impersonation",
            DecisionRule::NoTenant => "no_tenant",
            DecisionRule::Owner => "owner",
            DecisionRule::RoleFlag => "role_flag",
            DecisionRule::FeatureGate => "feature_gate",
            DecisionRule::NoEmployment => "no_employment",
            DecisionRule::Error => "error",
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub rule: DecisionRule,
}

impl Decision {
    fn allow(rule: DecisionRule) -> Self {
        Self {
            allowed: true,
            rule,
        }
    }

    fn deny(rule: DecisionRule) -> Self {
        Self {
            allowed: false,
            rule,
        }
    }
}

pub struct PermissionEngine<
    E: EmploymentRepository,
    R: RolePermissionRepository,
    S: SubscriptionRepository,
> {
    employments: Arc<E>,
    role_permissions: Arc<R>,
    subscriptions: Arc<SubscriptionService<S>>,
    config: TenancyConfig,
}

impl<E: EmploymentRepository, R: RolePermissionRepository, S: SubscriptionRepository>
    PermissionEngine<E, R, S>
{
    pub fn new(
        employments: Arc<E>,
        role_permissions: Arc<R>,
        subscriptions: Arc<SubscriptionService<S>>,
        config: TenancyConfig,
    ) -> Self {
        Self {
            employments,
            role_permissions,
            subscriptions,
            config,
        }
    }

    /// Whether `principal` may exercise `capability` in `tenant`.
    ///
    /// Never fails: any lookup error denies.
    pub async fn authorize(
        &self,
        principal: &Principal,
        capability: Capability,
        tenant: Option<&Tenant>,
    ) -> bool {
        let decision = match self.decide(principal, capability, tenant).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    principal_id = %principal.id,
                    capability = %capability,
                    error = %e,
                    "Authorization lookup failed; denying"
                );
                Decision::deny(DecisionRule::Error)
            }
        };

        counter!(
            "tenantry_authorization_decisions_total",
            "rule" => decision.rule.as_str(),
            "allowed" => if decision.allowed { "true" } else { "false" }
        )
        .increment(1);
        debug!(
            principal_id = %principal.id,
            tenant_id = ?tenant.map(|t| t.id),
            capability = %capability,
            rule = decision.rule.as_str(),
            allowed = decision.allowed,
            "Authorization decision"
        );

        decision.allowed
    }

    /// First matching rule wins.
    pub async fn decide(
        &self,
        principal: &Principal,
        capability: Capability,
        tenant: Option<&Tenant>,
    ) -> Result<Decision> {
        if principal.is_superuser {
            return Ok(Decision::allow(DecisionRule::Superuser));
        }
        let Some(tenant) = tenant else {
            return Ok(Decision::deny(DecisionRule::NoTenant));
        };
        if self.is_impersonating(principal, tenant) {
            return Ok(Decision::allow(DecisionRule::Impersonation));
        }
        if tenant.is_owned_by(principal.id) {
            return Ok(Decision::allow(DecisionRule::Owner));
        }

        let Some(set) = self.role_set_for(principal, tenant).await? else {
            return Ok(Decision::deny(DecisionRule::NoEmployment));
        };

        let stored = set.get(capability);
        match capability.class() {
            CapabilityClass::AlwaysAvailable | CapabilityClass::Standard => {
                Ok(Decision {
                    allowed: stored,
                    rule: DecisionRule::RoleFlag,
                })
            }
            CapabilityClass::FeatureGated(feature) => {
                if !stored {
                    return Ok(Decision::deny(DecisionRule::RoleFlag));
                }
                let enabled = self
                    .subscriptions
                    .is_feature_enabled(tenant.id, feature, Utc::now())
                    .await?;
                Ok(Decision {
                    allowed: enabled,
                    rule: DecisionRule::FeatureGate,
                })
            }
        }
    }

    /// Every capability the principal holds in `tenant`, with feature gating applied.
    pub async fn effective_permissions(
        &self,
        principal: &Principal,
        tenant: Option<&Tenant>,
    ) -> Result<EffectivePermissions> {
        if principal.is_superuser {
            return Ok(EffectivePermissions::All);
        }
        let Some(tenant) = tenant else {
            return Ok(EffectivePermissions::Granted(CapabilityMap::default()));
        };
        if self.is_impersonating(principal, tenant) || tenant.is_owned_by(principal.id) {
            return Ok(EffectivePermissions::All);
        }

        let Some(set) = self.role_set_for(principal, tenant).await? else {
            return Ok(EffectivePermissions::Granted(CapabilityMap::default()));
        };

        let features = self
            .subscriptions
            .enabled_features(tenant.id, Utc::now())
            .await?;

        let mut map = CapabilityMap::default();
        for capability in Capability::ALL {
            let granted = set.get(capability)
                && match capability.class() {
                    CapabilityClass::FeatureGated(feature) => {
                        features.is_some_and(|f| f.has(feature))
                    }
                    _ => true,
                };
            map.set(capability, granted);
        }
        Ok(EffectivePermissions::Granted(map))
    }

    /// Staff acting on a tenant they explicitly selected for this request.
    fn is_impersonating(&self, principal: &Principal, tenant: &Tenant) -> bool {
        principal.is_admin()
            && self.config.admin_bypass
            && ambient::is_impersonating()
            && ambient::current_tenant_id() == Some(tenant.id)
    }

    async fn role_set_for(
        &self,
        principal: &Principal,
        tenant: &Tenant,
    ) -> Result<Option<RolePermissionSet>> {
        if !tenant.is_usable() {
            return Ok(None);
        }
        let Some(employment) = self
            .employments
            .find_in_tenant(tenant.id, principal.id)
            .await?
        else {
            return Ok(None);
        };
        if !employment.is_usable() {
            return Ok(None);
        }
        self.role_permissions
            .find(tenant.id, employment.role_level)
            .await
    }
}

/// Per-tenant editing of role permission flags
pub struct RolePermissionService<R: RolePermissionRepository> {
    repo: Arc<R>,
}

impl<R: RolePermissionRepository> RolePermissionService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, tenant_id: StringUuid) -> Result<Vec<RolePermissionSet>> {
        self.repo.list(tenant_id).await
    }

    pub async fn update(
        &self,
        tenant_id: StringUuid,
        role_level: RoleLevel,
        flags: &HashMap<Capability, bool>,
    ) -> Result<RolePermissionSet> {
        let mut set = self.require(tenant_id, role_level).await?;
        for (capability, value) in flags {
            set.set(*capability, *value);
        }
        set.updated_at = Utc::now();
        let saved = self.repo.save(&set).await?;
        info!(tenant_id = %tenant_id, role_level = %role_level, changed = flags.len(), "Role permissions updated");
        Ok(saved)
    }

    /// Restore the seeded defaults for one role level.
    pub async fn reset(
        &self,
        tenant_id: StringUuid,
        role_level: RoleLevel,
    ) -> Result<RolePermissionSet> {
        self.require(tenant_id, role_level).await?;
        let mut defaults = RolePermissionSet::defaults(tenant_id, role_level);
        defaults.updated_at = Utc::now();
        let saved = self.repo.save(&defaults).await?;
        info!(tenant_id = %tenant_id, role_level = %role_level, "Role permissions reset");
        Ok(saved)
    }

    async fn require(
        &self,
        tenant_id: StringUuid,
        role_level: RoleLevel,
    ) -> Result<RolePermissionSet> {
        self.repo.find(tenant_id, role_level).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "Role permissions for {} in tenant {} not found",
                role_level, tenant_id
            ))
        })
    }
}
