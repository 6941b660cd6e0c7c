//! Subscription catalog and per-tenant subscription lifecycle

use super::common::{impl_mysql_string_enum, StringUuid};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Named plan feature that gates capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SmsNotifications,
    AdvancedReports,
    MarketingCampaigns,
    Inventory,
    DataExport,
    OnlineBooking,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Feature::SmsNotifications => "sms_notifications",
            Feature::AdvancedReports => "advanced_reports",
            Feature::MarketingCampaigns => "marketing_campaigns",
            Feature::Inventory => "inventory",
            Feature::DataExport => "data_export",
            Feature::OnlineBooking => "online_booking",
        };
        f.write_str(s)
    }
}

/// Feature flags carried by a plan, stored as JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeatures {
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default)]
    pub advanced_reports: bool,
    #[serde(default)]
    pub marketing_campaigns: bool,
    #[serde(default)]
    pub inventory: bool,
    #[serde(default)]
    pub data_export: bool,
    #[serde(default)]
    pub online_booking: bool,
}

impl PlanFeatures {
    pub fn all() -> Self {
        Self {
            sms_notifications: true,
            advanced_reports: true,
            marketing_campaigns: true,
            inventory: true,
            data_export: true,
            online_booking: true,
        }
    }

    pub fn has(&self, feature: Feature) -> bool {
        match feature {
            Feature::SmsNotifications => self.sms_notifications,
            Feature::AdvancedReports => self.advanced_reports,
            Feature::MarketingCampaigns => self.marketing_campaigns,
            Feature::Inventory => self.inventory,
            Feature::DataExport => self.data_export,
            Feature::OnlineBooking => self.online_booking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn length(self) -> Duration {
        match self {
            BillingCycle::Monthly => Duration::days(30),
            BillingCycle::Quarterly => Duration::days(90),
            BillingCycle::Yearly => Duration::days(365),
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(BillingCycle::Monthly),
            "quarterly" => Ok(BillingCycle::Quarterly),
            "yearly" => Ok(BillingCycle::Yearly),
            _ => Err(format!("Unknown billing cycle: {}", s)),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

impl_mysql_string_enum!(BillingCycle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    /// Trial and active are the only states that can still move.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubscriptionStatus::Expired | SubscriptionStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, next),
            (Trial, Active) | (Active, Cancelled) | (Trial, Expired) | (Active, Expired)
        )
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trial" => Ok(SubscriptionStatus::Trial),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            _ => Err(format!("Unknown subscription status: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl_mysql_string_enum!(SubscriptionStatus);

/// Catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: StringUuid,
    pub name: String,
    /// Minor currency units
    pub price: i64,
    pub billing_cycle: BillingCycle,
    #[sqlx(json)]
    pub features: PlanFeatures,
    pub welcome_sms_bonus: i64,
    pub sort_order: i32,
    pub is_active: bool,
}

impl Default for SubscriptionPlan {
    fn default() -> Self {
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            price: 0,
            billing_cycle: BillingCycle::default(),
            features: PlanFeatures::default(),
            welcome_sms_bonus: 0,
            sort_order: 0,
            is_active: true,
        }
    }
}

/// The current subscription of a tenant. One row per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TenantSubscription {
    pub tenant_id: StringUuid,
    pub plan_id: StringUuid,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub price_snapshot: i64,
    pub billing_cycle: BillingCycle,
    pub updated_at: DateTime<Utc>,
}

impl TenantSubscription {
    /// Trial subscription granted when a tenant signs up.
    pub fn trial(
        tenant_id: StringUuid,
        plan: &SubscriptionPlan,
        now: DateTime<Utc>,
        trial_days: i64,
    ) -> Self {
        Self {
            tenant_id,
            plan_id: plan.id,
            status: SubscriptionStatus::Trial,
            started_at: now,
            expires_at: now + Duration::days(trial_days),
            price_snapshot: plan.price,
            billing_cycle: plan.billing_cycle,
            updated_at: now,
        }
    }

    /// Paid subscription starting at `now` for one billing cycle.
    pub fn activated(tenant_id: StringUuid, plan: &SubscriptionPlan, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            plan_id: plan.id,
            status: SubscriptionStatus::Active,
            started_at: now,
            expires_at: now + plan.billing_cycle.length(),
            price_snapshot: plan.price,
            billing_cycle: plan.billing_cycle,
            updated_at: now,
        }
    }

    /// Stored status with expiry applied at read time.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        if !self.status.is_terminal() && self.expires_at <= now {
            SubscriptionStatus::Expired
        } else {
            self.status
        }
    }

    pub fn grants_features(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        )
    }
}

/// Archived copy of a replaced current subscription. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SubscriptionHistory {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub plan_id: StringUuid,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub price_snapshot: i64,
    pub billing_cycle: BillingCycle,
    pub archived_at: DateTime<Utc>,
}

impl SubscriptionHistory {
    pub fn archive(current: &TenantSubscription, now: DateTime<Utc>) -> Self {
        Self {
            id: StringUuid::new_v4(),
            tenant_id: current.tenant_id,
            plan_id: current.plan_id,
            status: current.status,
            started_at: current.started_at,
            expires_at: current.expires_at,
            price_snapshot: current.price_snapshot,
            billing_cycle: current.billing_cycle,
            archived_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ChangePlanInput {
    pub plan_id: StringUuid,
}
