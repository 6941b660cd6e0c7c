//! Capabilities, their subscription gating, and per-role permission records
//!
//! The capability set is closed: every capability is a column of
//! `role_permission_sets` and a field of [`RolePermissionSet`]. Adding one is a
//! schema change.

use super::common::StringUuid;
use super::principal::RoleLevel;
use super::subscription::Feature;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewAppointments,
    ManageAppointments,
    ViewClients,
    ManageClients,
    ViewOwnSchedule,
    ManageServices,
    ManageStaff,
    ManageSettings,
    ViewFinancials,
    ManagePermissions,
    SendSms,
    ViewReports,
    ManageMarketing,
    ManageInventory,
    ExportData,
    ManageOnlineBooking,
}

/// How a capability interacts with the tenant's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityClass {
    /// Never consults the subscription
    AlwaysAvailable,
    /// Stored flag only
    Standard,
    /// Stored flag AND the plan must expose the feature
    FeatureGated(Feature),
}

impl Capability {
    pub const COUNT: usize = 16;

    pub const ALL: [Capability; Capability::COUNT] = [
        Capability::ViewAppointments,
        Capability::ManageAppointments,
        Capability::ViewClients,
        Capability::ManageClients,
        Capability::ViewOwnSchedule,
        Capability::ManageServices,
        Capability::ManageStaff,
        Capability::ManageSettings,
        Capability::ViewFinancials,
        Capability::ManagePermissions,
        Capability::SendSms,
        Capability::ViewReports,
        Capability::ManageMarketing,
        Capability::ManageInventory,
        Capability::ExportData,
        Capability::ManageOnlineBooking,
    ];

    /// Static capability -> feature table.
    pub fn class(self) -> CapabilityClass {
        use Capability::*;
        match self {
            ViewAppointments | ManageAppointments | ViewClients | ManageClients
            | ViewOwnSchedule => CapabilityClass::AlwaysAvailable,
            ManageServices | ManageStaff | ManageSettings | ViewFinancials
            | ManagePermissions => CapabilityClass::Standard,
            SendSms => CapabilityClass::FeatureGated(Feature::SmsNotifications),
            ViewReports => CapabilityClass::FeatureGated(Feature::AdvancedReports),
            ManageMarketing => CapabilityClass::FeatureGated(Feature::MarketingCampaigns),
            ManageInventory => CapabilityClass::FeatureGated(Feature::Inventory),
            ExportData => CapabilityClass::FeatureGated(Feature::DataExport),
            ManageOnlineBooking => CapabilityClass::FeatureGated(Feature::OnlineBooking),
        }
    }

    pub fn gating_feature(self) -> Option<Feature> {
        match self.class() {
            CapabilityClass::FeatureGated(feature) => Some(feature),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        use Capability::*;
        match self {
            ViewAppointments => "view_appointments",
            ManageAppointments => "manage_appointments",
            ViewClients => "view_clients",
            ManageClients => "manage_clients",
            ViewOwnSchedule => "view_own_schedule",
            ManageServices => "manage_services",
            ManageStaff => "manage_staff",
            ManageSettings => "manage_settings",
            ViewFinancials => "view_financials",
            ManagePermissions => "manage_permissions",
            SendSms => "send_sms",
            ViewReports => "view_reports",
            ManageMarketing => "manage_marketing",
            ManageInventory => "manage_inventory",
            ExportData => "export_data",
            ManageOnlineBooking => "manage_online_booking",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        let needle = needle.strip_prefix("can_").unwrap_or(&needle);
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("Unknown capability: {}", s))
    }
}

/// Fixed-size capability -> bool map, serialized as a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityMap([bool; Capability::COUNT]);

impl CapabilityMap {
    pub fn all_granted() -> Self {
        Self([true; Capability::COUNT])
    }

    pub fn get(&self, capability: Capability) -> bool {
        self.0[capability.index()]
    }

    pub fn set(&mut self, capability: Capability, value: bool) {
        self.0[capability.index()] = value;
    }

    pub fn granted(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.get(*c))
    }
}

impl Serialize for CapabilityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Capability::COUNT))?;
        for capability in Capability::ALL {
            map.serialize_entry(capability.as_str(), &self.get(capability))?;
        }
        map.end()
    }
}

/// Result of `effective_permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "capabilities", rename_all = "snake_case")]
pub enum EffectivePermissions {
    /// Owners and superusers: every capability, no per-role record involved
    All,
    /// Employees (or unrelated principals): concrete map, gating applied
    Granted(CapabilityMap),
}

impl EffectivePermissions {
    pub fn allows(&self, capability: Capability) -> bool {
        match self {
            EffectivePermissions::All => true,
            EffectivePermissions::Granted(map) => map.get(capability),
        }
    }

    pub fn to_map(&self) -> CapabilityMap {
        match self {
            EffectivePermissions::All => CapabilityMap::all_granted(),
            EffectivePermissions::Granted(map) => *map,
        }
    }
}

/// Per-tenant, per-role-level capability flags. Exactly four rows per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RolePermissionSet {
    pub tenant_id: StringUuid,
    pub role_level: RoleLevel,
    pub view_appointments: bool,
    pub manage_appointments: bool,
    pub view_clients: bool,
    pub manage_clients: bool,
    pub view_own_schedule: bool,
    pub manage_services: bool,
    pub manage_staff: bool,
    pub manage_settings: bool,
    pub view_financials: bool,
    pub manage_permissions: bool,
    pub send_sms: bool,
    pub view_reports: bool,
    pub manage_marketing: bool,
    pub manage_inventory: bool,
    pub export_data: bool,
    pub manage_online_booking: bool,
    pub updated_at: DateTime<Utc>,
}

impl RolePermissionSet {
    /// Seed values applied at tenant creation and on reset.
    pub fn defaults(tenant_id: StringUuid, role_level: RoleLevel) -> Self {
        let mut set = Self {
            tenant_id,
            role_level,
            view_appointments: false,
            manage_appointments: false,
            view_clients: false,
            manage_clients: false,
            view_own_schedule: false,
            manage_services: false,
            manage_staff: false,
            manage_settings: false,
            view_financials: false,
            manage_permissions: false,
            send_sms: false,
            view_reports: false,
            manage_marketing: false,
            manage_inventory: false,
            export_data: false,
            manage_online_booking: false,
            updated_at: Utc::now(),
        };

        use Capability::*;
        let granted: &[Capability] = match role_level {
            RoleLevel::Basic => &[ViewAppointments, ViewOwnSchedule, ViewClients],
            RoleLevel::Low => &[
                ViewAppointments,
                ViewOwnSchedule,
                ViewClients,
                ManageAppointments,
                ManageClients,
            ],
            RoleLevel::Medium => &[
                ViewAppointments,
                ViewOwnSchedule,
                ViewClients,
                ManageAppointments,
                ManageClients,
                ManageServices,
                SendSms,
                ViewReports,
                ManageInventory,
            ],
            // Everything but permission administration, which stays with owners
            RoleLevel::High => &[
                ViewAppointments,
                ViewOwnSchedule,
                ViewClients,
                ManageAppointments,
                ManageClients,
                ManageServices,
                ManageStaff,
                ManageSettings,
                ViewFinancials,
                SendSms,
                ViewReports,
                ManageMarketing,
                ManageInventory,
                ExportData,
                ManageOnlineBooking,
            ],
        };
        for capability in granted {
            set.set(*capability, true);
        }
        set
    }

    pub fn get(&self, capability: Capability) -> bool {
        use Capability::*;
        match capability {
            ViewAppointments => self.view_appointments,
            ManageAppointments => self.manage_appointments,
            ViewClients => self.view_clients,
            ManageClients => self.manage_clients,
            ViewOwnSchedule => self.view_own_schedule,
            ManageServices => self.manage_services,
            ManageStaff => self.manage_staff,
            ManageSettings => self.manage_settings,
            ViewFinancials => self.view_financials,
            ManagePermissions => self.manage_permissions,
            SendSms => self.send_sms,
            ViewReports => self.view_reports,
            ManageMarketing => self.manage_marketing,
            ManageInventory => self.manage_inventory,
            ExportData => self.export_data,
            ManageOnlineBooking => self.manage_online_booking,
        }
    }

    pub fn set(&mut self, capability: Capability, value: bool) {
        use Capability::*;
        let slot = match capability {
            ViewAppointments => &mut self.view_appointments,
            ManageAppointments => &mut self.manage_appointments,
            ViewClients => &mut self.view_clients,
            ManageClients => &mut self.manage_clients,
            ViewOwnSchedule => &mut self.view_own_schedule,
            ManageServices => &mut self.manage_services,
            ManageStaff => &mut self.manage_staff,
            ManageSettings => &mut self.manage_settings,
            ViewFinancials => &mut self.view_financials,
            ManagePermissions => &mut self.manage_permissions,
            SendSms => &mut self.send_sms,
            ViewReports => &mut self.view_reports,
            ManageMarketing => &mut self.manage_marketing,
            ManageInventory => &mut self.manage_inventory,
            ExportData => &mut self.export_data,
            ManageOnlineBooking => &mut self.manage_online_booking,
        };
        *slot = value;
    }

    /// Stored flags as a map, before any subscription gating.
    pub fn stored_flags(&self) -> CapabilityMap {
        let mut map = CapabilityMap::default();
        for capability in Capability::ALL {
            map.set(capability, self.get(capability));
        }
        map
    }
}

/// Partial update of a role's flags
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateRolePermissionsInput {
    pub flags: HashMap<Capability, bool>,
}
