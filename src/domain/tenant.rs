//! Tenant domain model

use super::common::{impl_mysql_string_enum, Deletion, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Kind of business a tenant runs. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    #[default]
    Salon,
    Barbershop,
    Spa,
    Clinic,
    Other,
}

impl std::str::FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "salon" => Ok(BusinessType::Salon),
            "barbershop" => Ok(BusinessType::Barbershop),
            "spa" => Ok(BusinessType::Spa),
            "clinic" => Ok(BusinessType::Clinic),
            "other" => Ok(BusinessType::Other),
            _ => Err(format!("Unknown business type: {}", s)),
        }
    }
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BusinessType::Salon => "salon",
            BusinessType::Barbershop => "barbershop",
            BusinessType::Spa => "spa",
            BusinessType::Clinic => "clinic",
            BusinessType::Other => "other",
        };
        f.write_str(s)
    }
}

impl_mysql_string_enum!(BusinessType);

/// Tenant (company) entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: StringUuid,
    pub name: String,
    pub owner_id: StringUuid,
    pub business_type: BusinessType,
    pub is_active: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub deletion: Deletion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Active and not soft-deleted: the only tenants regular principals resolve to.
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.deletion.is_deleted
    }

    pub fn is_owned_by(&self, principal_id: StringUuid) -> bool {
        self.owner_id == principal_id
    }
}

impl Default for Tenant {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            owner_id: StringUuid::new_v4(),
            business_type: BusinessType::default(),
            is_active: true,
            deletion: Deletion::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a new tenant (signup)
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateTenantInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub business_type: BusinessType,
}
