//! Principals and their employment in tenants

use super::common::{impl_mysql_string_enum, Deletion, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Authenticated identity. Owned by the identity collaborator; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub id: StringUuid,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
}

impl Principal {
    /// Superusers and staff may select tenants they have no relation to.
    pub fn is_admin(&self) -> bool {
        self.is_superuser || self.is_staff
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self {
            id: StringUuid::new_v4(),
            email: String::new(),
            is_superuser: false,
            is_staff: false,
            is_active: true,
        }
    }
}

/// Employee privilege tier within a tenant, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleLevel {
    Basic,
    Low,
    Medium,
    High,
}

impl RoleLevel {
    pub const ALL: [RoleLevel; 4] = [
        RoleLevel::Basic,
        RoleLevel::Low,
        RoleLevel::Medium,
        RoleLevel::High,
    ];
}

impl std::str::FromStr for RoleLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BASIC" => Ok(RoleLevel::Basic),
            "LOW" => Ok(RoleLevel::Low),
            "MEDIUM" => Ok(RoleLevel::Medium),
            "HIGH" => Ok(RoleLevel::High),
            _ => Err(format!("Unknown role level: {}", s)),
        }
    }
}

impl std::fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoleLevel::Basic => "BASIC",
            RoleLevel::Low => "LOW",
            RoleLevel::Medium => "MEDIUM",
            RoleLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

impl_mysql_string_enum!(RoleLevel);

/// Link between a principal and a tenant they work for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Employment {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub principal_id: StringUuid,
    pub role_level: RoleLevel,
    pub is_active: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub deletion: Deletion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employment {
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.deletion.is_deleted
    }
}

impl Default for Employment {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            principal_id: StringUuid::new_v4(),
            role_level: RoleLevel::Basic,
            is_active: true,
            deletion: Deletion::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for hiring a principal into the current tenant
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateEmploymentInput {
    pub principal_id: StringUuid,
    pub role_level: RoleLevel,
}
