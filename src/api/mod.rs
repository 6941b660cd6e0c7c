//! REST API shared utilities (response types, pagination, guards)

pub mod context;
pub mod employee;
pub mod health;
pub mod metrics;
pub mod permission;
pub mod role_permission;
pub mod sms;
pub mod subscription;
pub mod tenant;

use crate::domain::{Capability, Principal, Tenant};
use crate::error::{AppError, Result};
use crate::state::HasServices;
use serde::{Deserialize, Serialize};

/// Maximum allowed per_page value for pagination
pub(crate) const MAX_PER_PAGE: i64 = 100;

/// Deny unless `principal` holds at least one of `capabilities` in `tenant`.
pub(crate) async fn require_any_capability<S: HasServices>(
    state: &S,
    principal: &Principal,
    tenant: &Tenant,
    capabilities: &[Capability],
) -> Result<()> {
    let engine = state.permission_engine();
    for capability in capabilities {
        if engine.authorize(principal, *capability, Some(tenant)).await {
            return Ok(());
        }
    }
    Err(AppError::Forbidden(format!(
        "Missing capability: {}",
        capabilities
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(" or ")
    )))
}

pub(crate) async fn require_capability<S: HasServices>(
    state: &S,
    principal: &Principal,
    tenant: &Tenant,
    capability: Capability,
) -> Result<()> {
    require_any_capability(state, principal, tenant, &[capability]).await
}

pub(crate) fn require_superuser(principal: &Principal) -> Result<()> {
    if principal.is_superuser {
        Ok(())
    } else {
        Err(AppError::Forbidden("Superuser required".to_string()))
    }
}

/// Superuser or staff
pub(crate) fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Staff access required".to_string()))
    }
}

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page", deserialize_with = "deserialize_page")]
    pub page: i64,
    #[serde(
        default = "default_per_page",
        deserialize_with = "deserialize_per_page",
        alias = "limit"
    )]
    pub per_page: i64,
}

impl PaginationQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

pub(crate) fn default_page() -> i64 {
    1
}

pub(crate) fn default_per_page() -> i64 {
    20
}

/// Reject page values less than 1
pub(crate) fn deserialize_page<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 1 {
        return Err(serde::de::Error::custom(
            "page must be a positive integer (>= 1)",
        ));
    }
    Ok(value)
}

/// Reject per_page values less than 1, clamp to MAX_PER_PAGE
pub(crate) fn deserialize_per_page<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 1 {
        return Err(serde::de::Error::custom(
            "per_page must be a positive integer (>= 1)",
        ));
    }
    Ok(value.min(MAX_PER_PAGE))
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            data,
            pagination: PaginationMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
