//! Data access layer (Repository pattern)

pub mod employment;
pub mod principal;
pub mod role_permission;
pub mod scope;
pub mod session;
pub mod sms;
pub mod subscription;
pub mod tenant;

pub use employment::EmploymentRepository;
pub use principal::PrincipalRepository;
pub use role_permission::RolePermissionRepository;
pub use scope::{Liveness, Scope, ScopedEntity, ScopedStore, TenantFilter};
pub use session::SessionRepository;
pub use sms::SmsRepository;
pub use subscription::SubscriptionRepository;
pub use tenant::TenantRepository;

use crate::error::AppError;

/// Unique-key violations become `Conflict(message)`.
pub(crate) fn map_conflict_if_duplicate(error: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message.to_string());
        }
    }
    AppError::Database(error)
}
