//! Business logic layer

pub mod context;
pub mod employment;
pub mod metering;
pub mod permission;
pub mod subscription;
pub mod tenant;

pub use context::{ContextResolver, ResolutionRequest, TenantContext};
pub use employment::EmploymentService;
pub use metering::SmsLedgerService;
pub use permission::{PermissionEngine, RolePermissionService};
pub use subscription::SubscriptionService;
pub use tenant::TenantService;
