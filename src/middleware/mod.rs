//! HTTP middleware and request extractors

pub mod auth;
pub mod metrics;
pub mod tenant_context;

pub use auth::AuthPrincipal;
pub use metrics::{ContextKind, ObservabilityLayer};
pub use tenant_context::{tenant_context_middleware, CurrentContext, CurrentTenant};
