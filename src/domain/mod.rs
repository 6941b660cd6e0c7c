//! Domain models for Tenantry Core

pub mod capability;
pub mod common;
pub mod principal;
pub mod provisioning;
pub mod sms;
pub mod subscription;
pub mod tenant;

pub use capability::*;
pub use common::{Deletion, StringUuid};
pub use principal::*;
pub use provisioning::*;
pub use sms::*;
pub use subscription::*;
pub use tenant::*;
