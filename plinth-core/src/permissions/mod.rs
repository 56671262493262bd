//! Permission definitions, default tiers and subscriptions

mod registry;
mod subscriptions;

pub use crate::error::PermissionError;
pub use registry::PermissionRegistry;
pub use subscriptions::SubscriptionIndex;
