//! # Data Models
//!
//! SeaORM entities for the three stores plus the value types that travel
//! between the bus, the use case and the RPC surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod notification;
pub mod user_setting;
pub mod validation_code;

pub use notification::Entity as Notification;
pub use user_setting::Entity as UserSetting;
pub use validation_code::Entity as ValidationCode;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "notifier".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
