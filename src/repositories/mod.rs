//! # Repository Layer
//!
//! Store contracts used by the use case, the dispatcher and the bot adapter,
//! each backed by a SeaORM repository. The traits are the seams tests swap
//! out; the repositories are what production wires in.

pub mod notification;
pub mod user_setting;
pub mod validation_code;

pub use notification::{NotificationRepository, NotificationStore};
pub use user_setting::{ChannelSettingStore, UserSettingRepository};
pub use validation_code::{ValidationCodeRepository, ValidationCodeStore};
