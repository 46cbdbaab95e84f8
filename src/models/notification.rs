//! # Notification Model
//!
//! Persisted in-app notifications. Rows are only ever mutated to flip the
//! read flag.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Notification entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Localization key rendered by clients, never free text
    pub title_key: String,

    /// Serialized [`NotificationData`]
    pub data: Json,

    pub read: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Structured notification payload; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Transaction reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
}

/// A notification as it arrives on the bus, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title_key: String,
    #[serde(default)]
    pub data: NotificationData,
}

/// Client-facing shape shared by the RPC list and the realtime re-publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub notification_id: String,
    pub user_id: String,
    pub title_key: String,
    pub read: bool,
    pub data: NotificationData,
    /// RFC 3339 creation time
    pub created_time: String,
}

impl From<Model> for NotificationView {
    fn from(model: Model) -> Self {
        Self {
            notification_id: model.id.to_string(),
            user_id: model.user_id.to_string(),
            title_key: model.title_key,
            read: model.read,
            data: serde_json::from_value(model.data).unwrap_or_default(),
            created_time: model.created_at.to_rfc3339(),
        }
    }
}

/// Realtime copy of a stored notification, keyed the way socket consumers read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeNotification {
    pub id: String,
    pub user_id: String,
    pub title_key: String,
    pub data: NotificationData,
    pub read: bool,
    pub created_at: String,
}

impl From<Model> for RealtimeNotification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id.to_string(),
            user_id: model.user_id.to_string(),
            title_key: model.title_key,
            data: serde_json::from_value(model.data).unwrap_or_default(),
            read: model.read,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}
