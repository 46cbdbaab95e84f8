//! # Response Envelopes
//!
//! Every RPC answers HTTP 200 with `code=0` and key `SUCCESS` on success, or
//! `code=1` and a stable message key on failure. The notification routes use
//! `message`/`key`; the Telegram routes use `msg`/`msgKey`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::notification::NotificationView;
use crate::models::user_setting;
use crate::notifications::NotificationError;

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_FAILURE: i32 = 1;

pub const KEY_SUCCESS: &str = "SUCCESS";
pub const KEY_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const KEY_INVALID_REQUEST: &str = "INVALID_REQUEST";

const MESSAGE_SUCCESS: &str = "SUCCESS";
const MESSAGE_UNAUTHORIZED: &str = "UNAUTHORIZED";

/// Envelope of the notification list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    #[schema(example = 0)]
    pub code: i32,
    pub message: String,
    #[schema(example = "SUCCESS")]
    pub key: String,
    pub data: Vec<NotificationView>,
    pub total: usize,
}

impl NotificationListResponse {
    pub fn success(data: Vec<NotificationView>) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: MESSAGE_SUCCESS.to_string(),
            key: KEY_SUCCESS.to_string(),
            total: data.len(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>, key: &str) -> Self {
        Self {
            code: CODE_FAILURE,
            message: message.into(),
            key: key.to_string(),
            data: Vec::new(),
            total: 0,
        }
    }

    pub fn unauthorized() -> Self {
        Self::failure(MESSAGE_UNAUTHORIZED, KEY_UNAUTHORIZED)
    }
}

impl From<NotificationError> for NotificationListResponse {
    fn from(err: NotificationError) -> Self {
        Self::failure(err.client_message(), err.msg_key())
    }
}

/// Envelope of the read-flag mutations.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub code: i32,
    pub message: String,
    pub key: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            code: CODE_SUCCESS,
            message: MESSAGE_SUCCESS.to_string(),
            key: KEY_SUCCESS.to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            code: CODE_FAILURE,
            message: MESSAGE_UNAUTHORIZED.to_string(),
            key: KEY_UNAUTHORIZED.to_string(),
        }
    }
}

impl From<NotificationError> for StatusResponse {
    fn from(err: NotificationError) -> Self {
        Self {
            code: CODE_FAILURE,
            message: err.client_message(),
            key: err.msg_key().to_string(),
        }
    }
}

/// Request body of the Telegram activation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivationRequest {
    /// Token from the activation link
    #[schema(example = "3f1c9a...")]
    pub token: String,
}

/// Envelope of the Telegram activation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub code: i32,
    pub msg: String,
    pub msg_key: String,
}

impl ActivationResponse {
    pub fn success() -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: MESSAGE_SUCCESS.to_string(),
            msg_key: KEY_SUCCESS.to_string(),
        }
    }

    pub fn failure(msg: impl Into<String>, key: &str) -> Self {
        Self {
            code: CODE_FAILURE,
            msg: msg.into(),
            msg_key: key.to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::failure(MESSAGE_UNAUTHORIZED, KEY_UNAUTHORIZED)
    }
}

impl From<NotificationError> for ActivationResponse {
    fn from(err: NotificationError) -> Self {
        Self::failure(err.client_message(), err.msg_key())
    }
}

/// One linked channel as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChannelSettingView {
    #[serde(rename = "type")]
    #[schema(example = "TELEGRAM")]
    pub channel_type: String,
    pub active: bool,
}

impl From<user_setting::Model> for ChannelSettingView {
    fn from(model: user_setting::Model) -> Self {
        Self {
            channel_type: model.channel_type,
            active: model.enabled,
        }
    }
}

/// Envelope of the channel settings list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub code: i32,
    pub msg: String,
    pub msg_key: String,
    pub data: Vec<ChannelSettingView>,
}

impl SettingsResponse {
    pub fn success(data: Vec<ChannelSettingView>) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: MESSAGE_SUCCESS.to_string(),
            msg_key: KEY_SUCCESS.to_string(),
            data,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            code: CODE_FAILURE,
            msg: MESSAGE_UNAUTHORIZED.to_string(),
            msg_key: KEY_UNAUTHORIZED.to_string(),
            data: Vec::new(),
        }
    }
}

impl From<NotificationError> for SettingsResponse {
    fn from(err: NotificationError) -> Self {
        Self {
            code: CODE_FAILURE,
            msg: err.client_message(),
            msg_key: err.msg_key().to_string(),
            data: Vec::new(),
        }
    }
}

/// Liveness and database reachability.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub database: String,
}
