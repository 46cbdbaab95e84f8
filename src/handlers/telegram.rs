//! # Telegram Channel Handlers
//!
//! Activation of a chat linked through the bot, and the caller's channel list.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use tracing::{info, warn};

use crate::auth::Caller;
use crate::handlers::types::{
    ActivationRequest, ActivationResponse, ChannelSettingView, KEY_INVALID_REQUEST,
    SettingsResponse,
};
use crate::server::AppState;

/// Activate the Telegram channel with the token from the activation email
#[utoipa::path(
    post,
    path = "/v1/telegram/activation",
    security(("bearer_auth" = [])),
    request_body = ActivationRequest,
    responses(
        (status = 200, description = "Activation envelope", body = ActivationResponse)
    ),
    tag = "telegram"
)]
pub async fn activate_telegram(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ActivationRequest>, JsonRejection>,
) -> Json<ActivationResponse> {
    let Some(user_id) = caller.user_id() else {
        return Json(ActivationResponse::unauthorized());
    };
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return Json(ActivationResponse::failure(
                rejection.body_text(),
                KEY_INVALID_REQUEST,
            ));
        }
    };

    match state
        .notifications
        .active_telegram_bot(user_id, &request.token)
        .await
    {
        Ok(setting) => {
            info!(setting_id = setting.id, "telegram activation accepted");
            Json(ActivationResponse::success())
        }
        Err(err) => {
            warn!(error = %err, "telegram activation refused");
            Json(err.into())
        }
    }
}

/// List the caller's delivery channels
#[utoipa::path(
    get,
    path = "/v1/notifications/settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Settings envelope", body = SettingsResponse)
    ),
    tag = "telegram"
)]
pub async fn notification_settings(
    State(state): State<AppState>,
    caller: Caller,
) -> Json<SettingsResponse> {
    let Some(user_id) = caller.user_id() else {
        return Json(SettingsResponse::unauthorized());
    };

    match state.notifications.get_settings_by_user_id(user_id).await {
        Ok(rows) => Json(SettingsResponse::success(
            rows.into_iter().map(ChannelSettingView::from).collect(),
        )),
        Err(err) => {
            warn!(error = %err, "failed to load channel settings");
            Json(err.into())
        }
    }
}
