//! # Notification Handlers
//!
//! List and read-flag endpoints for the caller's in-app notifications.

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::warn;

use crate::auth::Caller;
use crate::handlers::types::{NotificationListResponse, StatusResponse};
use crate::models::notification::NotificationView;
use crate::notifications::NotificationError;
use crate::server::AppState;

fn log_failure(operation: &'static str, err: &NotificationError) {
    if matches!(err, NotificationError::Repository(_)) {
        warn!(operation, error = %err, "notification request failed");
    }
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/v1/notifications",
    security(("bearer_auth" = [])),
    responses(
        (
            status = 200,
            description = "Envelope with the notification list",
            body = NotificationListResponse
        )
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: Caller,
) -> Json<NotificationListResponse> {
    let Some(user_id) = caller.user_id() else {
        return Json(NotificationListResponse::unauthorized());
    };

    match state.notifications.get_list_user_notification(user_id).await {
        Ok(rows) => Json(NotificationListResponse::success(
            rows.into_iter().map(NotificationView::from).collect(),
        )),
        Err(err) => {
            log_failure("list", &err);
            Json(err.into())
        }
    }
}

/// Mark every notification of the caller as read
#[utoipa::path(
    put,
    path = "/v1/notifications/read-all",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status envelope", body = StatusResponse)
    ),
    tag = "notifications"
)]
pub async fn read_all_notifications(
    State(state): State<AppState>,
    caller: Caller,
) -> Json<StatusResponse> {
    let Some(user_id) = caller.user_id() else {
        return Json(StatusResponse::unauthorized());
    };

    match state.notifications.update_read_all_notification(user_id).await {
        Ok(_) => Json(StatusResponse::success()),
        Err(err) => {
            log_failure("read_all", &err);
            Json(err.into())
        }
    }
}

/// Mark one notification as read
#[utoipa::path(
    put,
    path = "/v1/notifications/{id}/read",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Notification id (UUID)")
    ),
    responses(
        (status = 200, description = "Status envelope", body = StatusResponse)
    ),
    tag = "notifications"
)]
pub async fn read_notification(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Json<StatusResponse> {
    if caller.user_id().is_none() {
        return Json(StatusResponse::unauthorized());
    }

    match state.notifications.update_read_notification(&id).await {
        Ok(()) => Json(StatusResponse::success()),
        Err(err) => {
            log_failure("read", &err);
            Json(err.into())
        }
    }
}
