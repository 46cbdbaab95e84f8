//! Router-level tests of the RPC envelopes, driven through `oneshot`.

mod test_utils;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use notifier::auth::JwtVerifier;
use notifier::config::AppConfig;
use notifier::models::notification::NotificationData;
use notifier::models::validation_code::ValidationKey;
use notifier::notifications::NotificationUseCase;
use notifier::repositories::{
    NotificationRepository, NotificationStore, UserSettingRepository, ValidationCodeRepository,
    ValidationCodeStore,
};
use notifier::server::{AppState, create_app};
use serde_json::{Value, json};
use test_utils::{FakeProfiles, setup_test_db};
use tower::ServiceExt;
use tracing::Span;
use uuid::Uuid;

const SECRET: &str = "http-test-secret";
const USER_ID: &str = "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e01";

struct Api {
    app: Router,
    notifications: Arc<NotificationRepository>,
    codes: Arc<ValidationCodeRepository>,
}

async fn api() -> Result<Api> {
    let db = setup_test_db().await?;
    let shared = Arc::new(db.clone());
    let notifications = Arc::new(NotificationRepository::new(shared.clone()));
    let codes = Arc::new(ValidationCodeRepository::new(shared.clone()));

    let use_case = NotificationUseCase::new(
        notifications.clone(),
        Arc::new(UserSettingRepository::new(shared)),
        codes.clone(),
        FakeProfiles::with("a@b.com", USER_ID, "Ada", "en"),
        Span::none(),
    );

    let app = create_app(AppState {
        config: Arc::new(AppConfig::default()),
        db,
        notifications: Arc::new(use_case),
        jwt: Arc::new(JwtVerifier::new(Some(SECRET))),
    });

    Ok(Api {
        app,
        notifications,
        codes,
    })
}

fn bearer(user_id: &str) -> String {
    let claims = json!({"sub": user_id, "exp": chrono::Utc::now().timestamp() + 600});
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<String>,
    body: Option<&str>,
) -> Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn unauthenticated_calls_get_unauthorized_envelope() -> Result<()> {
    let api = api().await?;

    for (method, uri, key_field) in [
        (Method::GET, "/v1/notifications", "key"),
        (Method::PUT, "/v1/notifications/read-all", "key"),
        (Method::PUT, "/v1/notifications/abc/read", "key"),
        (Method::GET, "/v1/notifications/settings", "msgKey"),
    ] {
        let (status, body) = call(&api.app, method, uri, None, None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["code"], 1, "{uri}");
        assert_eq!(body[key_field], "UNAUTHORIZED", "{uri}");
    }

    let (_, body) = call(
        &api.app,
        Method::POST,
        "/v1/telegram/activation",
        Some("Bearer not-a-jwt".to_string()),
        Some(r#"{"token":"x"}"#),
    )
    .await?;
    assert_eq!(body["msgKey"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn list_and_read_flow() -> Result<()> {
    let api = api().await?;
    let user = Uuid::parse_str(USER_ID)?;
    let data = NotificationData {
        amount: Some("2".to_string()),
        ..Default::default()
    };
    let first = api.notifications.save(user, "CASHBACK_RECEIVED", &data).await?;
    api.notifications.save(user, "REFERRAL_RECEIVED", &data).await?;

    let (_, body) = call(
        &api.app,
        Method::GET,
        "/v1/notifications",
        Some(bearer(USER_ID)),
        None,
    )
    .await?;
    assert_eq!(body["code"], 0);
    assert_eq!(body["key"], "SUCCESS");
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["userId"], USER_ID);
    assert_eq!(body["data"][0]["read"], false);
    assert!(body["data"][0]["createdTime"].is_string());

    let uri = format!("/v1/notifications/{}/read", first.id);
    let (_, body) = call(&api.app, Method::PUT, &uri, Some(bearer(USER_ID)), None).await?;
    assert_eq!(body["code"], 0);

    let uri = format!("/v1/notifications/{}/read", Uuid::new_v4());
    let (_, body) = call(&api.app, Method::PUT, &uri, Some(bearer(USER_ID)), None).await?;
    assert_eq!(body["code"], 1);
    assert_eq!(body["key"], "NOTIFICATION_NOT_FOUND");

    let (_, body) = call(
        &api.app,
        Method::PUT,
        "/v1/notifications/not-a-uuid/read",
        Some(bearer(USER_ID)),
        None,
    )
    .await?;
    assert_eq!(body["key"], "INVALID_NOTIFICATION_ID");

    let (_, body) = call(
        &api.app,
        Method::PUT,
        "/v1/notifications/read-all",
        Some(bearer(USER_ID)),
        None,
    )
    .await?;
    assert_eq!(body["code"], 0);

    let (_, body) = call(
        &api.app,
        Method::GET,
        "/v1/notifications",
        Some(bearer(USER_ID)),
        None,
    )
    .await?;
    assert!(body["data"].as_array().unwrap().iter().all(|n| n["read"] == true));
    Ok(())
}

#[tokio::test]
async fn non_uuid_caller_gets_validation_key() -> Result<()> {
    let api = api().await?;
    let (_, body) =
        call(&api.app, Method::GET, "/v1/notifications", Some(bearer("42")), None).await?;
    assert_eq!(body["code"], 1);
    assert_eq!(body["key"], "INVALID_USER_ID");
    Ok(())
}

#[tokio::test]
async fn telegram_activation_and_settings() -> Result<()> {
    let api = api().await?;

    let (_, body) = call(
        &api.app,
        Method::POST,
        "/v1/telegram/activation",
        Some(bearer(USER_ID)),
        Some("{broken"),
    )
    .await?;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msgKey"], "INVALID_REQUEST");

    let (_, body) = call(
        &api.app,
        Method::POST,
        "/v1/telegram/activation",
        Some(bearer(USER_ID)),
        Some(r#"{"token":"unknown"}"#),
    )
    .await?;
    assert_eq!(body["msgKey"], "INVALID_OR_EXPIRED_TOKEN");

    api.codes
        .save(&ValidationKey::Token("tok-1".to_string()), "a@b.com:555", 60)
        .await?;
    let (_, body) = call(
        &api.app,
        Method::POST,
        "/v1/telegram/activation",
        Some(bearer(USER_ID)),
        Some(r#"{"token":"tok-1"}"#),
    )
    .await?;
    assert_eq!(body, json!({"code": 0, "msg": "SUCCESS", "msgKey": "SUCCESS"}));

    let (_, body) = call(
        &api.app,
        Method::GET,
        "/v1/notifications/settings",
        Some(bearer(USER_ID)),
        None,
    )
    .await?;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], json!([{"type": "TELEGRAM", "active": true}]));
    Ok(())
}

#[tokio::test]
async fn service_info_and_health() -> Result<()> {
    let api = api().await?;

    let (status, body) = call(&api.app, Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "notifier");

    let (status, body) = call(&api.app, Method::GET, "/healthz", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");

    let (status, body) = call(&api.app, Method::GET, "/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/telegram/activation"].is_object());
    Ok(())
}
