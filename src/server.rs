//! # Server Configuration
//!
//! Router, shared state and OpenAPI document for the notification RPC surface.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::JwtVerifier;
use crate::config::AppConfig;
use crate::handlers;
use crate::notifications::NotificationUseCase;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub notifications: Arc<NotificationUseCase>,
    pub jwt: Arc<JwtVerifier>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/v1/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/v1/notifications/read-all",
            put(handlers::notifications::read_all_notifications),
        )
        .route(
            "/v1/notifications/{id}/read",
            put(handlers::notifications::read_notification),
        )
        .route(
            "/v1/notifications/settings",
            get(handlers::telegram::notification_settings),
        )
        .route(
            "/v1/telegram/activation",
            post(handlers::telegram::activate_telegram),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Serves until `shutdown` is cancelled, then drains open connections.
pub async fn run_server(
    config: &AppConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_app(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %config.profile, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("http server shutting down");
        })
        .await?;

    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::read_all_notifications,
        crate::handlers::notifications::read_notification,
        crate::handlers::telegram::activate_telegram,
        crate::handlers::telegram::notification_settings,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::notification::NotificationView,
            crate::models::notification::NotificationData,
            crate::handlers::types::NotificationListResponse,
            crate::handlers::types::StatusResponse,
            crate::handlers::types::ActivationRequest,
            crate::handlers::types::ActivationResponse,
            crate::handlers::types::ChannelSettingView,
            crate::handlers::types::SettingsResponse,
            crate::handlers::types::HealthResponse,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "Notifier API",
        description = "In-app notifications and Telegram channel activation",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
