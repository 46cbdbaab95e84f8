//! # Notifier Main Entry Point
//!
//! Wires stores, upstream clients, the Telegram bot, the bus dispatcher and
//! the HTTP server, then runs them until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use notifier::{
    auth::JwtVerifier,
    bot::{BotChannel, RegistrationHandler, TelegramBot},
    bus::{MessageBus, nats::NatsBus},
    clients::{HttpEmailClient, HttpProfileClient, build_http_client},
    config::ConfigLoader,
    db,
    dispatcher::{DispatcherSettings, EventDispatcher},
    migration::{Migrator, MigratorTrait},
    notifications::NotificationUseCase,
    repositories::{NotificationRepository, UserSettingRepository, ValidationCodeRepository},
    server::{AppState, run_server},
    telemetry::{self, component_span},
};

#[derive(Debug, Parser)]
#[command(
    name = "notifier",
    version,
    about = "Notification fan-out and Telegram activation service"
)]
struct Cli {
    /// Directory holding the layered .env files
    #[arg(long, value_name = "DIR")]
    env_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let loader = match cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = Arc::new(loader.load().context("loading configuration")?);

    telemetry::init_tracing(&config).context("initializing tracing")?;
    info!(profile = %config.profile, "configuration loaded");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(config = %redacted_json, "effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    Migrator::up(&db, None)
        .await
        .context("running database migrations")?;
    let shared_db = Arc::new(db.clone());

    let notification_store = Arc::new(NotificationRepository::new(shared_db.clone()));
    let setting_store = Arc::new(UserSettingRepository::new(shared_db.clone()));
    let code_store = Arc::new(ValidationCodeRepository::new(shared_db));

    let http = build_http_client(config.upstream_timeout()).context("building http client")?;
    let profiles = Arc::new(HttpProfileClient::new(
        http.clone(),
        &config.profile_service_url,
    )?);
    let emails = Arc::new(HttpEmailClient::new(http, &config.email_service_url)?);

    let notifications = Arc::new(NotificationUseCase::new(
        notification_store,
        setting_store.clone(),
        code_store.clone(),
        profiles.clone(),
        component_span("notifications"),
    ));

    let registration = RegistrationHandler::new(
        code_store,
        profiles,
        emails,
        &config.telegram,
        component_span("registration"),
    );
    let bot = Arc::new(TelegramBot::new(
        &config.telegram,
        setting_store,
        registration,
        component_span("telegram_bot"),
    )?);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    bot.start(shutdown.clone())
        .await
        .context("starting telegram bot")?;

    let nats = NatsBus::connect(&config.bus.url)
        .await
        .context("connecting to message bus")?;
    let bus: Arc<dyn MessageBus> = Arc::new(nats.clone());

    let dispatcher = EventDispatcher::new(
        notifications.clone(),
        bus,
        bot.clone(),
        DispatcherSettings::from_config(&config),
        component_span("dispatcher"),
    );
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown.child_token()));

    let state = AppState {
        config: config.clone(),
        db,
        notifications,
        jwt: Arc::new(JwtVerifier::new(config.jwt_secret.as_deref())),
    };

    let served = run_server(&config, state, shutdown.clone()).await;
    if let Err(err) = &served {
        error!(error = %err, "http server failed");
    }
    // The server only returns once shutdown began, or on a fatal error.
    shutdown.cancel();

    match dispatcher_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %err, "dispatcher exited with an error"),
        Err(err) => error!(error = %err, "dispatcher task panicked"),
    }
    if let Err(err) = bot.stop().await {
        error!(error = %err, "failed to stop telegram bot");
    }
    if let Err(err) = nats.flush().await {
        error!(error = %err, "failed to flush message bus");
    }

    info!("notifier stopped");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
