//! # Bot Channel
//!
//! Bridge to an external chat-bot platform: inbound command handling
//! (registration handshake plus a default instructions reply) and outbound
//! alert delivery. [`TelegramBot`] is the only platform implemented.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::RepositoryError;
use crate::events::IndicatorAlert;

pub mod alert;
pub mod registration;
pub mod telegram;

pub use registration::{RegisterCommand, RegistrationHandler, RegistrationReport, RegistrationStep};
pub use telegram::TelegramBot;

/// Errors returned by bot channel operations.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("bot is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("bot is already running")]
    AlreadyStarted,
    #[error("bot api request for {method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("bot api rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("user {user_id} has no linked bot channel: {source}")]
    ChannelNotLinked {
        user_id: String,
        #[source]
        source: RepositoryError,
    },
    #[error("bot channel for user {user_id} is disabled")]
    ChannelDisabled { user_id: String },
    #[error("bot polling task ended abnormally: {0}")]
    Join(String),
}

/// Polymorphic chat-bot platform adapter.
#[async_trait]
pub trait BotChannel: Send + Sync {
    /// Launches the inbound message loop in the background and returns immediately.
    async fn start(&self, shutdown: CancellationToken) -> Result<(), BotError>;

    /// Stops the inbound loop and waits for it to finish the update in hand.
    async fn stop(&self) -> Result<(), BotError>;

    /// Delivers an indicator alert to the user's linked chat.
    async fn send_indicator_alert_message(
        &self,
        user_id: &str,
        alert: &IndicatorAlert,
    ) -> Result<(), BotError>;
}
