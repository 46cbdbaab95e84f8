//! # Telegram Bot Adapter
//!
//! Talks to the Telegram Bot API over plain HTTPS: `getUpdates` long polling
//! for inbound chat messages and `sendMessage` for replies and alerts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use super::alert::format_alert_message;
use super::registration::{
    RegisterCommand, RegistrationHandler, RegistrationStep, parse_register_command,
};
use super::{BotChannel, BotError};
use crate::config::TelegramConfig;
use crate::events::IndicatorAlert;
use crate::models::user_setting::ChannelType;
use crate::repositories::ChannelSettingStore;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(3);
const HTML_PARSE_MODE: &str = "HTML";

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Chat {
    fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

/// Thin Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramApi {
    client: Client,
    /// `{api_base}/bot{token}`; never logged.
    base: String,
}

impl TelegramApi {
    pub fn new(api_base: &str, bot_token: &str, poll_timeout: Duration) -> Result<Self, BotError> {
        let client = Client::builder()
            // Long polls hold the request open for `poll_timeout`.
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|source| BotError::Transport {
                method: "client",
                source,
            })?;

        Ok(Self {
            client,
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R, BotError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let transport = |source: reqwest::Error| BotError::Transport {
            method,
            source: source.without_url(),
        };

        let response: ApiResponse<R> = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(BotError::Api {
                method,
                description: description.unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, BotError> {
        self.call(
            "getUpdates",
            &GetUpdatesRequest {
                offset,
                timeout: timeout_seconds,
                allowed_updates: ["message"],
            },
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&'static str>,
    ) -> Result<(), BotError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id,
                    text,
                    parse_mode,
                    disable_web_page_preview: true,
                },
            )
            .await?;
        Ok(())
    }
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct BotInner {
    api: Option<TelegramApi>,
    settings: Arc<dyn ChannelSettingStore>,
    registration: RegistrationHandler,
    brand_name: String,
    alert_link_base: String,
    poll_timeout_seconds: u64,
    span: Span,
}

/// Telegram implementation of [`BotChannel`].
///
/// Without a bot token the adapter still constructs: inbound polling is
/// skipped and alert delivery fails with [`BotError::NotConfigured`].
pub struct TelegramBot {
    inner: Arc<BotInner>,
    poller: Mutex<Option<Poller>>,
}

impl TelegramBot {
    pub fn new(
        config: &TelegramConfig,
        settings: Arc<dyn ChannelSettingStore>,
        registration: RegistrationHandler,
        span: Span,
    ) -> Result<Self, BotError> {
        let api = config
            .bot_token
            .as_deref()
            .map(|token| {
                TelegramApi::new(
                    &config.api_base,
                    token,
                    Duration::from_secs(config.poll_timeout_seconds),
                )
            })
            .transpose()?;

        Ok(Self {
            inner: Arc::new(BotInner {
                api,
                settings,
                registration,
                brand_name: config.brand_name.clone(),
                alert_link_base: config.alert_link_base.clone(),
                poll_timeout_seconds: config.poll_timeout_seconds,
                span,
            }),
            poller: Mutex::new(None),
        })
    }

    /// Routes one inbound update: `/register` runs the handshake, anything else gets instructions.
    pub async fn handle_update(&self, update: Update) -> Result<(), BotError> {
        self.inner.handle_update(update).await
    }
}

impl BotInner {
    fn api(&self) -> Result<&TelegramApi, BotError> {
        self.api
            .as_ref()
            .ok_or(BotError::NotConfigured("telegram bot token is not set"))
    }

    fn instructions(&self) -> String {
        format!(
            "Welcome to {brand} alerts.\n\
             To link this chat with your {brand} account, \
             type /register followed by your account email.\n\
             Example: /register name@example.com",
            brand = self.brand_name
        )
    }

    async fn poll(self: Arc<Self>, cancel: CancellationToken) {
        let Ok(api) = self.api() else {
            return;
        };
        let mut offset = 0_i64;
        info!("telegram polling started");

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = api.get_updates(offset, self.poll_timeout_seconds) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Err(err) = self.handle_update(update).await {
                            warn!(error = %err, "failed to handle telegram update");
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "telegram getUpdates failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("telegram polling stopped");
    }

    #[instrument(parent = &self.span, skip_all, fields(update_id = update.update_id))]
    async fn handle_update(&self, update: Update) -> Result<(), BotError> {
        let Some(message) = update.message else {
            debug!("ignoring update without message");
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        let text = message.text.as_deref().unwrap_or_default();

        let reply = match parse_register_command(text) {
            Some(email) if !email.is_empty() => {
                let command = RegisterCommand {
                    email,
                    chat_id: chat_id.clone(),
                    chat_display_name: message.chat.display_name(),
                };
                let report = self.registration.register(&command).await;
                if report.succeeded(RegistrationStep::EmailSent) {
                    concat!(
                        "You are registered successfully.\n",
                        "We sent a code to your email, please check your inbox."
                    )
                    .to_string()
                } else {
                    concat!(
                        "We could not send the activation email right now.\n",
                        "Please try /register again in a few minutes."
                    )
                    .to_string()
                }
            }
            _ => self.instructions(),
        };

        self.api()?.send_message(&chat_id, &reply, None).await
    }

    #[instrument(parent = &self.span, skip(self, alert), fields(symbol = %alert.symbol))]
    async fn send_alert(&self, user_id: &str, alert: &IndicatorAlert) -> Result<(), BotError> {
        let api = self.api()?;

        let setting = self
            .settings
            .get_by_user_id_and_type(user_id, ChannelType::Telegram)
            .await
            .map_err(|source| BotError::ChannelNotLinked {
                user_id: user_id.to_string(),
                source,
            })?;

        if !setting.enabled {
            return Err(BotError::ChannelDisabled {
                user_id: user_id.to_string(),
            });
        }

        let text = format_alert_message(alert, &self.brand_name, &self.alert_link_base);
        api.send_message(&setting.nid, &text, Some(HTML_PARSE_MODE))
            .await
    }
}

#[async_trait]
impl BotChannel for TelegramBot {
    async fn start(&self, shutdown: CancellationToken) -> Result<(), BotError> {
        if self.inner.api.is_none() {
            warn!("telegram bot token not configured; inbound polling disabled");
            return Ok(());
        }

        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return Err(BotError::AlreadyStarted);
        }

        let cancel = shutdown.child_token();
        let span = self.inner.span.clone();
        let handle = tokio::spawn(self.inner.clone().poll(cancel.clone()).instrument(span));
        *poller = Some(Poller { cancel, handle });
        Ok(())
    }

    async fn stop(&self) -> Result<(), BotError> {
        let Some(poller) = self.poller.lock().await.take() else {
            return Ok(());
        };
        poller.cancel.cancel();
        poller
            .handle
            .await
            .map_err(|err| BotError::Join(err.to_string()))
    }

    async fn send_indicator_alert_message(
        &self,
        user_id: &str,
        alert: &IndicatorAlert,
    ) -> Result<(), BotError> {
        let result = self.inner.send_alert(user_id, alert).await;
        let outcome = if result.is_ok() { "sent" } else { "failed" };
        counter!("notifier_bot_alerts_total", "outcome" => outcome).increment(1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_and_trims() {
        let chat = Chat {
            id: 1,
            first_name: Some("Ada".to_string()),
            last_name: None,
        };
        assert_eq!(chat.display_name(), "Ada");
    }

    #[test]
    fn api_response_without_result_is_rejected() {
        let body = r#"{"ok": false, "description": "Bad Request: chat not found"}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Bad Request: chat not found"));
    }

    #[test]
    fn updates_without_text_deserialize() {
        let body = r#"{"update_id": 10, "message": {"message_id": 3, "chat": {"id": -42}}}"#;
        let update: Update = serde_json::from_str(body).unwrap();
        assert_eq!(update.message.unwrap().chat.id, -42);
    }
}
