//! Email service client: triggers the templated validation email.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::{ClientError, endpoint};

const SERVICE: &str = "email service";

/// Template action understood by the email service.
pub const TELEGRAM_REGISTER_ACTION: &str = "TELEGRAM_REGISTER";

/// Template variables for the Telegram registration email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEmail {
    pub username: String,
    #[serde(rename = "telegramName")]
    pub telegram_name: String,
    #[serde(rename = "validationURL")]
    pub validation_url: String,
    pub code: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_validation_email(
        &self,
        to: &str,
        locale: &str,
        email: &ValidationEmail,
    ) -> Result<(), ClientError>;
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    to: &'a str,
    locale: &'a str,
    action: &'static str,
    data: &'a ValidationEmail,
}

/// reqwest-backed [`EmailSender`].
#[derive(Debug, Clone)]
pub struct HttpEmailClient {
    client: Client,
    url: Url,
}

impl HttpEmailClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            url: endpoint(SERVICE, base_url, "internal/v1/emails")?,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailClient {
    async fn send_validation_email(
        &self,
        to: &str,
        locale: &str,
        email: &ValidationEmail,
    ) -> Result<(), ClientError> {
        let request = SendEmailRequest {
            to,
            locale,
            action: TELEGRAM_REGISTER_ACTION,
            data: email,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                service: SERVICE,
                status: response.status(),
            });
        }
        Ok(())
    }
}
