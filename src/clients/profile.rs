//! Profile service client: resolves an account by email.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ClientError, endpoint};

const SERVICE: &str = "profile service";

/// Account data needed for activation and the registration email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    /// BCP 47-ish language tag, e.g. `en` or `vi`.
    #[serde(default)]
    pub language: String,
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn get_profile_by_email(&self, email: &str) -> Result<UserProfile, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: Option<UserProfile>,
}

/// reqwest-backed [`ProfileLookup`].
#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    client: Client,
    url: Url,
}

impl HttpProfileClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            url: endpoint(SERVICE, base_url, "internal/v1/profiles")?,
        })
    }
}

#[async_trait]
impl ProfileLookup for HttpProfileClient {
    async fn get_profile_by_email(&self, email: &str) -> Result<UserProfile, ClientError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(ClientError::NotFound {
                    service: SERVICE,
                    what: email.to_string(),
                });
            }
            status => {
                return Err(ClientError::Status {
                    service: SERVICE,
                    status,
                });
            }
        }

        let envelope: ProfileEnvelope =
            response.json().await.map_err(|err| ClientError::Decode {
                service: SERVICE,
                details: err.to_string(),
            })?;

        match envelope.data {
            Some(profile) if !profile.id.is_empty() => Ok(profile),
            _ => Err(ClientError::NotFound {
                service: SERVICE,
                what: email.to_string(),
            }),
        }
    }
}
