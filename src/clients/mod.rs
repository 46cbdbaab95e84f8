//! # Upstream Service Clients
//!
//! Request/response clients for the profile and email services. Both are
//! consumed as black boxes behind traits so the registration saga and the
//! activation resolver can be exercised without a network.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

pub mod email;
pub mod profile;

pub use email::{EmailSender, HttpEmailClient, ValidationEmail};
pub use profile::{HttpProfileClient, ProfileLookup, UserProfile};

/// Errors returned by upstream clients.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid {service} base url '{value}': {source}")]
    InvalidBaseUrl {
        service: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} has no record for {what}")]
    NotFound { service: &'static str, what: String },
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },
    #[error("{service} returned an unexpected body: {details}")]
    Decode {
        service: &'static str,
        details: String,
    },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Shared HTTP client for upstream calls.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("notifier/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Parses a base URL and joins `path` onto it, keeping any base path prefix.
pub(crate) fn endpoint(service: &'static str, base: &str, path: &str) -> Result<Url, ClientError> {
    let normalized = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&normalized)
        .and_then(|url| url.join(path.trim_start_matches('/')))
        .map_err(|source| ClientError::InvalidBaseUrl {
            service,
            value: base.to_string(),
            source,
        })
}
