//! # Caller Authentication
//!
//! Resolves the calling user from an `Authorization: Bearer <JWT>` header.
//! Authentication never rejects at the extractor level: handlers receive a
//! [`Caller`] with no user id and answer with the `UNAUTHORIZED` envelope.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::server::AppState;

/// Claims this service reads. Issuers put the user id in `sub` or `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub exp: usize,
}

impl Claims {
    fn subject(self) -> Option<String> {
        self.sub
            .or(self.user_id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no signing secret configured")]
    NotConfigured,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token carries no user id")]
    MissingSubject,
}

/// HS256 verifier for caller tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let key = self.key.as_ref().ok_or(AuthError::NotConfigured)?;
        let data = decode::<Claims>(token, key, &self.validation)?;
        data.claims.subject().ok_or(AuthError::MissingSubject)
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.jwt)
    }
}

/// The authenticated user id, if the request carried a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Option<String>);

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for Caller
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            debug!("request without bearer token");
            return Ok(Caller(None));
        };

        let verifier = Arc::<JwtVerifier>::from_ref(state);
        match verifier.verify(token) {
            Ok(user_id) => Ok(Caller(Some(user_id))),
            Err(err) => {
                warn!(error = %err, "rejected bearer token");
                Ok(Caller(None))
            }
        }
    }
}
