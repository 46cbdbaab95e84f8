//! # Notification Use Case
//!
//! Business rules for the in-app notification list and for Telegram channel
//! activation. Identifiers are validated here, before any I/O; store and
//! upstream failures are mapped onto [`NotificationError`] so the RPC layer
//! can render a stable message key.

use std::sync::Arc;

use thiserror::Error;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

use crate::clients::ProfileLookup;
use crate::error::RepositoryError;
use crate::models::notification::{self, NewNotification};
use crate::models::user_setting::{self, ChannelType, NewChannelSetting};
use crate::models::validation_code::{ActivationPayload, ValidationKey};
use crate::repositories::{ChannelSettingStore, NotificationStore, ValidationCodeStore};

/// Failures surfaced by [`NotificationUseCase`].
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Missing or malformed input; the payload is the message key.
    #[error("{0}")]
    Validation(&'static str),
    #[error("activation token is invalid or expired")]
    TokenNotFound,
    #[error("stored activation data is malformed")]
    MalformedActivationPayload,
    #[error("account for '{identity}' could not be resolved: {reason}")]
    AccountNotResolved { identity: String, reason: String },
    #[error("activation token belongs to another account")]
    UserMismatch,
    #[error("notification not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl NotificationError {
    /// Stable key placed in RPC response envelopes.
    pub fn msg_key(&self) -> &'static str {
        match self {
            NotificationError::Validation(key) => *key,
            NotificationError::TokenNotFound => "INVALID_OR_EXPIRED_TOKEN",
            NotificationError::MalformedActivationPayload => "INVALID_ACTIVATION_DATA",
            NotificationError::AccountNotResolved { .. } => "ACCOUNT_NOT_FOUND",
            NotificationError::UserMismatch => "INVALID_USER",
            NotificationError::NotFound => "NOTIFICATION_NOT_FOUND",
            NotificationError::Repository(_) => "ERROR",
        }
    }

    /// Message safe to hand to API clients; storage failures stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            NotificationError::Repository(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub const MISSING_USER_ID: &str = "MISSING_USER_ID";
pub const INVALID_USER_ID: &str = "INVALID_USER_ID";
pub const MISSING_TITLE_KEY: &str = "MISSING_TITLE_KEY";
pub const MISSING_NOTIFICATION_ID: &str = "MISSING_NOTIFICATION_ID";
pub const INVALID_NOTIFICATION_ID: &str = "INVALID_NOTIFICATION_ID";
pub const MISSING_TOKEN: &str = "MISSING_TOKEN";

/// Orchestrates the notification, channel preference and validation code stores.
pub struct NotificationUseCase {
    notifications: Arc<dyn NotificationStore>,
    settings: Arc<dyn ChannelSettingStore>,
    codes: Arc<dyn ValidationCodeStore>,
    profiles: Arc<dyn ProfileLookup>,
    span: Span,
}

impl NotificationUseCase {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        settings: Arc<dyn ChannelSettingStore>,
        codes: Arc<dyn ValidationCodeStore>,
        profiles: Arc<dyn ProfileLookup>,
        span: Span,
    ) -> Self {
        Self {
            notifications,
            settings,
            codes,
            profiles,
            span,
        }
    }

    /// Persists a notification after checking user id and title key.
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(user_id = %input.user_id, title_key = %input.title_key)
    )]
    pub async fn save_notification(
        &self,
        input: &NewNotification,
    ) -> Result<notification::Model, NotificationError> {
        if input.user_id.trim().is_empty() {
            return Err(NotificationError::Validation(MISSING_USER_ID));
        }
        if input.title_key.trim().is_empty() {
            return Err(NotificationError::Validation(MISSING_TITLE_KEY));
        }
        let user_id = parse_id(&input.user_id, MISSING_USER_ID, INVALID_USER_ID)?;

        let saved = self
            .notifications
            .save(user_id, &input.title_key, &input.data)
            .await?;
        debug!(notification_id = %saved.id, "notification saved");
        Ok(saved)
    }

    /// Newest-first notifications for a user; a user with none gets an empty list.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn get_list_user_notification(
        &self,
        user_id: &str,
    ) -> Result<Vec<notification::Model>, NotificationError> {
        let user_id = parse_id(user_id, MISSING_USER_ID, INVALID_USER_ID)?;

        match self.notifications.list_by_user(user_id).await {
            Ok(rows) => Ok(rows),
            Err(RepositoryError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(parent = &self.span, skip(self))]
    pub async fn update_read_all_notification(
        &self,
        user_id: &str,
    ) -> Result<u64, NotificationError> {
        let user_id = parse_id(user_id, MISSING_USER_ID, INVALID_USER_ID)?;
        let updated = self.notifications.mark_all_read(user_id).await?;
        debug!(updated, "marked notifications read");
        Ok(updated)
    }

    #[instrument(parent = &self.span, skip(self))]
    pub async fn update_read_notification(
        &self,
        notification_id: &str,
    ) -> Result<(), NotificationError> {
        let id = parse_id(
            notification_id,
            MISSING_NOTIFICATION_ID,
            INVALID_NOTIFICATION_ID,
        )?;

        self.notifications.mark_read(id).await.map_err(|err| match err {
            RepositoryError::NotFound(_) => NotificationError::NotFound,
            other => other.into(),
        })
    }

    /// Resolves an activation token and links the Telegram chat to the caller's account.
    ///
    /// Re-running with a still-valid token is safe: the existing row is
    /// re-enabled instead of a duplicate being created.
    #[instrument(parent = &self.span, skip(self, token))]
    pub async fn active_telegram_bot(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<user_setting::Model, NotificationError> {
        if user_id.trim().is_empty() {
            return Err(NotificationError::Validation(MISSING_USER_ID));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(NotificationError::Validation(MISSING_TOKEN));
        }

        let raw = self
            .codes
            .get(&ValidationKey::Token(token.to_string()))
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound(_) => NotificationError::TokenNotFound,
                other => other.into(),
            })?;

        let payload =
            ActivationPayload::parse(&raw).ok_or(NotificationError::MalformedActivationPayload)?;

        let profile = self
            .profiles
            .get_profile_by_email(&payload.identity)
            .await
            .map_err(|err| NotificationError::AccountNotResolved {
                identity: payload.identity.clone(),
                reason: err.to_string(),
            })?;

        if !same_account(&profile.id, user_id) {
            warn!(resolved_user_id = %profile.id, "activation token presented by another account");
            return Err(NotificationError::UserMismatch);
        }

        let request = NewChannelSetting {
            user_id: profile.id.clone(),
            channel_type: ChannelType::Telegram,
            nid: payload.chat_id.clone(),
        };

        match self.settings.create(request).await {
            Ok(created) => {
                info!(setting_id = created.id, "telegram channel linked");
                Ok(created)
            }
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .settings
                    .get_by_identity(&profile.id, ChannelType::Telegram, &payload.chat_id)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::not_found("channel setting reported as duplicate")
                    })?;
                let activated = self.settings.activate(existing.id).await?;
                info!(setting_id = activated.id, "telegram channel already linked");
                Ok(activated)
            }
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(parent = &self.span, skip(self))]
    pub async fn get_settings_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Vec<user_setting::Model>, NotificationError> {
        if user_id.trim().is_empty() {
            return Err(NotificationError::Validation(MISSING_USER_ID));
        }
        Ok(self.settings.get_by_user_id(user_id).await?)
    }
}

fn parse_id(
    raw: &str,
    missing: &'static str,
    invalid: &'static str,
) -> Result<Uuid, NotificationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(NotificationError::Validation(missing));
    }
    Uuid::parse_str(raw).map_err(|_| NotificationError::Validation(invalid))
}

/// UUIDs compare by value so letter case does not matter; anything else compares trimmed.
fn same_account(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    match (Uuid::parse_str(a), Uuid::parse_str(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_validated_before_io() {
        assert!(matches!(
            parse_id("  ", MISSING_USER_ID, INVALID_USER_ID),
            Err(NotificationError::Validation(MISSING_USER_ID))
        ));
        assert!(matches!(
            parse_id("42", MISSING_USER_ID, INVALID_USER_ID),
            Err(NotificationError::Validation(INVALID_USER_ID))
        ));
        assert!(
            parse_id(
                "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e01",
                MISSING_USER_ID,
                INVALID_USER_ID
            )
            .is_ok()
        );
    }

    #[test]
    fn account_ids_match_regardless_of_uuid_case() {
        assert!(same_account(
            "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e01",
            "7D0C5F3E-5A5E-4F57-A8F4-3F9D1D1A9E01"
        ));
        assert!(same_account(" user-1 ", "user-1"));
        assert!(!same_account("user-1", "User-1"));
        assert!(!same_account(
            "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e01",
            "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e02"
        ));
    }

    #[test]
    fn message_keys_are_stable() {
        assert_eq!(NotificationError::TokenNotFound.msg_key(), "INVALID_OR_EXPIRED_TOKEN");
        assert_eq!(NotificationError::UserMismatch.msg_key(), "INVALID_USER");
        assert_eq!(
            NotificationError::Validation(MISSING_TITLE_KEY).msg_key(),
            "MISSING_TITLE_KEY"
        );
        assert_eq!(
            NotificationError::Repository(RepositoryError::not_found("x")).msg_key(),
            "ERROR"
        );
    }
}
