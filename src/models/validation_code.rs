//! # Validation Code Model
//!
//! Short-lived activation secrets. Codes and tokens share one table and one
//! key prefix; expiry is enforced on read.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix shared by the code and token namespaces.
pub const KEY_PREFIX: &str = "code:telegram:";

const PAYLOAD_DELIMITER: char = ':';

/// Validation code entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "validation_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    pub payload: String,

    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Address of an activation secret in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValidationKey {
    /// The 6-character human-typeable code.
    Code(String),
    /// The hex digest derived from code and email.
    Token(String),
}

impl ValidationKey {
    pub fn storage_key(&self) -> String {
        match self {
            ValidationKey::Code(value) | ValidationKey::Token(value) => {
                format!("{KEY_PREFIX}{value}")
            }
        }
    }
}

/// `identity:externalChatId` mapping stored under both code and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPayload {
    pub identity: String,
    pub chat_id: String,
}

impl ActivationPayload {
    pub fn new(identity: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{PAYLOAD_DELIMITER}{}", self.identity, self.chat_id)
    }

    /// Splits on the last delimiter since chat ids never contain one.
    pub fn parse(raw: &str) -> Option<Self> {
        let (identity, chat_id) = raw.rsplit_once(PAYLOAD_DELIMITER)?;
        if identity.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(Self::new(identity, chat_id))
    }
}

/// Hex-encoded SHA-256 of `code:identity`.
pub fn derive_token(code: &str, identity: &str) -> String {
    let digest = Sha256::digest(format!("{code}{PAYLOAD_DELIMITER}{identity}").as_bytes());
    hex::encode(digest)
}
