//! # Validation Code Repository
//!
//! Key/value store with per-key expiry for activation codes and tokens.
//! Expired rows are never returned; they are not purged either, a later
//! `save` on the same key simply overwrites them.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use std::sync::Arc;

use crate::error::RepositoryError;
use crate::models::validation_code::{self, ActiveModel, Entity as ValidationCode, ValidationKey};

#[async_trait]
pub trait ValidationCodeStore: Send + Sync {
    /// Stores `payload` under `key` for `ttl_seconds`; last write wins.
    async fn save(
        &self,
        key: &ValidationKey,
        payload: &str,
        ttl_seconds: u32,
    ) -> Result<(), RepositoryError>;

    /// Returns the payload, or `NotFound` when the key is missing or expired.
    async fn get(&self, key: &ValidationKey) -> Result<String, RepositoryError>;
}

/// SeaORM-backed [`ValidationCodeStore`].
#[derive(Debug, Clone)]
pub struct ValidationCodeRepository {
    db: Arc<DatabaseConnection>,
}

impl ValidationCodeRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ValidationCodeStore for ValidationCodeRepository {
    async fn save(
        &self,
        key: &ValidationKey,
        payload: &str,
        ttl_seconds: u32,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let active = ActiveModel {
            key: Set(key.storage_key()),
            payload: Set(payload.to_string()),
            expires_at: Set(now + Duration::seconds(i64::from(ttl_seconds))),
            created_at: Set(now),
        };

        ValidationCode::insert(active)
            .on_conflict(
                OnConflict::column(validation_code::Column::Key)
                    .update_columns([
                        validation_code::Column::Payload,
                        validation_code::Column::ExpiresAt,
                        validation_code::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        Ok(())
    }

    async fn get(&self, key: &ValidationKey) -> Result<String, RepositoryError> {
        let storage_key = key.storage_key();
        ValidationCode::find_by_id(storage_key.clone())
            .filter(validation_code::Column::ExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await?
            .map(|row| row.payload)
            .ok_or_else(|| RepositoryError::not_found(storage_key))
    }
}
