//! # Channel Preference Repository
//!
//! Database operations for the `user_settings` table. Duplicate creation
//! surfaces as [`RepositoryError::Conflict`] so callers can treat it as an
//! idempotent success.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;

use crate::error::RepositoryError;
use crate::models::user_setting::{
    self, ActiveModel, ChannelType, Entity as UserSetting, NewChannelSetting,
};

#[async_trait]
pub trait ChannelSettingStore: Send + Sync {
    /// Inserts an enabled row; fails with `Conflict` when the triple already exists.
    async fn create(&self, setting: NewChannelSetting)
    -> Result<user_setting::Model, RepositoryError>;

    /// Sets `enabled = true` on the row with the given id.
    async fn activate(&self, id: i32) -> Result<user_setting::Model, RepositoryError>;

    async fn get_by_user_id(&self, user_id: &str)
    -> Result<Vec<user_setting::Model>, RepositoryError>;

    /// The row alerts go to: the newest enabled link, else the newest link.
    /// `NotFound` when the user never linked the channel.
    async fn get_by_user_id_and_type(
        &self,
        user_id: &str,
        channel_type: ChannelType,
    ) -> Result<user_setting::Model, RepositoryError>;

    /// Row matching the full unique triple, if any.
    async fn get_by_identity(
        &self,
        user_id: &str,
        channel_type: ChannelType,
        nid: &str,
    ) -> Result<Option<user_setting::Model>, RepositoryError>;
}

/// SeaORM-backed [`ChannelSettingStore`].
#[derive(Debug, Clone)]
pub struct UserSettingRepository {
    db: Arc<DatabaseConnection>,
}

impl UserSettingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChannelSettingStore for UserSettingRepository {
    async fn create(
        &self,
        setting: NewChannelSetting,
    ) -> Result<user_setting::Model, RepositoryError> {
        if setting.user_id.is_empty() || setting.nid.is_empty() {
            return Err(RepositoryError::validation_error(
                "channel setting requires user id and external identity",
            ));
        }

        let now = Utc::now();
        let active = ActiveModel {
            user_id: Set(setting.user_id),
            channel_type: Set(setting.channel_type.as_str().to_string()),
            nid: Set(setting.nid),
            enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(active.insert(&*self.db).await?)
    }

    async fn activate(&self, id: i32) -> Result<user_setting::Model, RepositoryError> {
        let existing = UserSetting::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found(format!("user setting {id}")))?;

        if existing.enabled {
            return Ok(existing);
        }

        let mut active = existing.into_active_model();
        active.enabled = Set(true);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    async fn get_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Vec<user_setting::Model>, RepositoryError> {
        let rows = UserSetting::find()
            .filter(user_setting::Column::UserId.eq(user_id))
            .order_by_asc(user_setting::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    async fn get_by_user_id_and_type(
        &self,
        user_id: &str,
        channel_type: ChannelType,
    ) -> Result<user_setting::Model, RepositoryError> {
        UserSetting::find()
            .filter(user_setting::Column::UserId.eq(user_id))
            .filter(user_setting::Column::ChannelType.eq(channel_type.as_str()))
            .order_by_desc(user_setting::Column::Enabled)
            .order_by_desc(user_setting::Column::Id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                RepositoryError::not_found(format!("{channel_type} setting for user {user_id}"))
            })
    }

    async fn get_by_identity(
        &self,
        user_id: &str,
        channel_type: ChannelType,
        nid: &str,
    ) -> Result<Option<user_setting::Model>, RepositoryError> {
        let row = UserSetting::find()
            .filter(user_setting::Column::UserId.eq(user_id))
            .filter(user_setting::Column::ChannelType.eq(channel_type.as_str()))
            .filter(user_setting::Column::Nid.eq(nid))
            .one(&*self.db)
            .await?;
        Ok(row)
    }
}
