//! Notification repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::notification::{self, ActiveModel, Entity as Notification, NotificationData};

/// Durable per-user notification log.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Appends a notification; it starts unread.
    async fn save(
        &self,
        user_id: Uuid,
        title_key: &str,
        data: &NotificationData,
    ) -> Result<notification::Model, RepositoryError>;

    /// All notifications for a user, newest first.
    async fn list_by_user(&self, user_id: Uuid)
    -> Result<Vec<notification::Model>, RepositoryError>;

    /// Marks every notification of a user read, returning the number of rows touched.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    /// Marks one notification read. Already-read rows succeed unchanged.
    async fn mark_read(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// SeaORM-backed [`NotificationStore`].
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn save(
        &self,
        user_id: Uuid,
        title_key: &str,
        data: &NotificationData,
    ) -> Result<notification::Model, RepositoryError> {
        let now = Utc::now();
        let model = notification::Model {
            id: Uuid::new_v4(),
            user_id,
            title_key: title_key.to_string(),
            data: serde_json::to_value(data)
                .map_err(|err| RepositoryError::validation_error(err.to_string()))?,
            read: false,
            created_at: now,
            updated_at: now,
        };

        let active = ActiveModel {
            id: Set(model.id),
            user_id: Set(model.user_id),
            title_key: Set(model.title_key.clone()),
            data: Set(model.data.clone()),
            read: Set(model.read),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };

        // Skip RETURNING/last-insert-id handling; every column is already known.
        Notification::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(model)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<notification::Model>, RepositoryError> {
        let rows = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = Notification::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .col_expr(notification::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = Notification::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .col_expr(notification::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found(format!("notification {id}")));
        }
        Ok(())
    }
}
