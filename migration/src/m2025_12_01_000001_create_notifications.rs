use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db_backend = manager.get_database_backend();

        if db_backend == sea_orm::DatabaseBackend::Sqlite {
            // SQLite has no native uuid/timestamptz; values round-trip through blob/text.
            manager
                .create_table(
                    Table::create()
                        .table(Notification::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notification::Id)
                                .blob()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Notification::UserId).blob().not_null())
                        .col(ColumnDef::new(Notification::TitleKey).string().not_null())
                        .col(ColumnDef::new(Notification::Data).json().not_null())
                        .col(
                            ColumnDef::new(Notification::Read)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Notification::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Notification::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;
        } else {
            manager
                .create_table(
                    Table::create()
                        .table(Notification::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notification::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Notification::UserId).uuid().not_null())
                        .col(ColumnDef::new(Notification::TitleKey).string().not_null())
                        .col(ColumnDef::new(Notification::Data).json_binary().not_null())
                        .col(
                            ColumnDef::new(Notification::Read)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Notification::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Notification::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_created")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notification {
    #[sea_orm(iden = "notifications")]
    Table,
    Id,
    UserId,
    TitleKey,
    Data,
    Read,
    CreatedAt,
    UpdatedAt,
}
