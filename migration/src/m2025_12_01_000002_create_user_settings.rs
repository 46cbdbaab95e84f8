use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let timestamp_col = |col: UserSetting| {
            let mut def = ColumnDef::new(col);
            if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
                def.timestamp();
            } else {
                def.timestamp_with_time_zone();
            }
            def.not_null().default(Expr::current_timestamp()).to_owned()
        };

        manager
            .create_table(
                Table::create()
                    .table(UserSetting::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSetting::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserSetting::UserId).string().not_null())
                    .col(ColumnDef::new(UserSetting::Type).string().not_null())
                    .col(ColumnDef::new(UserSetting::Nid).string().not_null())
                    .col(
                        ColumnDef::new(UserSetting::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(timestamp_col(UserSetting::CreatedAt))
                    .col(timestamp_col(UserSetting::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // One row per (user, identity, channel type).
        manager
            .create_index(
                Index::create()
                    .name("idx_user_settings_user_nid_type")
                    .table(UserSetting::Table)
                    .col(UserSetting::UserId)
                    .col(UserSetting::Nid)
                    .col(UserSetting::Type)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserSetting::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserSetting {
    #[sea_orm(iden = "user_settings")]
    Table,
    Id,
    UserId,
    Type,
    Nid,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
