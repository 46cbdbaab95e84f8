use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let is_sqlite = manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite;

        let mut expires_at = ColumnDef::new(ValidationCode::ExpiresAt);
        let mut created_at = ColumnDef::new(ValidationCode::CreatedAt);
        if is_sqlite {
            expires_at.timestamp();
            created_at.timestamp();
        } else {
            expires_at.timestamp_with_time_zone();
            created_at.timestamp_with_time_zone();
        }

        manager
            .create_table(
                Table::create()
                    .table(ValidationCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValidationCode::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ValidationCode::Payload).string().not_null())
                    .col(expires_at.not_null())
                    .col(created_at.not_null().default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Expired rows are only filtered on read; the index keeps that lookup cheap.
        manager
            .create_index(
                Index::create()
                    .name("idx_validation_codes_expires_at")
                    .table(ValidationCode::Table)
                    .col(ValidationCode::ExpiresAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ValidationCode::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ValidationCode {
    #[sea_orm(iden = "validation_codes")]
    Table,
    Key,
    Payload,
    ExpiresAt,
    CreatedAt,
}
