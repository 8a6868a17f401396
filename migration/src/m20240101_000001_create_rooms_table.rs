use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rooms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rooms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rooms::Name).string().not_null())
                    .col(ColumnDef::new(Rooms::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Rooms::Status).string().not_null())
                    .col(
                        ColumnDef::new(Rooms::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Rooms::Code).string().null())
                    .col(ColumnDef::new(Rooms::Locale).string().not_null())
                    .col(
                        ColumnDef::new(Rooms::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    // Full room document, rounds and rosters included
                    .col(ColumnDef::new(Rooms::Document).text().not_null())
                    .col(
                        ColumnDef::new(Rooms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Rooms::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rooms_code")
                    .table(Rooms::Table)
                    .col(Rooms::Code)
                    .to_owned(),
            )
            .await?;

        // Lobby listing filters on status and privacy
        manager
            .create_index(
                Index::create()
                    .name("idx_rooms_status_private")
                    .table(Rooms::Table)
                    .col(Rooms::Status)
                    .col(Rooms::IsPrivate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rooms::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
    Name,
    OwnerId,
    Status,
    IsPrivate,
    Code,
    Locale,
    Version,
    Document,
    CreatedAt,
    UpdatedAt,
}
