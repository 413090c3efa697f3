use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReadingState::Table)
                    .if_not_exists()
                    .col(string(ReadingState::Path).primary_key())
                    .col(integer(ReadingState::ReadState))
                    .col(string_null(ReadingState::ReadingProgress))
                    .col(big_integer_null(ReadingState::LastAccess))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReadingState::Table).to_owned())
            .await?;

        Ok(())
    }
}

/// One row per document, keyed by its absolute path.
#[derive(DeriveIden)]
pub enum ReadingState {
    Table,
    Path,
    ReadState,
    ReadingProgress,
    LastAccess,
}
