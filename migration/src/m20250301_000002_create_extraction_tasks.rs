use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_campaigns::Campaigns;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlaceExtractionTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::Id)
                            .char_len(26)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::CampaignId)
                            .char_len(26)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::GeonameId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::GeonameName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::SearchSeed)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlaceExtractionTasks::Status).string().not_null())
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PlaceExtractionTasks::LastError).text())
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlaceExtractionTasks::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PlaceExtractionTasks::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PlaceExtractionTasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_campaign")
                            .from(PlaceExtractionTasks::Table, PlaceExtractionTasks::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_campaign_status")
                    .table(PlaceExtractionTasks::Table)
                    .col(PlaceExtractionTasks::CampaignId)
                    .col(PlaceExtractionTasks::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlaceExtractionTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PlaceExtractionTasks {
    Table,
    Id,
    CampaignId,
    GeonameId,
    GeonameName,
    SearchSeed,
    Status,
    Attempts,
    LastError,
    CreatedAt,
    StartedAt,
    CompletedAt,
    UpdatedAt,
}
