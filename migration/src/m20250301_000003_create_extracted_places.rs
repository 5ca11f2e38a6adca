use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Places intentionally carry no foreign key to campaigns: archived
        // campaigns keep their extracted data.
        manager
            .create_table(
                Table::create()
                    .table(ExtractedPlaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExtractedPlaces::Id)
                            .char_len(26)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExtractedPlaces::Fingerprint)
                            .char_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedPlaces::SourceTaskId)
                            .char_len(26)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedPlaces::CampaignId)
                            .char_len(26)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExtractedPlaces::Name).string().not_null())
                    .col(ColumnDef::new(ExtractedPlaces::Address).string().not_null())
                    .col(ColumnDef::new(ExtractedPlaces::City).string())
                    .col(ColumnDef::new(ExtractedPlaces::Category).string())
                    .col(ColumnDef::new(ExtractedPlaces::Rating).double())
                    .col(ColumnDef::new(ExtractedPlaces::ReviewCount).integer())
                    .col(ColumnDef::new(ExtractedPlaces::Phone).string())
                    .col(ColumnDef::new(ExtractedPlaces::Website).string())
                    .col(ColumnDef::new(ExtractedPlaces::Latitude).double())
                    .col(ColumnDef::new(ExtractedPlaces::Longitude).double())
                    .col(
                        ColumnDef::new(ExtractedPlaces::ExtractedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_places_fingerprint")
                    .table(ExtractedPlaces::Table)
                    .col(ExtractedPlaces::Fingerprint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_places_campaign")
                    .table(ExtractedPlaces::Table)
                    .col(ExtractedPlaces::CampaignId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExtractedPlaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ExtractedPlaces {
    Table,
    Id,
    Fingerprint,
    SourceTaskId,
    CampaignId,
    Name,
    Address,
    City,
    Category,
    Rating,
    ReviewCount,
    Phone,
    Website,
    Latitude,
    Longitude,
    ExtractedAt,
}
