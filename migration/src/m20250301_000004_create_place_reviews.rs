use sea_orm_migration::prelude::*;

use crate::m20250301_000003_create_extracted_places::ExtractedPlaces;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExtractedPlaceReviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExtractedPlaceReviews::Id)
                            .char_len(26)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExtractedPlaceReviews::PlaceId)
                            .char_len(26)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExtractedPlaceReviews::Author).string().not_null())
                    .col(ColumnDef::new(ExtractedPlaceReviews::Rating).double())
                    .col(ColumnDef::new(ExtractedPlaceReviews::Text).text())
                    .col(ColumnDef::new(ExtractedPlaceReviews::PostedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_place")
                            .from(ExtractedPlaceReviews::Table, ExtractedPlaceReviews::PlaceId)
                            .to(ExtractedPlaces::Table, ExtractedPlaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_place")
                    .table(ExtractedPlaceReviews::Table)
                    .col(ExtractedPlaceReviews::PlaceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExtractedPlaceReviews::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ExtractedPlaceReviews {
    Table,
    Id,
    PlaceId,
    Author,
    Rating,
    Text,
    PostedAt,
}
