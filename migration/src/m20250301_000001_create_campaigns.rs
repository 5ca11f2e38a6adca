use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .char_len(26)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaigns::Title).string().not_null())
                    .col(ColumnDef::new(Campaigns::Activity).string().not_null())
                    .col(ColumnDef::new(Campaigns::Status).string().not_null())
                    .col(ColumnDef::new(Campaigns::CountryCode).char_len(2).not_null())
                    .col(ColumnDef::new(Campaigns::Admin1Code).string())
                    .col(ColumnDef::new(Campaigns::Admin2Code).string())
                    .col(ColumnDef::new(Campaigns::CityGeonameId).big_integer())
                    .col(ColumnDef::new(Campaigns::LocationName).string().not_null())
                    .col(ColumnDef::new(Campaigns::IsoLanguage).string())
                    .col(ColumnDef::new(Campaigns::Locale).string().not_null())
                    .col(ColumnDef::new(Campaigns::MaxResults).integer().not_null().default(50))
                    .col(ColumnDef::new(Campaigns::MinRating).double().not_null().default(0.0))
                    .col(ColumnDef::new(Campaigns::MinPopulation).big_integer().not_null().default(15000))
                    .col(ColumnDef::new(Campaigns::MaxBots).integer().not_null().default(3))
                    .col(ColumnDef::new(Campaigns::TotalTasks).integer().not_null().default(0))
                    .col(ColumnDef::new(Campaigns::CompletedTasks).integer().not_null().default(0))
                    .col(ColumnDef::new(Campaigns::FailedTasks).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Campaigns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Campaigns::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Campaigns::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Campaigns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_status")
                    .table(Campaigns::Table)
                    .col(Campaigns::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Campaigns {
    Table,
    Id,
    Title,
    Activity,
    Status,
    CountryCode,
    Admin1Code,
    Admin2Code,
    CityGeonameId,
    LocationName,
    IsoLanguage,
    Locale,
    MaxResults,
    MinRating,
    MinPopulation,
    MaxBots,
    TotalTasks,
    CompletedTasks,
    FailedTasks,
    CreatedAt,
    StartedAt,
    CompletedAt,
    UpdatedAt,
}
