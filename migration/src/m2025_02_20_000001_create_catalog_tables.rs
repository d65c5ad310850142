//! Migration to create the per-catalog tables.
//!
//! Each catalog (`tire`, `wheel`) gets brands, models, rebates and products.
//! Brands and models are keyed by name, rebates and products by the upstream
//! id. `rebate_id` on products is a plain indexed column; nulling it when a
//! rebate disappears is done by the writer, not by a constraint.

use sea_orm_migration::prelude::*;

const CATALOG_PREFIXES: [&str; 2] = ["tire", "wheel"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for prefix in CATALOG_PREFIXES {
            manager
                .create_table(
                    Table::create()
                        .table(table(prefix, "brands"))
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Brands::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Brands::BrandName)
                                .text()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(table(prefix, "models"))
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Models::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Models::ModelName)
                                .text()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Models::BrandName).text().null())
                        .col(ColumnDef::new(Models::ModelTaxonId).text().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(table(prefix, "rebates"))
                        .if_not_exists()
                        .col(ColumnDef::new(Rebates::Id).text().not_null().primary_key())
                        .col(ColumnDef::new(Rebates::BrandId).text().null())
                        .col(ColumnDef::new(Rebates::DetailedDescription).text().null())
                        .col(ColumnDef::new(Rebates::ExpiresAt).text().null())
                        .col(ColumnDef::new(Rebates::Img).text().null())
                        .col(ColumnDef::new(Rebates::InstantRebate).boolean().null())
                        .col(ColumnDef::new(Rebates::Name).text().null())
                        .col(ColumnDef::new(Rebates::Price).double().null())
                        .col(ColumnDef::new(Rebates::ShortDescription).text().null())
                        .col(ColumnDef::new(Rebates::StartsAt).text().null())
                        .col(ColumnDef::new(Rebates::SubmissionDate).text().null())
                        .col(ColumnDef::new(Rebates::SubmissionLink).text().null())
                        .col(ColumnDef::new(Rebates::Title).text().null())
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(table("tire", "products"))
                    .if_not_exists()
                    .col(ColumnDef::new(TireProducts::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(TireProducts::Availability).text().null())
                    .col(ColumnDef::new(TireProducts::Currency).text().null())
                    .col(ColumnDef::new(TireProducts::Description).text().null())
                    .col(ColumnDef::new(TireProducts::DualLoadIndex).double().null())
                    .col(
                        ColumnDef::new(TireProducts::DualMaxInflationPressure)
                            .double()
                            .null(),
                    )
                    .col(ColumnDef::new(TireProducts::DualMaxLoad).double().null())
                    .col(ColumnDef::new(TireProducts::Featured).boolean().null())
                    .col(ColumnDef::new(TireProducts::ImageUrl).text().null())
                    .col(ColumnDef::new(TireProducts::LoadIndex).double().null())
                    .col(
                        ColumnDef::new(TireProducts::MaxInflationPressure)
                            .double()
                            .null(),
                    )
                    .col(ColumnDef::new(TireProducts::MaxLoad).double().null())
                    .col(ColumnDef::new(TireProducts::Mpn).text().null())
                    .col(ColumnDef::new(TireProducts::OverallDiameter).double().null())
                    .col(ColumnDef::new(TireProducts::Price).double().null())
                    .col(ColumnDef::new(TireProducts::RevsPerMile).double().null())
                    .col(ColumnDef::new(TireProducts::RimWidthRange).text().null())
                    .col(ColumnDef::new(TireProducts::RoadCondition).text().null())
                    .col(ColumnDef::new(TireProducts::SectWidth).double().null())
                    .col(ColumnDef::new(TireProducts::Sidewall).text().null())
                    .col(ColumnDef::new(TireProducts::SizeDesc).text().null())
                    .col(ColumnDef::new(TireProducts::Sku).text().null())
                    .col(ColumnDef::new(TireProducts::SpeedRating).text().null())
                    .col(ColumnDef::new(TireProducts::Temperature).text().null())
                    .col(ColumnDef::new(TireProducts::Traction).text().null())
                    .col(ColumnDef::new(TireProducts::TreadDepth).double().null())
                    .col(ColumnDef::new(TireProducts::TreadType).text().null())
                    .col(ColumnDef::new(TireProducts::Treadwear).text().null())
                    .col(ColumnDef::new(TireProducts::Url).text().null())
                    .col(ColumnDef::new(TireProducts::Utqg).text().null())
                    .col(ColumnDef::new(TireProducts::Warranty).text().null())
                    .col(ColumnDef::new(TireProducts::AspectRatio).double().null())
                    .col(ColumnDef::new(TireProducts::Diameter).double().null())
                    .col(ColumnDef::new(TireProducts::Width).double().null())
                    .col(ColumnDef::new(TireProducts::BrandName).text().null())
                    .col(ColumnDef::new(TireProducts::ModelName).text().null())
                    .col(ColumnDef::new(TireProducts::RebateId).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(table("wheel", "products"))
                    .if_not_exists()
                    .col(ColumnDef::new(WheelProducts::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(WheelProducts::Availability).text().null())
                    .col(ColumnDef::new(WheelProducts::BackSpacing).double().null())
                    .col(ColumnDef::new(WheelProducts::BoltCircle).double().null())
                    .col(ColumnDef::new(WheelProducts::Currency).text().null())
                    .col(ColumnDef::new(WheelProducts::Featured).boolean().null())
                    .col(ColumnDef::new(WheelProducts::Finish).text().null())
                    .col(ColumnDef::new(WheelProducts::HubBore).double().null())
                    .col(ColumnDef::new(WheelProducts::ImageUrl).text().null())
                    .col(ColumnDef::new(WheelProducts::Length).double().null())
                    .col(ColumnDef::new(WheelProducts::Lugs).double().null())
                    .col(ColumnDef::new(WheelProducts::WheelOffset).double().null())
                    .col(ColumnDef::new(WheelProducts::Price).double().null())
                    .col(ColumnDef::new(WheelProducts::Url).text().null())
                    .col(ColumnDef::new(WheelProducts::Weight).double().null())
                    .col(ColumnDef::new(WheelProducts::BoltPattern).text().null())
                    .col(ColumnDef::new(WheelProducts::Diameter).double().null())
                    .col(ColumnDef::new(WheelProducts::Width).double().null())
                    .col(ColumnDef::new(WheelProducts::BrandName).text().null())
                    .col(ColumnDef::new(WheelProducts::ModelName).text().null())
                    .col(ColumnDef::new(WheelProducts::RebateId).text().null())
                    .to_owned(),
            )
            .await?;

        for prefix in CATALOG_PREFIXES {
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{prefix}_products_rebate_id"))
                        .table(table(prefix, "products"))
                        .col(Alias::new("rebate_id"))
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for prefix in CATALOG_PREFIXES {
            for suffix in ["products", "rebates", "models", "brands"] {
                manager
                    .drop_table(
                        Table::drop()
                            .table(table(prefix, suffix))
                            .if_exists()
                            .to_owned(),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

fn table(prefix: &str, suffix: &str) -> Alias {
    Alias::new(format!("{prefix}_{suffix}"))
}

#[derive(DeriveIden)]
enum Brands {
    Id,
    BrandName,
}

#[derive(DeriveIden)]
enum Models {
    Id,
    ModelName,
    BrandName,
    ModelTaxonId,
}

#[derive(DeriveIden)]
enum Rebates {
    Id,
    BrandId,
    DetailedDescription,
    ExpiresAt,
    Img,
    InstantRebate,
    Name,
    Price,
    ShortDescription,
    StartsAt,
    SubmissionDate,
    SubmissionLink,
    Title,
}

#[derive(DeriveIden)]
enum TireProducts {
    Id,
    Availability,
    Currency,
    Description,
    DualLoadIndex,
    DualMaxInflationPressure,
    DualMaxLoad,
    Featured,
    ImageUrl,
    LoadIndex,
    MaxInflationPressure,
    MaxLoad,
    Mpn,
    OverallDiameter,
    Price,
    RevsPerMile,
    RimWidthRange,
    RoadCondition,
    SectWidth,
    Sidewall,
    SizeDesc,
    Sku,
    SpeedRating,
    Temperature,
    Traction,
    TreadDepth,
    TreadType,
    Treadwear,
    Url,
    Utqg,
    Warranty,
    AspectRatio,
    Diameter,
    Width,
    BrandName,
    ModelName,
    RebateId,
}

#[derive(DeriveIden)]
enum WheelProducts {
    Id,
    Availability,
    BackSpacing,
    BoltCircle,
    Currency,
    Featured,
    Finish,
    HubBore,
    ImageUrl,
    Length,
    Lugs,
    WheelOffset,
    Price,
    Url,
    Weight,
    BoltPattern,
    Diameter,
    Width,
    BrandName,
    ModelName,
    RebateId,
}
