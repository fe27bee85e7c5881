//! Loyalty points ledger and tiers.
//!
//! Points are stored as integers ×100 (4575 = 45.75 points).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum PointsLedgers {
    Table,
    Id,
    UserId,
    CurrentBalance,
    LifetimeEarned,
    LifetimeRedeemed,
    CurrentTier,
    Version,
    LastActivityAt,
    CreatedAt,
}

#[derive(Iden)]
enum PointsTransactions {
    Table,
    Id,
    LedgerId,
    UserId,
    Kind,
    Amount,
    BalanceAfter,
    Sequence,
    SourceType,
    SourceId,
    BranchId,
    Notes,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Tiers {
    Table,
    Id,
    Name,
    Threshold,
    DisplayOrder,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tiers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tiers::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Tiers::Name).string().not_null())
                    .col(ColumnDef::new(Tiers::Threshold).big_integer().not_null())
                    .col(ColumnDef::new(Tiers::DisplayOrder).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tiers-name-unique")
                    .table(Tiers::Table)
                    .col(Tiers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tiers-display_order-unique")
                    .table(Tiers::Table)
                    .col(Tiers::DisplayOrder)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PointsLedgers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PointsLedgers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PointsLedgers::UserId).string().not_null())
                    .col(
                        ColumnDef::new(PointsLedgers::CurrentBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PointsLedgers::LifetimeEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PointsLedgers::LifetimeRedeemed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PointsLedgers::CurrentTier).string())
                    .col(
                        ColumnDef::new(PointsLedgers::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PointsLedgers::LastActivityAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsLedgers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-points_ledgers-user_id-unique")
                    .table(PointsLedgers::Table)
                    .col(PointsLedgers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PointsTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PointsTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PointsTransactions::LedgerId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PointsTransactions::UserId).string().not_null())
                    .col(ColumnDef::new(PointsTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(PointsTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsTransactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsTransactions::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsTransactions::SourceType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PointsTransactions::SourceId).string())
                    .col(ColumnDef::new(PointsTransactions::BranchId).string())
                    .col(ColumnDef::new(PointsTransactions::Notes).string())
                    .col(ColumnDef::new(PointsTransactions::CreatedBy).string())
                    .col(
                        ColumnDef::new(PointsTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-points_transactions-ledger_id")
                            .from(PointsTransactions::Table, PointsTransactions::LedgerId)
                            .to(PointsLedgers::Table, PointsLedgers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-points_transactions-ledger_id-sequence")
                    .table(PointsTransactions::Table)
                    .col(PointsTransactions::LedgerId)
                    .col(PointsTransactions::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-points_transactions-user_id-created_at")
                    .table(PointsTransactions::Table)
                    .col(PointsTransactions::UserId)
                    .col(PointsTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PointsTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PointsLedgers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tiers::Table).to_owned())
            .await?;
        Ok(())
    }
}
