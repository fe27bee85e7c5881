//! Branch earnings, payout settings and settlements.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum BranchWalletSettings {
    Table,
    BranchId,
    CommissionOverride,
    PayoutMethod,
    PayoutAccountNumber,
    PayoutAccountName,
    PayoutBankName,
    UpdatedAt,
}

#[derive(Iden)]
enum BranchEarnings {
    Table,
    Id,
    BranchId,
    SourceType,
    SourceId,
    CustomerId,
    Description,
    GrossAmount,
    CommissionPercent,
    CommissionAmount,
    NetAmount,
    Status,
    SettlementId,
    CreatedAt,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    BranchId,
    RequestedBy,
    Status,
    Amount,
    GrossAmount,
    CommissionAmount,
    EarningsCount,
    PayoutMethod,
    PayoutAccountNumber,
    PayoutAccountName,
    PayoutBankName,
    Notes,
    ApprovedBy,
    ApprovedAt,
    ProcessedBy,
    ProcessingStartedAt,
    CompletedBy,
    CompletedAt,
    TransferReference,
    RejectedBy,
    RejectedAt,
    RejectionReason,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BranchWalletSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BranchWalletSettings::BranchId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BranchWalletSettings::CommissionOverride).big_integer())
                    .col(ColumnDef::new(BranchWalletSettings::PayoutMethod).string())
                    .col(ColumnDef::new(BranchWalletSettings::PayoutAccountNumber).string())
                    .col(ColumnDef::new(BranchWalletSettings::PayoutAccountName).string())
                    .col(ColumnDef::new(BranchWalletSettings::PayoutBankName).string())
                    .col(
                        ColumnDef::new(BranchWalletSettings::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::BranchId).string().not_null())
                    .col(ColumnDef::new(Settlements::RequestedBy).string().not_null())
                    .col(ColumnDef::new(Settlements::Status).string().not_null())
                    .col(ColumnDef::new(Settlements::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Settlements::GrossAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::CommissionAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::EarningsCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::PayoutMethod).string().not_null())
                    .col(
                        ColumnDef::new(Settlements::PayoutAccountNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::PayoutAccountName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::PayoutBankName).string())
                    .col(ColumnDef::new(Settlements::Notes).string())
                    .col(ColumnDef::new(Settlements::ApprovedBy).string())
                    .col(ColumnDef::new(Settlements::ApprovedAt).timestamp())
                    .col(ColumnDef::new(Settlements::ProcessedBy).string())
                    .col(ColumnDef::new(Settlements::ProcessingStartedAt).timestamp())
                    .col(ColumnDef::new(Settlements::CompletedBy).string())
                    .col(ColumnDef::new(Settlements::CompletedAt).timestamp())
                    .col(ColumnDef::new(Settlements::TransferReference).string())
                    .col(ColumnDef::new(Settlements::RejectedBy).string())
                    .col(ColumnDef::new(Settlements::RejectedAt).timestamp())
                    .col(ColumnDef::new(Settlements::RejectionReason).string())
                    .col(
                        ColumnDef::new(Settlements::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Settlements::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Settlements::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-branch_id-status")
                    .table(Settlements::Table)
                    .col(Settlements::BranchId)
                    .col(Settlements::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-status-created_at")
                    .table(Settlements::Table)
                    .col(Settlements::Status)
                    .col(Settlements::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BranchEarnings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BranchEarnings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BranchEarnings::BranchId).string().not_null())
                    .col(ColumnDef::new(BranchEarnings::SourceType).string().not_null())
                    .col(ColumnDef::new(BranchEarnings::SourceId).string().not_null())
                    .col(ColumnDef::new(BranchEarnings::CustomerId).string())
                    .col(ColumnDef::new(BranchEarnings::Description).string())
                    .col(
                        ColumnDef::new(BranchEarnings::GrossAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchEarnings::CommissionPercent)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchEarnings::CommissionAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchEarnings::NetAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BranchEarnings::Status).string().not_null())
                    .col(ColumnDef::new(BranchEarnings::SettlementId).string())
                    .col(
                        ColumnDef::new(BranchEarnings::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-branch_earnings-settlement_id")
                            .from(BranchEarnings::Table, BranchEarnings::SettlementId)
                            .to(Settlements::Table, Settlements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-branch_earnings-branch_id-status")
                    .table(BranchEarnings::Table)
                    .col(BranchEarnings::BranchId)
                    .col(BranchEarnings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-branch_earnings-settlement_id")
                    .table(BranchEarnings::Table)
                    .col(BranchEarnings::SettlementId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BranchEarnings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BranchWalletSettings::Table).to_owned())
            .await?;
        Ok(())
    }
}
