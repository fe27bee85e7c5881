//! Wallet ledger schema.
//!
//! - `wallets`: one row per branch or customer, with denormalized balances
//! - `wallet_transactions`: append-only log; replaying it rebuilds `wallets`

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
    OwnerKind,
    OwnerId,
    Balance,
    HeldBalance,
    TotalSpent,
    TotalToppedUp,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum WalletTransactions {
    Table,
    Id,
    WalletId,
    Kind,
    Amount,
    BalanceAfter,
    HeldBalanceAfter,
    Sequence,
    ReferenceType,
    ReferenceId,
    Description,
    CreatedBy,
    IdempotencyKey,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallets::OwnerKind).string().not_null())
                    .col(ColumnDef::new(Wallets::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::HeldBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::TotalSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::TotalToppedUp)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallets-owner-unique")
                    .table(Wallets::Table)
                    .col(Wallets::OwnerKind)
                    .col(Wallets::OwnerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WalletTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::WalletId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(WalletTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::HeldBalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletTransactions::ReferenceType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::ReferenceId).string())
                    .col(ColumnDef::new(WalletTransactions::Description).string())
                    .col(
                        ColumnDef::new(WalletTransactions::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(WalletTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallet_transactions-wallet_id")
                            .from(WalletTransactions::Table, WalletTransactions::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_transactions-wallet_id-sequence")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::WalletId)
                    .col(WalletTransactions::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_transactions-idempotency_key")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::WalletId)
                    .col(WalletTransactions::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_transactions-reference")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::ReferenceType)
                    .col(WalletTransactions::ReferenceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        Ok(())
    }
}
