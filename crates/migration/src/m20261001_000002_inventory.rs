//! Two-tier inventory schema.
//!
//! - `catalog_products`: central warehouse products with stock reservations
//! - `branch_products`: per-branch stock, optionally linked to the catalog
//! - `inventory_batches`: FIFO lots at the warehouse or at a branch

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum CatalogProducts {
    Table,
    Id,
    Name,
    Price,
    Cost,
    Stock,
    ReservedStock,
    IsActive,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BranchProducts {
    Table,
    Id,
    BranchId,
    CatalogProductId,
    Name,
    NameNorm,
    Stock,
    Cost,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InventoryBatches {
    Table,
    Id,
    BatchNumber,
    ProductId,
    LocationKind,
    BranchId,
    QuantityRemaining,
    InitialQuantity,
    UnitCost,
    ReceivedAt,
    Sequence,
    ExpiryDate,
    Supplier,
    Notes,
    CreatedBy,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Catalog (central warehouse)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CatalogProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogProducts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CatalogProducts::Name).string().not_null())
                    .col(
                        ColumnDef::new(CatalogProducts::Price)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::Cost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::Stock)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::ReservedStock)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogProducts::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-catalog_products-is_active")
                    .table(CatalogProducts::Table)
                    .col(CatalogProducts::IsActive)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Branch products
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BranchProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BranchProducts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BranchProducts::BranchId).string().not_null())
                    .col(ColumnDef::new(BranchProducts::CatalogProductId).string())
                    .col(ColumnDef::new(BranchProducts::Name).string().not_null())
                    .col(ColumnDef::new(BranchProducts::NameNorm).string().not_null())
                    .col(
                        ColumnDef::new(BranchProducts::Stock)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BranchProducts::Cost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BranchProducts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BranchProducts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchProducts::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-branch_products-branch_id-catalog_product_id")
                    .table(BranchProducts::Table)
                    .col(BranchProducts::BranchId)
                    .col(BranchProducts::CatalogProductId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-branch_products-branch_id-name_norm")
                    .table(BranchProducts::Table)
                    .col(BranchProducts::BranchId)
                    .col(BranchProducts::NameNorm)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Inventory batches
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(InventoryBatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryBatches::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::BatchNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::ProductId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::LocationKind)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryBatches::BranchId).string())
                    .col(
                        ColumnDef::new(InventoryBatches::QuantityRemaining)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::InitialQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::UnitCost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::ReceivedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryBatches::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryBatches::ExpiryDate).timestamp())
                    .col(ColumnDef::new(InventoryBatches::Supplier).string())
                    .col(ColumnDef::new(InventoryBatches::Notes).string())
                    .col(
                        ColumnDef::new(InventoryBatches::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-inventory_batches-product-fifo")
                    .table(InventoryBatches::Table)
                    .col(InventoryBatches::ProductId)
                    .col(InventoryBatches::LocationKind)
                    .col(InventoryBatches::ReceivedAt)
                    .col(InventoryBatches::Sequence)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-inventory_batches-batch_number-unique")
                    .table(InventoryBatches::Table)
                    .col(InventoryBatches::BatchNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryBatches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BranchProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CatalogProducts::Table).to_owned())
            .await?;
        Ok(())
    }
}
