//! Purchase orders from branches to the central warehouse.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ProductOrders {
    Table,
    Id,
    OrderNumber,
    BranchId,
    RequestedBy,
    Status,
    TotalAmount,
    WalletHoldAmount,
    WalletTransactionId,
    IsPaid,
    PaidAt,
    PaidBy,
    PaymentMethod,
    PaymentReference,
    IsManualOrder,
    Notes,
    RejectionReason,
    ApprovedAt,
    ApprovedBy,
    ShippedAt,
    ShippedBy,
    ReceivedAt,
    ReceivedBy,
    ClosedAt,
    ClosedBy,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProductOrderItems {
    Table,
    Id,
    OrderId,
    Position,
    CatalogProductId,
    ProductName,
    QuantityRequested,
    QuantityApproved,
    UnitPrice,
}

#[derive(Iden)]
enum OrderTransitions {
    Table,
    Id,
    OrderId,
    FromStatus,
    ToStatus,
    Actor,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductOrders::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductOrders::OrderNumber)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductOrders::BranchId).string().not_null())
                    .col(
                        ColumnDef::new(ProductOrders::RequestedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductOrders::Status).string().not_null())
                    .col(
                        ColumnDef::new(ProductOrders::TotalAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrders::WalletHoldAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ProductOrders::WalletTransactionId).string())
                    .col(
                        ColumnDef::new(ProductOrders::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ProductOrders::PaidAt).timestamp())
                    .col(ColumnDef::new(ProductOrders::PaidBy).string())
                    .col(ColumnDef::new(ProductOrders::PaymentMethod).string())
                    .col(ColumnDef::new(ProductOrders::PaymentReference).string())
                    .col(
                        ColumnDef::new(ProductOrders::IsManualOrder)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ProductOrders::Notes).string())
                    .col(ColumnDef::new(ProductOrders::RejectionReason).string())
                    .col(ColumnDef::new(ProductOrders::ApprovedAt).timestamp())
                    .col(ColumnDef::new(ProductOrders::ApprovedBy).string())
                    .col(ColumnDef::new(ProductOrders::ShippedAt).timestamp())
                    .col(ColumnDef::new(ProductOrders::ShippedBy).string())
                    .col(ColumnDef::new(ProductOrders::ReceivedAt).timestamp())
                    .col(ColumnDef::new(ProductOrders::ReceivedBy).string())
                    .col(ColumnDef::new(ProductOrders::ClosedAt).timestamp())
                    .col(ColumnDef::new(ProductOrders::ClosedBy).string())
                    .col(
                        ColumnDef::new(ProductOrders::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProductOrders::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrders::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-product_orders-order_number-unique")
                    .table(ProductOrders::Table)
                    .col(ProductOrders::OrderNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-product_orders-branch_id-status")
                    .table(ProductOrders::Table)
                    .col(ProductOrders::BranchId)
                    .col(ProductOrders::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-product_orders-status-created_at")
                    .table(ProductOrders::Table)
                    .col(ProductOrders::Status)
                    .col(ProductOrders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductOrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductOrderItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductOrderItems::OrderId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrderItems::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrderItems::CatalogProductId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrderItems::ProductName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductOrderItems::QuantityRequested)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductOrderItems::QuantityApproved).big_integer())
                    .col(
                        ColumnDef::new(ProductOrderItems::UnitPrice)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-product_order_items-order_id")
                            .from(ProductOrderItems::Table, ProductOrderItems::OrderId)
                            .to(ProductOrders::Table, ProductOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-product_order_items-order_id")
                    .table(ProductOrderItems::Table)
                    .col(ProductOrderItems::OrderId)
                    .col(ProductOrderItems::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderTransitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderTransitions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderTransitions::OrderId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderTransitions::FromStatus).string())
                    .col(
                        ColumnDef::new(OrderTransitions::ToStatus)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderTransitions::Actor).string().not_null())
                    .col(
                        ColumnDef::new(OrderTransitions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-order_transitions-order_id")
                            .from(OrderTransitions::Table, OrderTransitions::OrderId)
                            .to(ProductOrders::Table, ProductOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-order_transitions-order_id-to_status-unique")
                    .table(OrderTransitions::Table)
                    .col(OrderTransitions::OrderId)
                    .col(OrderTransitions::ToStatus)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderTransitions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductOrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductOrders::Table).to_owned())
            .await?;
        Ok(())
    }
}
