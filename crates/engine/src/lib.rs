//! Branch ledger and order-fulfillment engine.
//!
//! - wallets with hold / release / capture and an append-only log
//! - a two-tier inventory (central warehouse, branches) with FIFO lots
//! - purchase orders from branches to the warehouse
//! - branch earnings and their settlement
//! - a loyalty points ledger with tier promotion
//!
//! Every write goes through [`Engine`] and runs inside one database
//! transaction.

pub use amount::{Money, Points};
pub use branch_earnings::{
    BranchEarning, Commission, EarningSource, EarningStatus, calculate_commission,
};
pub use branch_products::BranchProduct;
pub use branch_wallet_settings::{BranchWalletSettings, PayoutDetails};
pub use catalog_products::CatalogProduct;
pub use commands::{
    AdjustBalanceCmd, AdjustPointsCmd, ApproveOrderCmd, BranchWalletSettingsCmd,
    CatalogProductCmd, CreateOrderCmd, ManualOrder, OrderPayment, PointsCmd, ReceiveStockCmd,
    RecordEarningCmd, TopUpCmd, WalletPaymentCmd,
};
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};
pub use inventory_batches::{BatchDraw, InventoryBatch, StockLocation, allocate_fifo};
pub use notify::{EngineEvent, LogNotifier, Notifier, NotifyError};
pub use ops::{
    EarningsSummary, Engine, EngineBuilder, ExpiredPoints, PointsExpiry, PointsOutcome,
    WalletPayment,
};
pub use points_ledgers::PointsLedger;
pub use points_transactions::{PointsTransaction, PointsTxKind};
pub use product_order_items::OrderItem;
pub use product_orders::{OrderStatus, PaymentMethod, ProductOrder};
pub use settlements::{PayoutMethod, Settlement, SettlementStatus};
pub use tiers::{DEFAULT_TIERS, Tier, TierPromotion, promotion_for, tier_for_points};
pub use wallet_transactions::{
    Reconciliation, Reference, ReferenceType, WalletBalances, WalletTransaction, WalletTxKind,
    replay,
};
pub use wallets::{Wallet, WalletOwner};

mod amount;
mod branch_earnings;
mod branch_products;
mod branch_wallet_settings;
mod catalog_products;
mod commands;
mod config;
mod error;
mod inventory_batches;
mod notify;
mod ops;
mod order_transitions;
mod points_ledgers;
mod points_transactions;
mod product_order_items;
mod product_orders;
mod reference_counters;
mod settlements;
mod tiers;
mod util;
mod wallet_transactions;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
