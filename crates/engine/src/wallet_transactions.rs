//! Append-only wallet transaction log.
//!
//! Amounts are signed from the wallet owner's point of view:
//!
//! | kind           | amount | balance | held    |
//! |----------------|--------|---------|---------|
//! | `topup`        | `+a`   | `+a`    |         |
//! | `hold`         | `-a`   | `-a`    | `+a`    |
//! | `release_hold` | `+a`   | `+a`    | `-a`    |
//! | `payment`      | `-a`   |         | `-a`    |
//! | `adjustment`   | `±a`   | `±a`    |         |
//!
//! Replaying a wallet's records in `sequence` order from zero reproduces the
//! stored wallet, see [`replay`].

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Wallet, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTxKind {
    Topup,
    Hold,
    ReleaseHold,
    Payment,
    Adjustment,
}

impl WalletTxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Hold => "hold",
            Self::ReleaseHold => "release_hold",
            Self::Payment => "payment",
            Self::Adjustment => "adjustment",
        }
    }
}

impl TryFrom<&str> for WalletTxKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "topup" => Ok(Self::Topup),
            "hold" => Ok(Self::Hold),
            "release_hold" => Ok(Self::ReleaseHold),
            "payment" => Ok(Self::Payment),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::Validation(format!(
                "invalid wallet transaction kind: {other}"
            ))),
        }
    }
}

/// What a wallet movement was made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    ProductOrder,
    Topup,
    Adjustment,
    ServicePayment,
    Manual,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductOrder => "product_order",
            Self::Topup => "topup",
            Self::Adjustment => "adjustment",
            Self::ServicePayment => "service_payment",
            Self::Manual => "manual",
        }
    }
}

impl TryFrom<&str> for ReferenceType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "product_order" => Ok(Self::ProductOrder),
            "topup" => Ok(Self::Topup),
            "adjustment" => Ok(Self::Adjustment),
            "service_payment" => Ok(Self::ServicePayment),
            "manual" => Ok(Self::Manual),
            other => Err(EngineError::Validation(format!(
                "invalid reference type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub kind: ReferenceType,
    pub id: Option<String>,
}

impl Reference {
    pub fn new(kind: ReferenceType, id: Option<String>) -> Self {
        Self { kind, id }
    }

    pub fn order(order_id: Uuid) -> Self {
        Self::new(ReferenceType::ProductOrder, Some(order_id.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: WalletTxKind,
    pub amount: i64,
    pub balance_after: i64,
    pub held_balance_after: i64,
    pub sequence: i64,
    pub reference: Reference,
    pub description: Option<String>,
    pub created_by: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Balance counters of a wallet, either stored or rebuilt from the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalletBalances {
    pub balance: i64,
    pub held_balance: i64,
    pub total_spent: i64,
    pub total_topped_up: i64,
}

impl From<&Wallet> for WalletBalances {
    fn from(wallet: &Wallet) -> Self {
        Self {
            balance: wallet.balance,
            held_balance: wallet.held_balance,
            total_spent: wallet.total_spent,
            total_topped_up: wallet.total_topped_up,
        }
    }
}

/// Result of comparing a stored wallet with its replayed log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub wallet_id: Uuid,
    pub stored: WalletBalances,
    pub replayed: WalletBalances,
    /// Sequences whose `*_after` snapshot disagrees with the replay.
    pub broken_sequences: Vec<i64>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed && self.broken_sequences.is_empty()
    }
}

/// Rebuilds the wallet counters from its records, in the given order.
///
/// Returns the replayed counters and the sequences whose recorded
/// `balance_after`/`held_balance_after` do not match the running totals.
pub fn replay(records: &[WalletTransaction]) -> (WalletBalances, Vec<i64>) {
    let mut acc = WalletBalances::default();
    let mut broken = Vec::new();
    for record in records {
        let amount = record.amount;
        match record.kind {
            WalletTxKind::Topup => {
                acc.balance += amount;
                acc.total_topped_up += amount;
            }
            WalletTxKind::Adjustment => acc.balance += amount,
            WalletTxKind::Hold | WalletTxKind::ReleaseHold => {
                acc.balance += amount;
                acc.held_balance -= amount;
            }
            WalletTxKind::Payment => {
                acc.held_balance += amount;
                acc.total_spent -= amount;
            }
        }
        if acc.balance != record.balance_after || acc.held_balance != record.held_balance_after {
            broken.push(record.sequence);
        }
    }
    (acc, broken)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub wallet_id: String,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub held_balance_after: i64,
    pub sequence: i64,
    pub reference_type: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_by: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&WalletTransaction> for ActiveModel {
    fn from(tx: &WalletTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            wallet_id: ActiveValue::Set(tx.wallet_id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount: ActiveValue::Set(tx.amount),
            balance_after: ActiveValue::Set(tx.balance_after),
            held_balance_after: ActiveValue::Set(tx.held_balance_after),
            sequence: ActiveValue::Set(tx.sequence),
            reference_type: ActiveValue::Set(tx.reference.kind.as_str().to_string()),
            reference_id: ActiveValue::Set(tx.reference.id.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for WalletTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet transaction")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            kind: WalletTxKind::try_from(model.kind.as_str())?,
            amount: model.amount,
            balance_after: model.balance_after,
            held_balance_after: model.held_balance_after,
            sequence: model.sequence,
            reference: Reference {
                kind: ReferenceType::try_from(model.reference_type.as_str())?,
                id: model.reference_id,
            },
            description: model.description,
            created_by: model.created_by,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
        })
    }
}
