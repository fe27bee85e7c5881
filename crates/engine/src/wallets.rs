//! The module contains `Wallet`, the per-branch or per-customer balance
//! holder, and its in-memory balance rules.
//!
//! A wallet keeps two pots:
//! - `balance`: spendable money
//! - `held_balance`: money reserved by a hold and not yet captured
//!
//! Every rule here mutates only the in-memory snapshot. Persisting the row
//! and the matching [`WalletTransaction`](crate::WalletTransaction) is done
//! by the engine inside one database transaction.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Who a wallet belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WalletOwner {
    Branch(String),
    Customer(String),
}

impl WalletOwner {
    pub fn branch(id: impl Into<String>) -> Self {
        Self::Branch(id.into())
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::Customer(id.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Branch(_) => "branch",
            Self::Customer(_) => "customer",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Branch(id) | Self::Customer(id) => id,
        }
    }

    pub(crate) fn from_parts(kind: &str, id: String) -> ResultEngine<Self> {
        match kind {
            "branch" => Ok(Self::Branch(id)),
            "customer" => Ok(Self::Customer(id)),
            other => Err(EngineError::Validation(format!(
                "invalid wallet owner kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for WalletOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl FromStr for WalletOwner {
    type Err = EngineError;

    /// Parses the `kind:id` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| {
            EngineError::Validation(format!("expected branch:<id> or customer:<id>, got {s}"))
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::Validation("wallet owner id must not be empty".to_string()));
        }
        Self::from_parts(kind.trim(), id.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner: WalletOwner,
    pub balance: i64,
    pub held_balance: i64,
    pub total_spent: i64,
    pub total_topped_up: i64,
    /// Incremented on every write; equals the sequence of the last
    /// transaction record.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner: WalletOwner, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            balance: 0,
            held_balance: 0,
            total_spent: 0,
            total_topped_up: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves `amount` from `balance` to `held_balance`.
    pub fn hold(&mut self, amount: i64) -> ResultEngine<()> {
        if self.balance < amount {
            return Err(EngineError::InsufficientFunds(format!(
                "{} has {}, needs {amount}",
                self.owner, self.balance
            )));
        }
        self.held_balance = checked(self.held_balance, amount)?;
        self.balance -= amount;
        Ok(())
    }

    /// Moves `amount` from `held_balance` back to `balance`.
    pub fn release(&mut self, amount: i64) -> ResultEngine<()> {
        self.require_held(amount)?;
        self.balance = checked(self.balance, amount)?;
        self.held_balance -= amount;
        Ok(())
    }

    /// Consumes `amount` of the held money as a payment.
    pub fn capture(&mut self, amount: i64) -> ResultEngine<()> {
        self.require_held(amount)?;
        self.total_spent = checked(self.total_spent, amount)?;
        self.held_balance -= amount;
        Ok(())
    }

    /// Credits `amount`. Nothing changes when a counter would overflow.
    pub fn top_up(&mut self, amount: i64) -> ResultEngine<()> {
        let balance = checked(self.balance, amount)?;
        let total_topped_up = checked(self.total_topped_up, amount)?;
        self.balance = balance;
        self.total_topped_up = total_topped_up;
        Ok(())
    }

    /// Applies a signed correction to `balance`.
    pub fn adjust(&mut self, delta: i64, allow_negative: bool) -> ResultEngine<()> {
        let next = checked(self.balance, delta)?;
        if next < 0 && !allow_negative {
            return Err(EngineError::InsufficientFunds(format!(
                "adjustment of {delta} would leave {} at {next}",
                self.owner
            )));
        }
        self.balance = next;
        Ok(())
    }

    fn require_held(&self, amount: i64) -> ResultEngine<()> {
        if self.held_balance < amount {
            return Err(EngineError::InvalidHoldState(format!(
                "{} holds {}, cannot settle {amount}",
                self.owner, self.held_balance
            )));
        }
        Ok(())
    }
}

fn checked(current: i64, delta: i64) -> ResultEngine<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| EngineError::Validation("amount too large".to_string()))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_kind: String,
    pub owner_id: String,
    pub balance: i64,
    pub held_balance: i64,
    pub total_spent: i64,
    pub total_topped_up: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_transactions::Entity")]
    Transactions,
}

impl Related<super::wallet_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            owner_kind: ActiveValue::Set(value.owner.kind().to_string()),
            owner_id: ActiveValue::Set(value.owner.id().to_string()),
            balance: ActiveValue::Set(value.balance),
            held_balance: ActiveValue::Set(value.held_balance),
            total_spent: ActiveValue::Set(value.total_spent),
            total_topped_up: ActiveValue::Set(value.total_topped_up),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            owner: WalletOwner::from_parts(&model.owner_kind, model.owner_id)?,
            balance: model.balance,
            held_balance: model.held_balance,
            total_spent: model.total_spent,
            total_topped_up: model.total_topped_up,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64) -> Wallet {
        let mut wallet = Wallet::new(WalletOwner::branch("b1"), Utc::now());
        wallet.top_up(balance).unwrap();
        wallet
    }

    #[test]
    fn owner_parses_its_display_form() {
        let owner: WalletOwner = "customer:c-42".parse().unwrap();
        assert_eq!(owner, WalletOwner::customer("c-42"));
        assert_eq!(owner.to_string().parse::<WalletOwner>().unwrap(), owner);
        assert!("vendor:v1".parse::<WalletOwner>().is_err());
        assert!("branch:".parse::<WalletOwner>().is_err());
        assert!("b1".parse::<WalletOwner>().is_err());
    }

    #[test]
    fn hold_moves_balance_to_held() {
        let mut wallet = wallet(10_000);
        wallet.hold(8_000).unwrap();

        assert_eq!(wallet.balance, 2_000);
        assert_eq!(wallet.held_balance, 8_000);
        assert_eq!(wallet.total_topped_up, 10_000);
    }

    #[test]
    fn failed_hold_leaves_wallet_untouched() {
        let mut wallet = wallet(500);
        let before = wallet.clone();

        let err = wallet.hold(501).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InsufficientFunds);
        assert_eq!(wallet, before);
    }

    #[test]
    fn capture_keeps_balance_and_counts_spent() {
        let mut wallet = wallet(10_000);
        wallet.hold(6_000).unwrap();
        wallet.capture(6_000).unwrap();

        assert_eq!(wallet.balance, 4_000);
        assert_eq!(wallet.held_balance, 0);
        assert_eq!(wallet.total_spent, 6_000);
    }

    #[test]
    fn release_or_capture_more_than_held_fails() {
        let mut wallet = wallet(1_000);
        wallet.hold(300).unwrap();

        assert_eq!(
            wallet.release(301).unwrap_err().kind(),
            crate::ErrorKind::InvalidHoldState
        );
        assert_eq!(
            wallet.capture(400).unwrap_err().kind(),
            crate::ErrorKind::InvalidHoldState
        );
        assert_eq!(wallet.held_balance, 300);
    }

    #[test]
    fn overflowing_credit_is_refused() {
        let mut wallet = wallet(i64::MAX);
        let before = wallet.clone();

        assert_eq!(
            wallet.top_up(1),
            Err(EngineError::Validation("amount too large".to_string()))
        );
        assert!(wallet.adjust(1, false).is_err());
        assert_eq!(wallet, before);
    }

    #[test]
    fn negative_adjustment_needs_override() {
        let mut wallet = wallet(100);

        assert!(wallet.adjust(-200, false).is_err());
        assert_eq!(wallet.balance, 100);

        wallet.adjust(-200, true).unwrap();
        assert_eq!(wallet.balance, -100);
    }
}
