//! Wallet operations.
//!
//! Public methods open their own database transaction. The `*_in` variants
//! run inside a caller's transaction so orders and payments can combine
//! several wallet movements atomically.

use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AdjustBalanceCmd, EngineError, EngineEvent, Reconciliation, Reference, ReferenceType,
    ResultEngine, TopUpCmd, Wallet, WalletBalances, WalletOwner, WalletTransaction, WalletTxKind,
    replay,
    util::{normalize_optional_text, normalize_required_text, require_positive},
    wallet_transactions, wallets,
};

use super::{Engine, stale, with_tx};

/// Record metadata shared by every wallet movement.
pub(crate) struct Movement<'a> {
    pub reference: Reference,
    pub actor: &'a str,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl<'a> Movement<'a> {
    pub(crate) fn new(reference: Reference, actor: &'a str) -> Self {
        Self {
            reference,
            actor,
            description: None,
            idempotency_key: None,
        }
    }

    pub(crate) fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Engine {
    /// Get the wallet of `owner`, creating an empty one on first use.
    pub async fn ensure_wallet(&self, owner: &WalletOwner) -> ResultEngine<Wallet> {
        with_tx!(self, |db_tx| self.ensure_wallet_in(&db_tx, owner).await)
    }

    /// Return a wallet snapshot from DB.
    pub async fn wallet(&self, owner: &WalletOwner) -> ResultEngine<Wallet> {
        with_tx!(self, |db_tx| self.require_wallet(&db_tx, owner).await)
    }

    /// All records of a wallet in `sequence` order.
    pub async fn wallet_transactions(
        &self,
        owner: &WalletOwner,
    ) -> ResultEngine<Vec<WalletTransaction>> {
        with_tx!(self, |db_tx| {
            let wallet = self.require_wallet(&db_tx, owner).await?;
            load_records(&db_tx, wallet.id).await
        })
    }

    /// Reserve `amount` of the spendable balance.
    ///
    /// Fails with `InsufficientFunds` when `balance < amount`; nothing is
    /// written in that case.
    pub async fn hold(
        &self,
        owner: &WalletOwner,
        amount: i64,
        reference: Reference,
        actor: &str,
    ) -> ResultEngine<WalletTransaction> {
        require_positive(amount, "hold amount")?;
        with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, owner).await?;
            self.hold_in(&db_tx, &mut wallet, amount, Movement::new(reference, actor))
                .await
        })
    }

    /// Give `amount` of held money back to the spendable balance.
    pub async fn release_hold(
        &self,
        owner: &WalletOwner,
        amount: i64,
        reference: Reference,
        actor: &str,
    ) -> ResultEngine<WalletTransaction> {
        require_positive(amount, "release amount")?;
        with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, owner).await?;
            self.release_in(&db_tx, &mut wallet, amount, Movement::new(reference, actor))
                .await
        })
    }

    /// Turn `amount` of held money into a payment.
    pub async fn capture(
        &self,
        owner: &WalletOwner,
        amount: i64,
        reference: Reference,
        actor: &str,
    ) -> ResultEngine<WalletTransaction> {
        require_positive(amount, "capture amount")?;
        with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, owner).await?;
            self.capture_in(&db_tx, &mut wallet, amount, Movement::new(reference, actor))
                .await
        })
    }

    /// Move a hold from `old_amount` to `new_amount`.
    ///
    /// Releases the difference when the hold shrinks, holds more when it
    /// grows, and writes nothing when both amounts are equal.
    pub async fn adjust_hold(
        &self,
        owner: &WalletOwner,
        old_amount: i64,
        new_amount: i64,
        reference: Reference,
        actor: &str,
    ) -> ResultEngine<Option<WalletTransaction>> {
        with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, owner).await?;
            self.adjust_hold_in(
                &db_tx,
                &mut wallet,
                old_amount,
                new_amount,
                Movement::new(reference, actor),
            )
            .await
        })
    }

    /// Credit a wallet, creating it if needed.
    ///
    /// With an idempotency key, a replay returns the record of the first
    /// call and does not credit again.
    pub async fn top_up(&self, cmd: TopUpCmd) -> ResultEngine<WalletTransaction> {
        require_positive(cmd.amount, "top-up amount")?;
        let idempotency_key = normalize_optional_text(cmd.idempotency_key.as_deref());
        let description = normalize_optional_text(cmd.description.as_deref());

        let (record, balance, replayed) = with_tx!(self, |db_tx| {
            let mut wallet = self.ensure_wallet_in(&db_tx, &cmd.owner).await?;

            let existing = match idempotency_key.as_deref() {
                Some(key) => wallet_transactions::Entity::find()
                    .filter(wallet_transactions::Column::WalletId.eq(wallet.id.to_string()))
                    .filter(wallet_transactions::Column::IdempotencyKey.eq(key))
                    .one(&db_tx)
                    .await?
                    .map(WalletTransaction::try_from)
                    .transpose()?,
                None => None,
            };

            if let Some(existing) = existing {
                if existing.kind != WalletTxKind::Topup || existing.amount != cmd.amount {
                    return Err(EngineError::Conflict(format!(
                        "idempotency key {} was used for a different movement",
                        existing.idempotency_key.unwrap_or_default()
                    )));
                }
                Ok((existing, wallet.balance, true))
            } else {
                wallet.top_up(cmd.amount)?;
                let movement = Movement {
                    reference: Reference::new(ReferenceType::Topup, cmd.reference_id.clone()),
                    actor: &cmd.actor,
                    description,
                    idempotency_key,
                };
                let record = self
                    .append_record(&db_tx, &mut wallet, WalletTxKind::Topup, cmd.amount, movement)
                    .await?;
                Ok((record, wallet.balance, false))
            }
        })?;

        if !replayed {
            tracing::info!(owner = %cmd.owner, amount = cmd.amount, "wallet topped up");
            self.emit(EngineEvent::WalletToppedUp {
                owner: cmd.owner,
                amount: cmd.amount,
                balance,
            });
        }
        Ok(record)
    }

    /// Manual signed correction with a mandatory audit reason.
    pub async fn adjust_balance(&self, cmd: AdjustBalanceCmd) -> ResultEngine<WalletTransaction> {
        if cmd.amount == 0 {
            return Err(EngineError::Validation(
                "adjustment amount must not be zero".to_string(),
            ));
        }
        let reason = normalize_required_text(&cmd.reason, "adjustment reason")?;
        with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, &cmd.owner).await?;
            wallet.adjust(cmd.amount, cmd.allow_negative)?;
            let movement = Movement::new(
                Reference::new(ReferenceType::Adjustment, None),
                &cmd.actor,
            )
            .description(reason);
            let record = self
                .append_record(&db_tx, &mut wallet, WalletTxKind::Adjustment, cmd.amount, movement)
                .await?;
            tracing::info!(owner = %cmd.owner, amount = cmd.amount, "wallet adjusted");
            Ok(record)
        })
    }

    /// Replay the log of a wallet and compare it with the stored counters.
    pub async fn reconcile_wallet(&self, owner: &WalletOwner) -> ResultEngine<Reconciliation> {
        with_tx!(self, |db_tx| {
            let wallet = self.require_wallet(&db_tx, owner).await?;
            let records = load_records(&db_tx, wallet.id).await?;
            let (replayed, broken_sequences) = replay(&records);
            let report = Reconciliation {
                wallet_id: wallet.id,
                stored: WalletBalances::from(&wallet),
                replayed,
                broken_sequences,
            };
            if !report.is_consistent() {
                tracing::warn!(%owner, ?report, "wallet does not match its log");
            }
            Ok(report)
        })
    }

    pub(crate) async fn ensure_wallet_in(
        &self,
        db_tx: &DatabaseTransaction,
        owner: &WalletOwner,
    ) -> ResultEngine<Wallet> {
        if let Some(wallet) = find_wallet(db_tx, owner).await? {
            return Ok(wallet);
        }
        let wallet = Wallet::new(owner.clone(), Utc::now());
        wallets::ActiveModel::from(&wallet).insert(db_tx).await?;
        tracing::debug!(%owner, wallet_id = %wallet.id, "wallet created");
        Ok(wallet)
    }

    pub(crate) async fn require_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        owner: &WalletOwner,
    ) -> ResultEngine<Wallet> {
        find_wallet(db_tx, owner)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {owner}")))
    }

    pub(crate) async fn hold_in(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        amount: i64,
        movement: Movement<'_>,
    ) -> ResultEngine<WalletTransaction> {
        wallet.hold(amount)?;
        self.append_record(db_tx, wallet, WalletTxKind::Hold, -amount, movement)
            .await
    }

    pub(crate) async fn release_in(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        amount: i64,
        movement: Movement<'_>,
    ) -> ResultEngine<WalletTransaction> {
        wallet.release(amount)?;
        self.append_record(db_tx, wallet, WalletTxKind::ReleaseHold, amount, movement)
            .await
    }

    pub(crate) async fn capture_in(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        amount: i64,
        movement: Movement<'_>,
    ) -> ResultEngine<WalletTransaction> {
        wallet.capture(amount)?;
        self.append_record(db_tx, wallet, WalletTxKind::Payment, -amount, movement)
            .await
    }

    pub(crate) async fn adjust_hold_in(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        old_amount: i64,
        new_amount: i64,
        movement: Movement<'_>,
    ) -> ResultEngine<Option<WalletTransaction>> {
        if old_amount < 0 || new_amount < 0 {
            return Err(EngineError::Validation(
                "hold amounts must not be negative".to_string(),
            ));
        }
        let delta = old_amount - new_amount;
        if delta > 0 {
            self.release_in(db_tx, wallet, delta, movement).await.map(Some)
        } else if delta < 0 {
            self.hold_in(db_tx, wallet, -delta, movement).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Persist the in-memory wallet with a version check and append the
    /// matching record. `amount` is signed from the owner's point of view.
    async fn append_record(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        kind: WalletTxKind,
        amount: i64,
        movement: Movement<'_>,
    ) -> ResultEngine<WalletTransaction> {
        let now = Utc::now();
        let expected_version = wallet.version;
        wallet.version += 1;
        wallet.updated_at = now;

        wallets::Entity::update(wallets::ActiveModel::from(&*wallet))
            .filter(wallets::Column::Version.eq(expected_version))
            .exec(db_tx)
            .await
            .map_err(|err| stale("wallet", err))?;

        let record = WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            kind,
            amount,
            balance_after: wallet.balance,
            held_balance_after: wallet.held_balance,
            sequence: wallet.version,
            reference: movement.reference,
            description: movement.description,
            created_by: movement.actor.to_string(),
            idempotency_key: movement.idempotency_key,
            created_at: now,
        };
        wallet_transactions::ActiveModel::from(&record)
            .insert(db_tx)
            .await?;
        tracing::debug!(
            wallet_id = %wallet.id,
            kind = kind.as_str(),
            amount,
            sequence = record.sequence,
            "wallet record appended"
        );
        Ok(record)
    }
}

async fn find_wallet(
    db_tx: &DatabaseTransaction,
    owner: &WalletOwner,
) -> ResultEngine<Option<Wallet>> {
    wallets::Entity::find()
        .filter(wallets::Column::OwnerKind.eq(owner.kind()))
        .filter(wallets::Column::OwnerId.eq(owner.id()))
        .one(db_tx)
        .await?
        .map(Wallet::try_from)
        .transpose()
}

async fn load_records(
    db_tx: &DatabaseTransaction,
    wallet_id: Uuid,
) -> ResultEngine<Vec<WalletTransaction>> {
    wallet_transactions::Entity::find()
        .filter(wallet_transactions::Column::WalletId.eq(wallet_id.to_string()))
        .order_by_asc(wallet_transactions::Column::Sequence)
        .all(db_tx)
        .await?
        .into_iter()
        .map(WalletTransaction::try_from)
        .collect()
}
