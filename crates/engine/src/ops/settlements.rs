//! Branch earnings and the settlement (payout) lifecycle.
//!
//! ```text
//! pending ──► approved ──► processing ──► completed
//!    │            │              │
//!    └────────────┴──────────────┴──► rejected
//! ```
//!
//! A settlement locks the pending earnings of its branch by stamping their
//! `settlement_id` with a conditional update, so an earning belongs to at
//! most one open settlement. Completing settles the earnings; rejecting
//! unlocks them for the next request.

use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    BranchEarning, BranchWalletSettings, BranchWalletSettingsCmd, EarningSource, EarningStatus,
    EngineError, EngineEvent, RecordEarningCmd, Reference, ReferenceType, ResultEngine,
    Settlement, SettlementStatus, WalletOwner, WalletPaymentCmd, WalletTransaction,
    branch_earnings, branch_wallet_settings, calculate_commission, settlements,
    util::{normalize_optional_text, normalize_required_text, require_positive},
};

use super::{Engine, ledger::Movement, stale, with_tx};

/// Result of a customer paying a branch from their wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletPayment {
    pub hold: WalletTransaction,
    pub payment: WalletTransaction,
    pub earning: BranchEarning,
}

/// Totals of the earnings a branch could settle right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EarningsSummary {
    pub count: i64,
    pub gross: i64,
    pub commission: i64,
    pub net: i64,
}

impl EarningsSummary {
    fn of(earnings: &[BranchEarning]) -> Self {
        earnings.iter().fold(Self::default(), |acc, earning| Self {
            count: acc.count + 1,
            gross: acc.gross + earning.gross_amount,
            commission: acc.commission + earning.commission_amount,
            net: acc.net + earning.net_amount,
        })
    }
}

impl Engine {
    /// Record money a branch earned, net of HQ commission.
    ///
    /// The commission percent is the branch override when set, the
    /// configured default otherwise.
    pub async fn record_earning(&self, cmd: RecordEarningCmd) -> ResultEngine<BranchEarning> {
        with_tx!(self, |db_tx| self.record_earning_in(&db_tx, &cmd).await)
    }

    /// Pay a branch from a customer wallet.
    ///
    /// The gross is held and captured on the customer wallet and an earning
    /// is recorded for the branch, all in one transaction.
    pub async fn pay_with_wallet(&self, cmd: WalletPaymentCmd) -> ResultEngine<WalletPayment> {
        require_positive(cmd.amount, "payment amount")?;
        let actor = normalize_required_text(&cmd.actor, "actor")?;
        let source_id = normalize_required_text(&cmd.source_id, "source id")?;
        let description = normalize_optional_text(cmd.description.as_deref())
            .unwrap_or_else(|| format!("Payment to branch {}", cmd.branch_id.trim()));
        let owner = WalletOwner::customer(cmd.customer_id.trim());

        let payment = with_tx!(self, |db_tx| {
            let mut wallet = self.require_wallet(&db_tx, &owner).await?;
            let reference = Reference::new(ReferenceType::ServicePayment, Some(source_id.clone()));
            let hold = self
                .hold_in(
                    &db_tx,
                    &mut wallet,
                    cmd.amount,
                    Movement::new(reference.clone(), &actor).description(description.clone()),
                )
                .await?;
            let payment = self
                .capture_in(
                    &db_tx,
                    &mut wallet,
                    cmd.amount,
                    Movement::new(reference, &actor).description(description.clone()),
                )
                .await?;
            let earning_cmd = RecordEarningCmd {
                branch_id: cmd.branch_id.clone(),
                source: EarningSource::WalletPayment,
                source_id: source_id.clone(),
                gross_amount: cmd.amount,
                customer_id: Some(cmd.customer_id.trim().to_string()),
                description: Some(description.clone()),
            };
            let earning = self.record_earning_in(&db_tx, &earning_cmd).await?;
            Ok(WalletPayment {
                hold,
                payment,
                earning,
            })
        })?;

        tracing::info!(
            customer = %owner,
            branch_id = %payment.earning.branch_id,
            amount = cmd.amount,
            "wallet payment"
        );
        Ok(payment)
    }

    /// Replace the commission override and payout destination of a branch.
    pub async fn set_branch_wallet_settings(
        &self,
        cmd: BranchWalletSettingsCmd,
    ) -> ResultEngine<BranchWalletSettings> {
        let branch_id = normalize_required_text(&cmd.branch_id, "branch id")?;
        if cmd
            .commission_override
            .is_some_and(|percent| !(0..=100).contains(&percent))
        {
            return Err(EngineError::Validation(
                "commission percent must be between 0 and 100".to_string(),
            ));
        }
        let settings = BranchWalletSettings {
            branch_id: branch_id.clone(),
            commission_override: cmd.commission_override,
            payout_method: cmd.payout_method,
            payout_account_number: normalize_optional_text(cmd.payout_account_number.as_deref()),
            payout_account_name: normalize_optional_text(cmd.payout_account_name.as_deref()),
            payout_bank_name: normalize_optional_text(cmd.payout_bank_name.as_deref()),
            updated_at: Utc::now(),
        };
        if settings.payout_method.is_some() {
            settings.payout_details()?;
        }

        with_tx!(self, |db_tx| {
            let existing = branch_wallet_settings::Entity::find_by_id(branch_id.clone())
                .one(&db_tx)
                .await?;
            let model = branch_wallet_settings::ActiveModel::from(&settings);
            if existing.is_some() {
                branch_wallet_settings::Entity::update(model)
                    .exec(&db_tx)
                    .await?;
            } else {
                model.insert(&db_tx).await?;
            }
            Ok(settings)
        })
    }

    pub async fn branch_wallet_settings(
        &self,
        branch_id: &str,
    ) -> ResultEngine<Option<BranchWalletSettings>> {
        with_tx!(self, |db_tx| load_settings(&db_tx, branch_id).await)
    }

    /// Ask HQ to pay out every pending, unlocked earning of a branch.
    pub async fn request_settlement(
        &self,
        branch_id: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> ResultEngine<Settlement> {
        let branch_id = normalize_required_text(branch_id, "branch id")?;
        let actor = normalize_required_text(actor, "actor")?;
        let notes = normalize_optional_text(notes);

        let settlement = with_tx!(self, |db_tx| {
            let open = settlements::Entity::find()
                .filter(settlements::Column::BranchId.eq(branch_id.as_str()))
                .filter(settlements::Column::Status.is_in(SettlementStatus::open_values()))
                .one(&db_tx)
                .await?;
            if open.is_some() {
                return Err(EngineError::InvalidStateTransition(format!(
                    "branch {branch_id} already has an open settlement"
                )));
            }

            let earnings = load_unsettled(&db_tx, &branch_id).await?;
            if earnings.is_empty() {
                return Err(EngineError::Validation(format!(
                    "branch {branch_id} has no pending earnings"
                )));
            }
            let summary = EarningsSummary::of(&earnings);
            if summary.net < self.config.min_settlement_amount {
                return Err(EngineError::Validation(format!(
                    "settlement amount {} is below the minimum {}",
                    summary.net, self.config.min_settlement_amount
                )));
            }
            let payout = load_settings(&db_tx, &branch_id)
                .await?
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "branch {branch_id} has no payout method configured"
                    ))
                })?
                .payout_details()?;

            let now = Utc::now();
            let settlement = Settlement {
                id: Uuid::new_v4(),
                branch_id: branch_id.clone(),
                requested_by: actor.clone(),
                status: SettlementStatus::Pending,
                amount: summary.net,
                gross_amount: summary.gross,
                commission_amount: summary.commission,
                earnings_count: summary.count,
                payout_method: payout.method,
                payout_account_number: payout.account_number,
                payout_account_name: payout.account_name,
                payout_bank_name: payout.bank_name,
                notes: notes.clone(),
                approved_by: None,
                approved_at: None,
                processed_by: None,
                processing_started_at: None,
                completed_by: None,
                completed_at: None,
                transfer_reference: None,
                rejected_by: None,
                rejected_at: None,
                rejection_reason: None,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            settlements::ActiveModel::from(&settlement)
                .insert(&db_tx)
                .await?;

            let ids: Vec<String> = earnings.iter().map(|e| e.id.to_string()).collect();
            let locked = branch_earnings::Entity::update_many()
                .col_expr(
                    branch_earnings::Column::SettlementId,
                    Expr::value(settlement.id.to_string()),
                )
                .filter(branch_earnings::Column::Id.is_in(ids))
                .filter(branch_earnings::Column::SettlementId.is_null())
                .exec(&db_tx)
                .await?;
            if locked.rows_affected != earnings.len() as u64 {
                return Err(EngineError::Conflict(format!(
                    "earnings of branch {branch_id} were claimed concurrently"
                )));
            }
            Ok(settlement)
        })?;

        tracing::info!(
            settlement_id = %settlement.id,
            branch_id = %settlement.branch_id,
            amount = settlement.amount,
            earnings = settlement.earnings_count,
            "settlement requested"
        );
        self.emit(EngineEvent::SettlementStatusChanged {
            settlement_id: settlement.id,
            branch_id: settlement.branch_id.clone(),
            from: None,
            to: settlement.status,
            amount: settlement.amount,
        });
        Ok(settlement)
    }

    pub async fn approve_settlement(
        &self,
        settlement_id: Uuid,
        actor: &str,
        notes: Option<&str>,
    ) -> ResultEngine<Settlement> {
        let actor = normalize_required_text(actor, "actor")?;
        let notes = normalize_optional_text(notes);
        self.transition_settlement(settlement_id, SettlementStatus::Approved, |settlement, now| {
            settlement.approved_by = Some(actor.clone());
            settlement.approved_at = Some(now);
            if notes.is_some() {
                settlement.notes = notes.clone();
            }
        })
        .await
    }

    pub async fn mark_settlement_processing(
        &self,
        settlement_id: Uuid,
        actor: &str,
    ) -> ResultEngine<Settlement> {
        let actor = normalize_required_text(actor, "actor")?;
        self.transition_settlement(
            settlement_id,
            SettlementStatus::Processing,
            |settlement, now| {
                settlement.processed_by = Some(actor.clone());
                settlement.processing_started_at = Some(now);
            },
        )
        .await
    }

    /// Close a settlement once the transfer went out. Its earnings become
    /// `settled`.
    pub async fn complete_settlement(
        &self,
        settlement_id: Uuid,
        actor: &str,
        transfer_reference: &str,
    ) -> ResultEngine<Settlement> {
        let actor = normalize_required_text(actor, "actor")?;
        let transfer_reference = normalize_required_text(transfer_reference, "transfer reference")?;
        self.transition_settlement(
            settlement_id,
            SettlementStatus::Completed,
            |settlement, now| {
                settlement.completed_by = Some(actor.clone());
                settlement.completed_at = Some(now);
                settlement.transfer_reference = Some(transfer_reference.clone());
            },
        )
        .await
    }

    /// Refuse a settlement. Its earnings are unlocked and may be requested
    /// again.
    pub async fn reject_settlement(
        &self,
        settlement_id: Uuid,
        actor: &str,
        reason: &str,
    ) -> ResultEngine<Settlement> {
        let actor = normalize_required_text(actor, "actor")?;
        let reason = normalize_required_text(reason, "rejection reason")?;
        self.transition_settlement(settlement_id, SettlementStatus::Rejected, |settlement, now| {
            settlement.rejected_by = Some(actor.clone());
            settlement.rejected_at = Some(now);
            settlement.rejection_reason = Some(reason.clone());
        })
        .await
    }

    pub async fn settlement(&self, settlement_id: Uuid) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| load_settlement(&db_tx, settlement_id).await)
    }

    /// Earnings locked by a settlement, oldest first.
    pub async fn settlement_earnings(
        &self,
        settlement_id: Uuid,
    ) -> ResultEngine<Vec<BranchEarning>> {
        with_tx!(self, |db_tx| {
            load_settlement(&db_tx, settlement_id).await?;
            branch_earnings::Entity::find()
                .filter(branch_earnings::Column::SettlementId.eq(settlement_id.to_string()))
                .order_by_asc(branch_earnings::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(BranchEarning::try_from)
                .collect()
        })
    }

    /// Settlements of a branch, newest first.
    pub async fn branch_settlements(&self, branch_id: &str) -> ResultEngine<Vec<Settlement>> {
        with_tx!(self, |db_tx| {
            settlements::Entity::find()
                .filter(settlements::Column::BranchId.eq(branch_id))
                .order_by_desc(settlements::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Settlement::try_from)
                .collect()
        })
    }

    /// Settlements in `status` across branches, oldest first.
    pub async fn settlements_by_status(
        &self,
        status: SettlementStatus,
    ) -> ResultEngine<Vec<Settlement>> {
        with_tx!(self, |db_tx| {
            settlements::Entity::find()
                .filter(settlements::Column::Status.eq(status.as_str()))
                .order_by_asc(settlements::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Settlement::try_from)
                .collect()
        })
    }

    /// What a settlement request would pay out right now.
    pub async fn pending_earnings_summary(&self, branch_id: &str) -> ResultEngine<EarningsSummary> {
        with_tx!(self, |db_tx| {
            let earnings = load_unsettled(&db_tx, branch_id).await?;
            Ok(EarningsSummary::of(&earnings))
        })
    }

    pub(crate) async fn record_earning_in(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &RecordEarningCmd,
    ) -> ResultEngine<BranchEarning> {
        let branch_id = normalize_required_text(&cmd.branch_id, "branch id")?;
        let source_id = normalize_required_text(&cmd.source_id, "source id")?;
        require_positive(cmd.gross_amount, "gross amount")?;

        let percent = load_settings(db_tx, &branch_id)
            .await?
            .and_then(|settings| settings.commission_override)
            .unwrap_or(self.config.default_commission_percent);
        let commission = calculate_commission(cmd.gross_amount, percent)?;

        let earning = BranchEarning {
            id: Uuid::new_v4(),
            branch_id,
            source_type: cmd.source,
            source_id,
            customer_id: normalize_optional_text(cmd.customer_id.as_deref()),
            description: normalize_optional_text(cmd.description.as_deref()),
            gross_amount: cmd.gross_amount,
            commission_percent: commission.percent,
            commission_amount: commission.amount,
            net_amount: commission.net,
            status: EarningStatus::Pending,
            settlement_id: None,
            created_at: Utc::now(),
        };
        branch_earnings::ActiveModel::from(&earning)
            .insert(db_tx)
            .await?;
        tracing::debug!(
            earning_id = %earning.id,
            branch_id = %earning.branch_id,
            gross = earning.gross_amount,
            commission = earning.commission_amount,
            "earning recorded"
        );
        Ok(earning)
    }

    async fn transition_settlement<F>(
        &self,
        settlement_id: Uuid,
        to: SettlementStatus,
        apply: F,
    ) -> ResultEngine<Settlement>
    where
        F: FnOnce(&mut Settlement, chrono::DateTime<Utc>),
    {
        let (settlement, from) = with_tx!(self, |db_tx| {
            let mut settlement = load_settlement(&db_tx, settlement_id).await?;
            let from = settlement.status;
            from.ensure_transition(to)?;

            let now = Utc::now();
            apply(&mut settlement, now);
            let expected_version = settlement.version;
            settlement.status = to;
            settlement.version += 1;
            settlement.updated_at = now;
            settlements::Entity::update(settlements::ActiveModel::from(&settlement))
                .filter(settlements::Column::Version.eq(expected_version))
                .exec(&db_tx)
                .await
                .map_err(|err| stale("settlement", err))?;

            match to {
                SettlementStatus::Completed => {
                    branch_earnings::Entity::update_many()
                        .col_expr(
                            branch_earnings::Column::Status,
                            Expr::value(EarningStatus::Settled.as_str()),
                        )
                        .filter(branch_earnings::Column::SettlementId.eq(settlement.id.to_string()))
                        .exec(&db_tx)
                        .await?;
                }
                SettlementStatus::Rejected => {
                    branch_earnings::Entity::update_many()
                        .col_expr(
                            branch_earnings::Column::SettlementId,
                            Expr::value(Option::<String>::None),
                        )
                        .filter(branch_earnings::Column::SettlementId.eq(settlement.id.to_string()))
                        .filter(branch_earnings::Column::Status.eq(EarningStatus::Pending.as_str()))
                        .exec(&db_tx)
                        .await?;
                }
                _ => {}
            }
            Ok((settlement, from))
        })?;

        tracing::info!(
            settlement_id = %settlement.id,
            branch_id = %settlement.branch_id,
            from = from.as_str(),
            to = settlement.status.as_str(),
            "settlement transition"
        );
        self.emit(EngineEvent::SettlementStatusChanged {
            settlement_id: settlement.id,
            branch_id: settlement.branch_id.clone(),
            from: Some(from),
            to: settlement.status,
            amount: settlement.amount,
        });
        Ok(settlement)
    }
}

async fn load_settlement(
    db_tx: &DatabaseTransaction,
    settlement_id: Uuid,
) -> ResultEngine<Settlement> {
    let model = settlements::Entity::find_by_id(settlement_id.to_string())
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("settlement {settlement_id}")))?;
    Settlement::try_from(model)
}

async fn load_settings(
    db_tx: &DatabaseTransaction,
    branch_id: &str,
) -> ResultEngine<Option<BranchWalletSettings>> {
    branch_wallet_settings::Entity::find_by_id(branch_id.to_string())
        .one(db_tx)
        .await?
        .map(BranchWalletSettings::try_from)
        .transpose()
}

/// Pending earnings of a branch not locked by any settlement.
async fn load_unsettled(
    db_tx: &DatabaseTransaction,
    branch_id: &str,
) -> ResultEngine<Vec<BranchEarning>> {
    branch_earnings::Entity::find()
        .filter(branch_earnings::Column::BranchId.eq(branch_id))
        .filter(branch_earnings::Column::Status.eq(EarningStatus::Pending.as_str()))
        .filter(branch_earnings::Column::SettlementId.is_null())
        .order_by_asc(branch_earnings::Column::CreatedAt)
        .all(db_tx)
        .await?
        .into_iter()
        .map(BranchEarning::try_from)
        .collect()
}
