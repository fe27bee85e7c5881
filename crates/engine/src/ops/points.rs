//! Loyalty points: earn, redeem, adjust, and tier promotion.

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AdjustPointsCmd, DEFAULT_TIERS, EngineError, EngineEvent, Points, PointsCmd, PointsLedger,
    PointsTransaction, PointsTxKind, ResultEngine, Tier, TierPromotion, points_ledgers,
    points_transactions, promotion_for, tiers,
    util::{normalize_optional_text, normalize_required_text},
};

use super::{Engine, stale, with_tx};

const ADJUSTMENT_SOURCE: &str = "adjustment";
const EXPIRY_SOURCE: &str = "expiry";

/// What a points movement produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PointsOutcome {
    pub transaction: PointsTransaction,
    pub ledger: PointsLedger,
    pub promotion: Option<TierPromotion>,
}

/// A balance that expired, or would expire on a dry run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpiredPoints {
    pub user_id: String,
    pub balance: Points,
    pub last_activity_at: DateTime<Utc>,
}

/// Result of an expiry run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PointsExpiry {
    pub dry_run: bool,
    pub expiry_months: i64,
    pub expired: Vec<ExpiredPoints>,
    pub total: Points,
}

/// Metadata of a points record.
struct Entry {
    source_type: String,
    source_id: Option<String>,
    branch_id: Option<String>,
    notes: Option<String>,
    created_by: Option<String>,
}

impl Entry {
    fn from_cmd(cmd: &PointsCmd) -> ResultEngine<Self> {
        Ok(Self {
            source_type: normalize_required_text(&cmd.source_type, "source type")?,
            source_id: normalize_optional_text(cmd.source_id.as_deref()),
            branch_id: normalize_optional_text(cmd.branch_id.as_deref()),
            notes: normalize_optional_text(cmd.notes.as_deref()),
            created_by: normalize_optional_text(cmd.actor.as_deref()),
        })
    }
}

impl Engine {
    /// Credit points. The first earn opens the ledger; the tier is
    /// re-evaluated against the new lifetime total.
    pub async fn earn_points(&self, cmd: PointsCmd) -> ResultEngine<PointsOutcome> {
        let user_id = normalize_required_text(&cmd.user_id, "user id")?;
        require_positive_points(cmd.amount, "points amount")?;
        let entry = Entry::from_cmd(&cmd)?;

        let outcome = with_tx!(self, |db_tx| {
            let (mut ledger, fresh) = match find_ledger(&db_tx, &user_id).await? {
                Some(ledger) => (ledger, false),
                None => (PointsLedger::new(user_id.clone(), Utc::now()), true),
            };
            ledger.earn(cmd.amount)?;
            let kind = PointsTxKind::Earn;
            self.post(&db_tx, ledger, fresh, kind, cmd.amount, entry, true, Utc::now())
                .await
        })?;

        Ok(self.after_points(outcome))
    }

    /// Debit points. Fails with `InsufficientBalance` and leaves the ledger
    /// untouched when the balance does not cover `amount`.
    pub async fn redeem_points(&self, cmd: PointsCmd) -> ResultEngine<PointsOutcome> {
        let user_id = normalize_required_text(&cmd.user_id, "user id")?;
        require_positive_points(cmd.amount, "points amount")?;
        let entry = Entry::from_cmd(&cmd)?;

        let outcome = with_tx!(self, |db_tx| {
            let mut ledger = find_ledger(&db_tx, &user_id).await?.ok_or_else(|| {
                EngineError::InsufficientBalance(format!(
                    "{user_id} has {}, needs {}",
                    Points::ZERO,
                    cmd.amount
                ))
            })?;
            ledger.redeem(cmd.amount)?;
            let amount = Points::new(-cmd.amount.stored());
            let kind = PointsTxKind::Redeem;
            self.post(&db_tx, ledger, false, kind, amount, entry, false, Utc::now())
                .await
        })?;

        Ok(self.after_points(outcome))
    }

    /// Signed manual correction. A positive adjustment counts toward the
    /// lifetime total and may promote the customer.
    pub async fn adjust_points(&self, cmd: AdjustPointsCmd) -> ResultEngine<PointsOutcome> {
        let user_id = normalize_required_text(&cmd.user_id, "user id")?;
        let reason = normalize_required_text(&cmd.reason, "reason")?;
        let actor = normalize_required_text(&cmd.actor, "actor")?;
        if cmd.amount.stored() == 0 {
            return Err(EngineError::Validation(
                "adjustment amount must not be zero".to_string(),
            ));
        }
        let entry = Entry {
            source_type: ADJUSTMENT_SOURCE.to_string(),
            source_id: None,
            branch_id: None,
            notes: Some(format!("[MANUAL_ADJUST by {actor}] {reason}")),
            created_by: Some(actor),
        };

        let outcome = with_tx!(self, |db_tx| {
            let (mut ledger, fresh) = match find_ledger(&db_tx, &user_id).await? {
                Some(ledger) => (ledger, false),
                None => (PointsLedger::new(user_id.clone(), Utc::now()), true),
            };
            ledger.adjust(cmd.amount, cmd.allow_negative)?;
            let check_tier = cmd.amount.stored() > 0;
            let kind = PointsTxKind::Adjust;
            self.post(&db_tx, ledger, fresh, kind, cmd.amount, entry, check_tier, Utc::now())
                .await
        })?;

        Ok(self.after_points(outcome))
    }

    /// Zero the positive balances of customers inactive for longer than
    /// `points_expiry_months` (30-day months) before `now`.
    ///
    /// Each expiry is an `adjust` record with source `expiry` and moves
    /// `last_activity_at` to `now`, so a second run finds nothing. A dry run
    /// only reports. Expiry is off while the setting is `0`.
    pub async fn expire_points(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> ResultEngine<PointsExpiry> {
        let months = self.config.points_expiry_months;
        let mut report = PointsExpiry {
            dry_run,
            expiry_months: months,
            expired: Vec::new(),
            total: Points::ZERO,
        };
        if months <= 0 {
            return Ok(report);
        }
        let cutoff = months
            .checked_mul(30)
            .and_then(TimeDelta::try_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                EngineError::Validation("points expiry window out of range".to_string())
            })?;

        report.expired = with_tx!(self, |db_tx| {
            let ledgers = points_ledgers::Entity::find()
                .filter(points_ledgers::Column::LastActivityAt.lt(cutoff))
                .filter(points_ledgers::Column::CurrentBalance.gt(0))
                .order_by_asc(points_ledgers::Column::LastActivityAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(PointsLedger::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let mut expired = Vec::with_capacity(ledgers.len());
            for mut ledger in ledgers {
                expired.push(ExpiredPoints {
                    user_id: ledger.user_id.clone(),
                    balance: ledger.current_balance,
                    last_activity_at: ledger.last_activity_at,
                });
                if dry_run {
                    continue;
                }
                let amount = Points::new(-ledger.expire().stored());
                let entry = Entry {
                    source_type: EXPIRY_SOURCE.to_string(),
                    source_id: Some(format!("expiry-{}", now.timestamp_millis())),
                    branch_id: None,
                    notes: Some(format!(
                        "Points expired after {months} months of inactivity"
                    )),
                    created_by: None,
                };
                let kind = PointsTxKind::Adjust;
                self.post(&db_tx, ledger, false, kind, amount, entry, false, now)
                    .await?;
            }
            Ok(expired)
        })?;

        for expired in &report.expired {
            report.total = report.total.checked_add(expired.balance)?;
        }
        tracing::info!(
            dry_run,
            accounts = report.expired.len(),
            total = %report.total,
            "points expiry"
        );
        Ok(report)
    }

    /// Insert the default tiers that are missing. Returns all tiers.
    pub async fn seed_default_tiers(&self) -> ResultEngine<Vec<Tier>> {
        with_tx!(self, |db_tx| {
            let existing = load_tiers(&db_tx).await?;
            for (name, threshold, display_order) in DEFAULT_TIERS {
                if existing.iter().any(|tier| tier.name == name) {
                    continue;
                }
                let tier = Tier {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    threshold,
                    display_order,
                };
                tiers::ActiveModel::from(&tier).insert(&db_tx).await?;
                tracing::debug!(tier = name, threshold, "tier seeded");
            }
            load_tiers(&db_tx).await
        })
    }

    /// Tiers by display order.
    pub async fn tiers(&self) -> ResultEngine<Vec<Tier>> {
        with_tx!(self, |db_tx| load_tiers(&db_tx).await)
    }

    pub async fn points_ledger(&self, user_id: &str) -> ResultEngine<PointsLedger> {
        with_tx!(self, |db_tx| {
            find_ledger(&db_tx, user_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("points ledger {user_id}")))
        })
    }

    /// Points records of a customer in sequence order.
    pub async fn points_history(&self, user_id: &str) -> ResultEngine<Vec<PointsTransaction>> {
        with_tx!(self, |db_tx| {
            points_transactions::Entity::find()
                .filter(points_transactions::Column::UserId.eq(user_id))
                .order_by_asc(points_transactions::Column::Sequence)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(PointsTransaction::try_from)
                .collect()
        })
    }

    /// Persist a mutated ledger and append its record.
    async fn post(
        &self,
        db_tx: &DatabaseTransaction,
        mut ledger: PointsLedger,
        fresh: bool,
        kind: PointsTxKind,
        amount: Points,
        entry: Entry,
        check_tier: bool,
        now: DateTime<Utc>,
    ) -> ResultEngine<PointsOutcome> {
        let promotion = if check_tier {
            let tiers = load_tiers(db_tx).await?;
            promotion_for(
                &tiers,
                ledger.current_tier.as_deref(),
                ledger.lifetime_earned.stored(),
            )
        } else {
            None
        };
        if let Some(promotion) = &promotion {
            ledger.current_tier = Some(promotion.new.clone());
        }

        ledger.last_activity_at = now;
        if fresh {
            ledger.version = 1;
            points_ledgers::ActiveModel::from(&ledger)
                .insert(db_tx)
                .await?;
        } else {
            let expected_version = ledger.version;
            ledger.version += 1;
            points_ledgers::Entity::update(points_ledgers::ActiveModel::from(&ledger))
                .filter(points_ledgers::Column::Version.eq(expected_version))
                .exec(db_tx)
                .await
                .map_err(|err| stale("points ledger", err))?;
        }

        let notes = match (&entry.notes, &promotion) {
            (Some(notes), Some(promotion)) => Some(format!("{notes} {}", promotion.note())),
            (None, Some(promotion)) => Some(promotion.note()),
            (notes, None) => notes.clone(),
        };
        let transaction = PointsTransaction {
            id: Uuid::new_v4(),
            ledger_id: ledger.id,
            user_id: ledger.user_id.clone(),
            kind,
            amount,
            balance_after: ledger.current_balance,
            sequence: ledger.version,
            source_type: entry.source_type,
            source_id: entry.source_id,
            branch_id: entry.branch_id,
            notes,
            created_by: entry.created_by,
            created_at: now,
        };
        points_transactions::ActiveModel::from(&transaction)
            .insert(db_tx)
            .await?;

        Ok(PointsOutcome {
            transaction,
            ledger,
            promotion,
        })
    }

    fn after_points(&self, outcome: PointsOutcome) -> PointsOutcome {
        tracing::info!(
            user_id = %outcome.ledger.user_id,
            kind = outcome.transaction.kind.as_str(),
            amount = %outcome.transaction.amount,
            balance = %outcome.ledger.current_balance,
            "points movement"
        );
        if let Some(promotion) = &outcome.promotion {
            tracing::info!(
                user_id = %outcome.ledger.user_id,
                previous = promotion.previous.as_deref().unwrap_or("None"),
                new = %promotion.new,
                "tier promotion"
            );
            self.emit(EngineEvent::TierPromoted {
                user_id: outcome.ledger.user_id.clone(),
                previous: promotion.previous.clone(),
                new: promotion.new.clone(),
            });
        }
        outcome
    }
}

fn require_positive_points(amount: Points, label: &str) -> ResultEngine<()> {
    if amount.stored() <= 0 {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

async fn find_ledger(
    db_tx: &DatabaseTransaction,
    user_id: &str,
) -> ResultEngine<Option<PointsLedger>> {
    points_ledgers::Entity::find()
        .filter(points_ledgers::Column::UserId.eq(user_id))
        .one(db_tx)
        .await?
        .map(PointsLedger::try_from)
        .transpose()
}

async fn load_tiers(db_tx: &DatabaseTransaction) -> ResultEngine<Vec<Tier>> {
    tiers::Entity::find()
        .order_by_asc(tiers::Column::DisplayOrder)
        .all(db_tx)
        .await?
        .into_iter()
        .map(Tier::try_from)
        .collect()
}
