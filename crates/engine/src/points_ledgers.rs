use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, Points, ResultEngine, util::parse_uuid};

/// Loyalty balance of one customer. Amounts are stored ×100.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PointsLedger {
    pub id: Uuid,
    pub user_id: String,
    pub current_balance: Points,
    pub lifetime_earned: Points,
    pub lifetime_redeemed: Points,
    pub current_tier: Option<String>,
    pub version: i64,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PointsLedger {
    pub fn new(user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            current_balance: Points::ZERO,
            lifetime_earned: Points::ZERO,
            lifetime_redeemed: Points::ZERO,
            current_tier: None,
            version: 0,
            last_activity_at: now,
            created_at: now,
        }
    }

    pub fn earn(&mut self, amount: Points) -> ResultEngine<()> {
        let balance = self.current_balance.checked_add(amount)?;
        let lifetime = self.lifetime_earned.checked_add(amount)?;
        self.current_balance = balance;
        self.lifetime_earned = lifetime;
        Ok(())
    }

    pub fn redeem(&mut self, amount: Points) -> ResultEngine<()> {
        if self.current_balance < amount {
            return Err(EngineError::InsufficientBalance(format!(
                "{} has {}, needs {amount}",
                self.user_id, self.current_balance
            )));
        }
        let redeemed = self.lifetime_redeemed.checked_add(amount)?;
        self.current_balance = Points::new(self.current_balance.stored() - amount.stored());
        self.lifetime_redeemed = redeemed;
        Ok(())
    }

    /// Signed correction. Positive corrections count toward the lifetime
    /// total.
    pub fn adjust(&mut self, delta: Points, allow_negative: bool) -> ResultEngine<()> {
        let next = self.current_balance.checked_add(delta)?;
        if next.stored() < 0 && !allow_negative {
            return Err(EngineError::InsufficientBalance(format!(
                "adjustment of {delta} would leave {} at {next}",
                self.user_id
            )));
        }
        let lifetime = if delta.stored() > 0 {
            self.lifetime_earned.checked_add(delta)?
        } else {
            self.lifetime_earned
        };
        self.current_balance = next;
        self.lifetime_earned = lifetime;
        Ok(())
    }

    /// Zeroes a positive balance. Returns what was removed.
    pub fn expire(&mut self) -> Points {
        let expired = self.current_balance;
        self.current_balance = Points::ZERO;
        expired
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "points_ledgers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub current_balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_redeemed: i64,
    pub current_tier: Option<String>,
    pub version: i64,
    pub last_activity_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::points_transactions::Entity")]
    Transactions,
}

impl Related<super::points_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PointsLedger> for ActiveModel {
    fn from(value: &PointsLedger) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            current_balance: ActiveValue::Set(value.current_balance.stored()),
            lifetime_earned: ActiveValue::Set(value.lifetime_earned.stored()),
            lifetime_redeemed: ActiveValue::Set(value.lifetime_redeemed.stored()),
            current_tier: ActiveValue::Set(value.current_tier.clone()),
            version: ActiveValue::Set(value.version),
            last_activity_at: ActiveValue::Set(value.last_activity_at),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for PointsLedger {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "points ledger")?,
            user_id: model.user_id,
            current_balance: Points::new(model.current_balance),
            lifetime_earned: Points::new(model.lifetime_earned),
            lifetime_redeemed: Points::new(model.lifetime_redeemed),
            current_tier: model.current_tier,
            version: model.version,
            last_activity_at: model.last_activity_at,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeem_more_than_balance_is_refused() {
        let mut ledger = PointsLedger::new("c1".to_string(), Utc::now());
        ledger.earn(Points::new(30_000)).unwrap();
        let before = ledger.clone();

        let err = ledger.redeem(Points::new(50_000)).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InsufficientBalance);
        assert_eq!(ledger, before);
    }

    #[test]
    fn positive_adjustment_counts_toward_lifetime() {
        let mut ledger = PointsLedger::new("c1".to_string(), Utc::now());
        ledger.adjust(Points::new(1_000), false).unwrap();
        ledger.adjust(Points::new(-400), false).unwrap();

        assert_eq!(ledger.current_balance, Points::new(600));
        assert_eq!(ledger.lifetime_earned, Points::new(1_000));
        assert!(ledger.adjust(Points::new(-700), false).is_err());
        ledger.adjust(Points::new(-700), true).unwrap();
        assert_eq!(ledger.current_balance, Points::new(-100));
    }

    #[test]
    fn overflowing_earn_leaves_ledger_untouched() {
        let mut ledger = PointsLedger::new("c1".to_string(), Utc::now());
        ledger.earn(Points::new(i64::MAX)).unwrap();
        let before = ledger.clone();

        assert_eq!(
            ledger.earn(Points::new(1)).unwrap_err().kind(),
            crate::ErrorKind::ValidationError
        );
        assert!(ledger.adjust(Points::new(1), false).is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn expire_zeroes_balance_but_keeps_lifetime() {
        let mut ledger = PointsLedger::new("c1".to_string(), Utc::now());
        ledger.earn(Points::new(2_500)).unwrap();

        assert_eq!(ledger.expire(), Points::new(2_500));
        assert_eq!(ledger.current_balance, Points::ZERO);
        assert_eq!(ledger.lifetime_earned, Points::new(2_500));
    }
}
