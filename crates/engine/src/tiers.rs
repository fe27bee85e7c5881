//! Loyalty tiers and promotion rules.

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// `(name, threshold ×100, display_order)` of the tiers a fresh install gets.
pub const DEFAULT_TIERS: [(&str, i64, i32); 4] = [
    ("Bronze", 0, 1),
    ("Silver", 500_000, 2),
    ("Gold", 1_500_000, 3),
    ("Platinum", 5_000_000, 4),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub id: Uuid,
    pub name: String,
    /// Lifetime points (×100) needed to reach this tier.
    pub threshold: i64,
    pub display_order: i32,
}

/// A tier change caused by a points movement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TierPromotion {
    pub previous: Option<String>,
    pub new: String,
}

impl TierPromotion {
    /// Marker appended to the transaction notes.
    pub fn note(&self) -> String {
        format!(
            "[TIER_PROMOTION:{}→{}]",
            self.previous.as_deref().unwrap_or("None"),
            self.new
        )
    }
}

/// Highest tier whose threshold is reached by `lifetime_earned`.
pub fn tier_for_points(tiers: &[Tier], lifetime_earned: i64) -> Option<&Tier> {
    tiers
        .iter()
        .filter(|tier| tier.threshold <= lifetime_earned)
        .max_by_key(|tier| (tier.threshold, tier.display_order))
}

/// Computes the promotion, if any, for a customer currently in `current`.
///
/// Tiers only move up: a target tier with a lower or equal display order
/// than the current one yields `None`.
pub fn promotion_for(
    tiers: &[Tier],
    current: Option<&str>,
    lifetime_earned: i64,
) -> Option<TierPromotion> {
    let target = tier_for_points(tiers, lifetime_earned)?;
    let current_order = current
        .and_then(|name| tiers.iter().find(|tier| tier.name == name))
        .map_or(0, |tier| tier.display_order);
    (target.display_order > current_order).then(|| TierPromotion {
        previous: current.map(ToString::to_string),
        new: target.name.clone(),
    })
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tiers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub threshold: i64,
    pub display_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Tier> for ActiveModel {
    fn from(value: &Tier) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            threshold: ActiveValue::Set(value.threshold),
            display_order: ActiveValue::Set(value.display_order),
        }
    }
}

impl TryFrom<Model> for Tier {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "tier")?,
            name: model.name,
            threshold: model.threshold,
            display_order: model.display_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<Tier> {
        DEFAULT_TIERS
            .iter()
            .map(|(name, threshold, order)| Tier {
                id: Uuid::new_v4(),
                name: (*name).to_string(),
                threshold: *threshold,
                display_order: *order,
            })
            .collect()
    }

    #[test]
    fn picks_highest_reached_threshold() {
        let tiers = defaults();

        assert_eq!(tier_for_points(&tiers, 0).unwrap().name, "Bronze");
        assert_eq!(tier_for_points(&tiers, 499_999).unwrap().name, "Bronze");
        assert_eq!(tier_for_points(&tiers, 500_000).unwrap().name, "Silver");
        assert_eq!(tier_for_points(&tiers, 9_000_000).unwrap().name, "Platinum");
    }

    #[test]
    fn promotion_only_moves_up() {
        let tiers = defaults();

        let first = promotion_for(&tiers, None, 100).unwrap();
        assert_eq!(first.note(), "[TIER_PROMOTION:None→Bronze]");

        let up = promotion_for(&tiers, Some("Bronze"), 1_600_000).unwrap();
        assert_eq!(up.new, "Gold");
        assert_eq!(up.note(), "[TIER_PROMOTION:Bronze→Gold]");

        assert_eq!(promotion_for(&tiers, Some("Gold"), 1_600_000), None);
        assert_eq!(promotion_for(&tiers, Some("Platinum"), 600_000), None);
    }

    #[test]
    fn no_tiers_means_no_promotion() {
        assert_eq!(promotion_for(&[], None, 10_000_000), None);
    }
}
