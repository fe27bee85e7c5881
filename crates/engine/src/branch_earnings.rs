//! Money a branch earned from customer payments, net of HQ commission.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningSource {
    WalletPayment,
    ExternalPayment,
}

impl EarningSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WalletPayment => "wallet_payment",
            Self::ExternalPayment => "external_payment",
        }
    }
}

impl TryFrom<&str> for EarningSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "wallet_payment" => Ok(Self::WalletPayment),
            "external_payment" => Ok(Self::ExternalPayment),
            other => Err(EngineError::Validation(format!(
                "invalid earning source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    Pending,
    Settled,
}

impl EarningStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
        }
    }
}

impl TryFrom<&str> for EarningStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "settled" => Ok(Self::Settled),
            other => Err(EngineError::Validation(format!(
                "invalid earning status: {other}"
            ))),
        }
    }
}

/// Split of a gross amount between HQ and the branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Commission {
    pub percent: i64,
    pub amount: i64,
    pub net: i64,
}

/// Commission is `gross * percent / 100` rounded half up; the branch keeps
/// the rest.
pub fn calculate_commission(gross: i64, percent: i64) -> ResultEngine<Commission> {
    if gross < 0 {
        return Err(EngineError::Validation(
            "gross amount must not be negative".to_string(),
        ));
    }
    if !(0..=100).contains(&percent) {
        return Err(EngineError::Validation(
            "commission percent must be between 0 and 100".to_string(),
        ));
    }
    let scaled = gross
        .checked_mul(percent)
        .ok_or_else(|| EngineError::Validation("gross amount too large".to_string()))?;
    let amount = (scaled + 50) / 100;
    Ok(Commission {
        percent,
        amount,
        net: gross - amount,
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchEarning {
    pub id: Uuid,
    pub branch_id: String,
    pub source_type: EarningSource,
    pub source_id: String,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub gross_amount: i64,
    pub commission_percent: i64,
    pub commission_amount: i64,
    pub net_amount: i64,
    pub status: EarningStatus,
    /// Set while the earning is part of an open or completed settlement.
    pub settlement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "branch_earnings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub branch_id: String,
    pub source_type: String,
    pub source_id: String,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub gross_amount: i64,
    pub commission_percent: i64,
    pub commission_amount: i64,
    pub net_amount: i64,
    pub status: String,
    pub settlement_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::settlements::Entity",
        from = "Column::SettlementId",
        to = "super::settlements::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Settlements,
}

impl Related<super::settlements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BranchEarning> for ActiveModel {
    fn from(value: &BranchEarning) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            branch_id: ActiveValue::Set(value.branch_id.clone()),
            source_type: ActiveValue::Set(value.source_type.as_str().to_string()),
            source_id: ActiveValue::Set(value.source_id.clone()),
            customer_id: ActiveValue::Set(value.customer_id.clone()),
            description: ActiveValue::Set(value.description.clone()),
            gross_amount: ActiveValue::Set(value.gross_amount),
            commission_percent: ActiveValue::Set(value.commission_percent),
            commission_amount: ActiveValue::Set(value.commission_amount),
            net_amount: ActiveValue::Set(value.net_amount),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            settlement_id: ActiveValue::Set(value.settlement_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for BranchEarning {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "earning")?,
            branch_id: model.branch_id,
            source_type: EarningSource::try_from(model.source_type.as_str())?,
            source_id: model.source_id,
            customer_id: model.customer_id,
            description: model.description,
            gross_amount: model.gross_amount,
            commission_percent: model.commission_percent,
            commission_amount: model.commission_amount,
            net_amount: model.net_amount,
            status: EarningStatus::try_from(model.status.as_str())?,
            settlement_id: parse_optional_uuid(model.settlement_id.as_deref(), "settlement")?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_rounds_half_up() {
        let split = calculate_commission(1_000, 5).unwrap();
        assert_eq!((split.amount, split.net), (50, 950));

        // 1 010 * 5% = 50.5
        let split = calculate_commission(1_010, 5).unwrap();
        assert_eq!((split.amount, split.net), (51, 959));

        // 1 009 * 5% = 50.45
        let split = calculate_commission(1_009, 5).unwrap();
        assert_eq!(split.amount, 50);
    }

    #[test]
    fn commission_bounds() {
        assert_eq!(calculate_commission(999, 0).unwrap().net, 999);
        assert_eq!(calculate_commission(999, 100).unwrap().net, 0);
        assert!(calculate_commission(999, 101).is_err());
        assert!(calculate_commission(999, -1).is_err());
        assert!(calculate_commission(-1, 5).is_err());
    }
}
