use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Points, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsTxKind {
    Earn,
    Redeem,
    Adjust,
}

impl PointsTxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Redeem => "redeem",
            Self::Adjust => "adjust",
        }
    }
}

impl TryFrom<&str> for PointsTxKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "earn" => Ok(Self::Earn),
            "redeem" => Ok(Self::Redeem),
            "adjust" => Ok(Self::Adjust),
            other => Err(EngineError::Validation(format!(
                "invalid points transaction kind: {other}"
            ))),
        }
    }
}

/// One movement on a points ledger. `amount` is signed (redeem is negative).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub ledger_id: Uuid,
    pub user_id: String,
    pub kind: PointsTxKind,
    pub amount: Points,
    pub balance_after: Points,
    pub sequence: i64,
    pub source_type: String,
    pub source_id: Option<String>,
    pub branch_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "points_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ledger_id: String,
    pub user_id: String,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub sequence: i64,
    pub source_type: String,
    pub source_id: Option<String>,
    pub branch_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::points_ledgers::Entity",
        from = "Column::LedgerId",
        to = "super::points_ledgers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Ledgers,
}

impl Related<super::points_ledgers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledgers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PointsTransaction> for ActiveModel {
    fn from(tx: &PointsTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            ledger_id: ActiveValue::Set(tx.ledger_id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount: ActiveValue::Set(tx.amount.stored()),
            balance_after: ActiveValue::Set(tx.balance_after.stored()),
            sequence: ActiveValue::Set(tx.sequence),
            source_type: ActiveValue::Set(tx.source_type.clone()),
            source_id: ActiveValue::Set(tx.source_id.clone()),
            branch_id: ActiveValue::Set(tx.branch_id.clone()),
            notes: ActiveValue::Set(tx.notes.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for PointsTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "points transaction")?,
            ledger_id: parse_uuid(&model.ledger_id, "points ledger")?,
            user_id: model.user_id,
            kind: PointsTxKind::try_from(model.kind.as_str())?,
            amount: Points::new(model.amount),
            balance_after: Points::new(model.balance_after),
            sequence: model.sequence,
            source_type: model.source_type,
            source_id: model.source_id,
            branch_id: model.branch_id,
            notes: model.notes,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
