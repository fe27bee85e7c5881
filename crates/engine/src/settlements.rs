//! Payout requests that move a branch's pending earnings to its account.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Processing)
    }

    pub fn can_transition_to(self, next: SettlementStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Approved, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Pending | Self::Approved | Self::Processing, Self::Rejected)
        )
    }

    pub fn ensure_transition(self, next: SettlementStatus) -> ResultEngine<()> {
        if !self.can_transition_to(next) {
            return Err(EngineError::InvalidStateTransition(format!(
                "settlement cannot go from {} to {}",
                self.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    pub(crate) fn open_values() -> [&'static str; 3] {
        [
            Self::Pending.as_str(),
            Self::Approved.as_str(),
            Self::Processing.as_str(),
        ]
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    Bank,
    Gcash,
    Maya,
}

impl PayoutMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Gcash => "gcash",
            Self::Maya => "maya",
        }
    }
}

impl TryFrom<&str> for PayoutMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "bank" => Ok(Self::Bank),
            "gcash" => Ok(Self::Gcash),
            "maya" => Ok(Self::Maya),
            other => Err(EngineError::Validation(format!(
                "invalid payout method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub id: Uuid,
    pub branch_id: String,
    pub requested_by: String,
    pub status: SettlementStatus,
    /// Net amount to pay out.
    pub amount: i64,
    pub gross_amount: i64,
    pub commission_amount: i64,
    pub earnings_count: i64,
    pub payout_method: PayoutMethod,
    pub payout_account_number: String,
    pub payout_account_name: String,
    pub payout_bank_name: Option<String>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub transfer_reference: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub branch_id: String,
    pub requested_by: String,
    pub status: String,
    pub amount: i64,
    pub gross_amount: i64,
    pub commission_amount: i64,
    pub earnings_count: i64,
    pub payout_method: String,
    pub payout_account_number: String,
    pub payout_account_name: String,
    pub payout_bank_name: Option<String>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTimeUtc>,
    pub processed_by: Option<String>,
    pub processing_started_at: Option<DateTimeUtc>,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTimeUtc>,
    pub transfer_reference: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTimeUtc>,
    pub rejection_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::branch_earnings::Entity")]
    Earnings,
}

impl Related<super::branch_earnings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Earnings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(value: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            branch_id: ActiveValue::Set(value.branch_id.clone()),
            requested_by: ActiveValue::Set(value.requested_by.clone()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            amount: ActiveValue::Set(value.amount),
            gross_amount: ActiveValue::Set(value.gross_amount),
            commission_amount: ActiveValue::Set(value.commission_amount),
            earnings_count: ActiveValue::Set(value.earnings_count),
            payout_method: ActiveValue::Set(value.payout_method.as_str().to_string()),
            payout_account_number: ActiveValue::Set(value.payout_account_number.clone()),
            payout_account_name: ActiveValue::Set(value.payout_account_name.clone()),
            payout_bank_name: ActiveValue::Set(value.payout_bank_name.clone()),
            notes: ActiveValue::Set(value.notes.clone()),
            approved_by: ActiveValue::Set(value.approved_by.clone()),
            approved_at: ActiveValue::Set(value.approved_at),
            processed_by: ActiveValue::Set(value.processed_by.clone()),
            processing_started_at: ActiveValue::Set(value.processing_started_at),
            completed_by: ActiveValue::Set(value.completed_by.clone()),
            completed_at: ActiveValue::Set(value.completed_at),
            transfer_reference: ActiveValue::Set(value.transfer_reference.clone()),
            rejected_by: ActiveValue::Set(value.rejected_by.clone()),
            rejected_at: ActiveValue::Set(value.rejected_at),
            rejection_reason: ActiveValue::Set(value.rejection_reason.clone()),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            branch_id: model.branch_id,
            requested_by: model.requested_by,
            status: SettlementStatus::try_from(model.status.as_str())?,
            amount: model.amount,
            gross_amount: model.gross_amount,
            commission_amount: model.commission_amount,
            earnings_count: model.earnings_count,
            payout_method: PayoutMethod::try_from(model.payout_method.as_str())?,
            payout_account_number: model.payout_account_number,
            payout_account_name: model.payout_account_name,
            payout_bank_name: model.payout_bank_name,
            notes: model.notes,
            approved_by: model.approved_by,
            approved_at: model.approved_at,
            processed_by: model.processed_by,
            processing_started_at: model.processing_started_at,
            completed_by: model.completed_by,
            completed_at: model.completed_at,
            transfer_reference: model.transfer_reference,
            rejected_by: model.rejected_by,
            rejected_at: model.rejected_at,
            rejection_reason: model.rejection_reason,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_settlements_can_be_rejected() {
        use SettlementStatus::*;

        for status in [Pending, Approved, Processing] {
            assert!(status.is_open());
            assert!(status.can_transition_to(Rejected));
        }
        for status in [Completed, Rejected] {
            assert!(!status.is_open());
            assert_eq!(
                status.ensure_transition(Rejected).unwrap_err().kind(),
                crate::ErrorKind::InvalidStateTransition
            );
        }
    }

    #[test]
    fn steps_cannot_be_skipped() {
        use SettlementStatus::*;

        assert!(!Pending.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Completed));
    }
}
