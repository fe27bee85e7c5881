//! Per-branch commission override and payout destination.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;

use crate::{EngineError, ResultEngine, settlements::PayoutMethod};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchWalletSettings {
    pub branch_id: String,
    pub commission_override: Option<i64>,
    pub payout_method: Option<PayoutMethod>,
    pub payout_account_number: Option<String>,
    pub payout_account_name: Option<String>,
    pub payout_bank_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Complete payout destination, as snapshotted into a settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayoutDetails {
    pub method: PayoutMethod,
    pub account_number: String,
    pub account_name: String,
    pub bank_name: Option<String>,
}

impl BranchWalletSettings {
    /// Returns the payout destination, failing when it is incomplete.
    pub fn payout_details(&self) -> ResultEngine<PayoutDetails> {
        let missing = |what: &str| {
            EngineError::Validation(format!(
                "branch {} has no payout {what} configured",
                self.branch_id
            ))
        };
        let method = self.payout_method.ok_or_else(|| missing("method"))?;
        let account_number = self
            .payout_account_number
            .clone()
            .ok_or_else(|| missing("account number"))?;
        let account_name = self
            .payout_account_name
            .clone()
            .ok_or_else(|| missing("account name"))?;
        if method == PayoutMethod::Bank && self.payout_bank_name.is_none() {
            return Err(missing("bank name"));
        }
        Ok(PayoutDetails {
            method,
            account_number,
            account_name,
            bank_name: self.payout_bank_name.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "branch_wallet_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub branch_id: String,
    pub commission_override: Option<i64>,
    pub payout_method: Option<String>,
    pub payout_account_number: Option<String>,
    pub payout_account_name: Option<String>,
    pub payout_bank_name: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BranchWalletSettings> for ActiveModel {
    fn from(value: &BranchWalletSettings) -> Self {
        Self {
            branch_id: ActiveValue::Set(value.branch_id.clone()),
            commission_override: ActiveValue::Set(value.commission_override),
            payout_method: ActiveValue::Set(
                value.payout_method.map(|method| method.as_str().to_string()),
            ),
            payout_account_number: ActiveValue::Set(value.payout_account_number.clone()),
            payout_account_name: ActiveValue::Set(value.payout_account_name.clone()),
            payout_bank_name: ActiveValue::Set(value.payout_bank_name.clone()),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for BranchWalletSettings {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            branch_id: model.branch_id,
            commission_override: model.commission_override,
            payout_method: model
                .payout_method
                .as_deref()
                .map(PayoutMethod::try_from)
                .transpose()?,
            payout_account_number: model.payout_account_number,
            payout_account_name: model.payout_account_name,
            payout_bank_name: model.payout_bank_name,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(method: PayoutMethod, bank: Option<&str>) -> BranchWalletSettings {
        BranchWalletSettings {
            branch_id: "b1".to_string(),
            commission_override: None,
            payout_method: Some(method),
            payout_account_number: Some("0917".to_string()),
            payout_account_name: Some("Main St".to_string()),
            payout_bank_name: bank.map(ToString::to_string),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bank_payout_requires_bank_name() {
        assert!(settings(PayoutMethod::Bank, None).payout_details().is_err());
        assert!(settings(PayoutMethod::Bank, Some("BDO")).payout_details().is_ok());
        assert!(settings(PayoutMethod::Gcash, None).payout_details().is_ok());
    }
}
