//! Purchase orders placed by a branch against the central warehouse.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    product_order_items::OrderItem,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Shipped,
    Received,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Shipped => "shipped",
            Self::Received => "received",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Received | Self::Rejected | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending | Self::Approved, Self::Rejected)
                | (Self::Pending | Self::Approved, Self::Cancelled)
                | (Self::Approved, Self::Shipped)
                | (Self::Shipped, Self::Received)
        )
    }

    /// Fails with `InvalidStateTransition` unless `self -> next` is allowed.
    pub fn ensure_transition(self, next: OrderStatus) -> ResultEngine<()> {
        if !self.can_transition_to(next) {
            return Err(EngineError::InvalidStateTransition(format!(
                "order cannot go from {} to {}",
                self.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "shipped" => Ok(Self::Shipped),
            "received" => Ok(Self::Received),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::Validation(format!(
                "invalid order status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Cash,
    BankTransfer,
    Check,
    Gcash,
    Maya,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Check => "check",
            Self::Gcash => "gcash",
            Self::Maya => "maya",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "wallet" => Ok(Self::Wallet),
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "check" => Ok(Self::Check),
            "gcash" => Ok(Self::Gcash),
            "maya" => Ok(Self::Maya),
            other => Err(EngineError::Validation(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductOrder {
    pub id: Uuid,
    pub order_number: String,
    pub branch_id: String,
    pub requested_by: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    /// Amount currently held on the branch wallet for this order.
    pub wallet_hold_amount: i64,
    /// Hold record that reserved the funds; kept after capture.
    pub wallet_transaction_id: Option<Uuid>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub is_manual_order: bool,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub shipped_by: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductOrder {
    /// Sum of `unit_price * effective quantity` over all items.
    pub fn compute_total(items: &[OrderItem]) -> ResultEngine<i64> {
        items.iter().try_fold(0_i64, |acc, item| {
            item.unit_price
                .checked_mul(item.effective_quantity())
                .and_then(|line| acc.checked_add(line))
                .ok_or_else(|| EngineError::Validation("order total overflows".to_string()))
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub order_number: String,
    pub branch_id: String,
    pub requested_by: String,
    pub status: String,
    pub total_amount: i64,
    pub wallet_hold_amount: i64,
    pub wallet_transaction_id: Option<String>,
    pub is_paid: bool,
    pub paid_at: Option<DateTimeUtc>,
    pub paid_by: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub is_manual_order: bool,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTimeUtc>,
    pub approved_by: Option<String>,
    pub shipped_at: Option<DateTimeUtc>,
    pub shipped_by: Option<String>,
    pub received_at: Option<DateTimeUtc>,
    pub received_by: Option<String>,
    pub closed_at: Option<DateTimeUtc>,
    pub closed_by: Option<String>,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_order_items::Entity")]
    Items,
    #[sea_orm(has_many = "super::order_transitions::Entity")]
    Transitions,
}

impl Related<super::product_order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::order_transitions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transitions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ProductOrder> for ActiveModel {
    fn from(value: &ProductOrder) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            order_number: ActiveValue::Set(value.order_number.clone()),
            branch_id: ActiveValue::Set(value.branch_id.clone()),
            requested_by: ActiveValue::Set(value.requested_by.clone()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            total_amount: ActiveValue::Set(value.total_amount),
            wallet_hold_amount: ActiveValue::Set(value.wallet_hold_amount),
            wallet_transaction_id: ActiveValue::Set(
                value.wallet_transaction_id.map(|id| id.to_string()),
            ),
            is_paid: ActiveValue::Set(value.is_paid),
            paid_at: ActiveValue::Set(value.paid_at),
            paid_by: ActiveValue::Set(value.paid_by.clone()),
            payment_method: ActiveValue::Set(
                value.payment_method.map(|method| method.as_str().to_string()),
            ),
            payment_reference: ActiveValue::Set(value.payment_reference.clone()),
            is_manual_order: ActiveValue::Set(value.is_manual_order),
            notes: ActiveValue::Set(value.notes.clone()),
            rejection_reason: ActiveValue::Set(value.rejection_reason.clone()),
            approved_at: ActiveValue::Set(value.approved_at),
            approved_by: ActiveValue::Set(value.approved_by.clone()),
            shipped_at: ActiveValue::Set(value.shipped_at),
            shipped_by: ActiveValue::Set(value.shipped_by.clone()),
            received_at: ActiveValue::Set(value.received_at),
            received_by: ActiveValue::Set(value.received_by.clone()),
            closed_at: ActiveValue::Set(value.closed_at),
            closed_by: ActiveValue::Set(value.closed_by.clone()),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<(Model, Vec<OrderItem>)> for ProductOrder {
    type Error = EngineError;

    fn try_from((model, items): (Model, Vec<OrderItem>)) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "order")?,
            order_number: model.order_number,
            branch_id: model.branch_id,
            requested_by: model.requested_by,
            status: OrderStatus::try_from(model.status.as_str())?,
            items,
            total_amount: model.total_amount,
            wallet_hold_amount: model.wallet_hold_amount,
            wallet_transaction_id: parse_optional_uuid(
                model.wallet_transaction_id.as_deref(),
                "wallet transaction",
            )?,
            is_paid: model.is_paid,
            paid_at: model.paid_at,
            paid_by: model.paid_by,
            payment_method: model
                .payment_method
                .as_deref()
                .map(PaymentMethod::try_from)
                .transpose()?,
            payment_reference: model.payment_reference,
            is_manual_order: model.is_manual_order,
            notes: model.notes,
            rejection_reason: model.rejection_reason,
            approved_at: model.approved_at,
            approved_by: model.approved_by,
            shipped_at: model.shipped_at,
            shipped_by: model.shipped_by,
            received_at: model.received_at,
            received_by: model.received_by,
            closed_at: model.closed_at,
            closed_by: model.closed_by,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
