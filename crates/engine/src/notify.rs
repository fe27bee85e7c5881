//! Post-commit notification hook.
//!
//! The engine calls [`Notifier::notify`] only after the database transaction
//! of a transition committed. A failing notifier never undoes the
//! transition: the error is logged and dropped.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{OrderStatus, PaymentMethod, SettlementStatus, WalletOwner};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    WalletToppedUp {
        owner: WalletOwner,
        amount: i64,
        balance: i64,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        branch_id: String,
        status: OrderStatus,
        total_amount: i64,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        branch_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderPaid {
        order_id: Uuid,
        order_number: String,
        method: PaymentMethod,
        amount: i64,
    },
    CatalogRestocked {
        product_id: Uuid,
        product_name: String,
        quantity: i64,
    },
    SettlementStatusChanged {
        settlement_id: Uuid,
        branch_id: String,
        from: Option<SettlementStatus>,
        to: SettlementStatus,
        amount: i64,
    },
    TierPromoted {
        user_id: String,
        previous: Option<String>,
        new: String,
    },
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Receives engine events after commit.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &EngineEvent) -> Result<(), NotifyError>;
}

/// Writes every event as JSON to the `tracing` log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &EngineEvent) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(event).map_err(|err| NotifyError(err.to_string()))?;
        tracing::info!(target: "engine::events", %payload, "engine event");
        Ok(())
    }
}
