//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EarningSource, PaymentMethod, PayoutMethod, Points, WalletOwner};

/// Credit a wallet.
#[derive(Clone, Debug)]
pub struct TopUpCmd {
    pub owner: WalletOwner,
    pub amount: i64,
    pub actor: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    /// Replays with the same key return the original record.
    pub idempotency_key: Option<String>,
}

impl TopUpCmd {
    #[must_use]
    pub fn new(owner: WalletOwner, amount: i64, actor: impl Into<String>) -> Self {
        Self {
            owner,
            amount,
            actor: actor.into(),
            reference_id: None,
            description: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Manual signed correction of a wallet balance.
#[derive(Clone, Debug)]
pub struct AdjustBalanceCmd {
    pub owner: WalletOwner,
    pub amount: i64,
    pub reason: String,
    pub actor: String,
    pub allow_negative: bool,
}

impl AdjustBalanceCmd {
    #[must_use]
    pub fn new(
        owner: WalletOwner,
        amount: i64,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            amount,
            reason: reason.into(),
            actor: actor.into(),
            allow_negative: false,
        }
    }

    #[must_use]
    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }
}

/// Register a warehouse product.
#[derive(Clone, Debug)]
pub struct CatalogProductCmd {
    pub name: String,
    pub price: i64,
    pub cost: i64,
}

impl CatalogProductCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, price: i64) -> Self {
        Self {
            name: name.into(),
            price,
            cost: 0,
        }
    }

    #[must_use]
    pub fn cost(mut self, cost: i64) -> Self {
        self.cost = cost;
        self
    }
}

/// Receive a delivery at the central warehouse.
#[derive(Clone, Debug)]
pub struct ReceiveStockCmd {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_cost: Option<i64>,
    pub supplier: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub actor: String,
}

impl ReceiveStockCmd {
    #[must_use]
    pub fn new(product_id: Uuid, quantity: i64, actor: impl Into<String>) -> Self {
        Self {
            product_id,
            quantity,
            unit_cost: None,
            supplier: None,
            expiry_date: None,
            notes: None,
            actor: actor.into(),
        }
    }

    #[must_use]
    pub fn unit_cost(mut self, unit_cost: i64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    #[must_use]
    pub fn supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    #[must_use]
    pub fn expiry_date(mut self, expiry_date: DateTime<Utc>) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// How a manual order was paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderPayment {
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

impl OrderPayment {
    #[must_use]
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            reference: None,
        }
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Options of an HQ-initiated order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManualOrder {
    pub auto_approve: bool,
    pub payment: Option<OrderPayment>,
}

/// Place a purchase order for a branch.
#[derive(Clone, Debug)]
pub struct CreateOrderCmd {
    pub branch_id: String,
    pub requested_by: String,
    /// `(catalog_product_id, quantity)` in display order.
    pub items: Vec<(Uuid, i64)>,
    pub notes: Option<String>,
    pub manual: Option<ManualOrder>,
}

impl CreateOrderCmd {
    #[must_use]
    pub fn new(branch_id: impl Into<String>, requested_by: impl Into<String>) -> Self {
        Self {
            branch_id: branch_id.into(),
            requested_by: requested_by.into(),
            items: Vec::new(),
            notes: None,
            manual: None,
        }
    }

    #[must_use]
    pub fn item(mut self, catalog_product_id: Uuid, quantity: i64) -> Self {
        self.items.push((catalog_product_id, quantity));
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Mark the order as created by HQ. No funds are held.
    #[must_use]
    pub fn manual(mut self) -> Self {
        self.manual.get_or_insert_with(ManualOrder::default);
        self
    }

    #[must_use]
    pub fn auto_approve(mut self) -> Self {
        self.manual.get_or_insert_with(ManualOrder::default).auto_approve = true;
        self
    }

    #[must_use]
    pub fn mark_as_paid(mut self, payment: OrderPayment) -> Self {
        self.manual.get_or_insert_with(ManualOrder::default).payment = Some(payment);
        self
    }
}

/// Approve a pending order, optionally changing item quantities.
#[derive(Clone, Debug)]
pub struct ApproveOrderCmd {
    pub order_id: Uuid,
    pub actor: String,
    /// `(catalog_product_id, approved quantity)`; items not listed keep the
    /// requested quantity.
    pub quantities: Vec<(Uuid, i64)>,
}

impl ApproveOrderCmd {
    #[must_use]
    pub fn new(order_id: Uuid, actor: impl Into<String>) -> Self {
        Self {
            order_id,
            actor: actor.into(),
            quantities: Vec::new(),
        }
    }

    #[must_use]
    pub fn quantity(mut self, catalog_product_id: Uuid, quantity: i64) -> Self {
        self.quantities.push((catalog_product_id, quantity));
        self
    }
}

/// Record money a branch earned.
#[derive(Clone, Debug)]
pub struct RecordEarningCmd {
    pub branch_id: String,
    pub source: EarningSource,
    pub source_id: String,
    pub gross_amount: i64,
    pub customer_id: Option<String>,
    pub description: Option<String>,
}

impl RecordEarningCmd {
    #[must_use]
    pub fn new(
        branch_id: impl Into<String>,
        source: EarningSource,
        source_id: impl Into<String>,
        gross_amount: i64,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            source,
            source_id: source_id.into(),
            gross_amount,
            customer_id: None,
            description: None,
        }
    }

    #[must_use]
    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A customer pays a branch from their wallet.
#[derive(Clone, Debug)]
pub struct WalletPaymentCmd {
    pub customer_id: String,
    pub branch_id: String,
    pub amount: i64,
    /// Booking, sale, or other id the payment settles.
    pub source_id: String,
    pub actor: String,
    pub description: Option<String>,
}

impl WalletPaymentCmd {
    #[must_use]
    pub fn new(
        customer_id: impl Into<String>,
        branch_id: impl Into<String>,
        amount: i64,
        source_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            branch_id: branch_id.into(),
            amount,
            source_id: source_id.into(),
            actor: actor.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Replace a branch's commission override and payout destination.
#[derive(Clone, Debug, Default)]
pub struct BranchWalletSettingsCmd {
    pub branch_id: String,
    pub commission_override: Option<i64>,
    pub payout_method: Option<PayoutMethod>,
    pub payout_account_number: Option<String>,
    pub payout_account_name: Option<String>,
    pub payout_bank_name: Option<String>,
}

impl BranchWalletSettingsCmd {
    #[must_use]
    pub fn new(branch_id: impl Into<String>) -> Self {
        Self {
            branch_id: branch_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn commission_override(mut self, percent: i64) -> Self {
        self.commission_override = Some(percent);
        self
    }

    #[must_use]
    pub fn payout(
        mut self,
        method: PayoutMethod,
        account_number: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        self.payout_method = Some(method);
        self.payout_account_number = Some(account_number.into());
        self.payout_account_name = Some(account_name.into());
        self
    }

    #[must_use]
    pub fn bank_name(mut self, bank_name: impl Into<String>) -> Self {
        self.payout_bank_name = Some(bank_name.into());
        self
    }
}

/// Earn or redeem loyalty points.
#[derive(Clone, Debug)]
pub struct PointsCmd {
    pub user_id: String,
    pub amount: Points,
    /// What caused the movement (`payment`, `booking`, `reward`, ...).
    pub source_type: String,
    pub source_id: Option<String>,
    pub branch_id: Option<String>,
    pub notes: Option<String>,
    pub actor: Option<String>,
}

impl PointsCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, amount: Points, source_type: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            source_type: source_type.into(),
            source_id: None,
            branch_id: None,
            notes: None,
            actor: None,
        }
    }

    #[must_use]
    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    #[must_use]
    pub fn branch_id(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Manual signed correction of a points balance.
#[derive(Clone, Debug)]
pub struct AdjustPointsCmd {
    pub user_id: String,
    pub amount: Points,
    pub reason: String,
    pub actor: String,
    pub allow_negative: bool,
}

impl AdjustPointsCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        amount: Points,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            actor: actor.into(),
            allow_negative: false,
        }
    }

    #[must_use]
    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }
}
