//! Purchase-order lifecycle.
//!
//! ```text
//! pending ──► approved ──► shipped ──► received
//!    │            │
//!    └──► rejected / cancelled ◄──┘
//! ```
//!
//! Each transition runs in one database transaction: guard clauses first,
//! then the wallet, stock and order writes. A transition is recorded in
//! `order_transitions`, whose unique `(order_id, to_status)` index refuses a
//! second attempt at the same step.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    ApproveOrderCmd, CreateOrderCmd, EngineError, EngineEvent, OrderItem, OrderPayment,
    OrderStatus, PaymentMethod, ProductOrder, Reference, ResultEngine, StockLocation, WalletOwner,
    order_transitions, product_order_items, product_orders,
    reference_counters::next_reference,
    util::{normalize_optional_text, normalize_required_text},
};

use super::{Engine, ledger::Movement, stale, with_tx};

const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

impl Engine {
    /// Place an order.
    ///
    /// A branch order holds its total on the branch wallet before the order
    /// row is written. A manual order (HQ-initiated) holds nothing; it may be
    /// approved and paid in the same step.
    pub async fn create_order(&self, cmd: CreateOrderCmd) -> ResultEngine<ProductOrder> {
        let branch_id = normalize_required_text(&cmd.branch_id, "branch id")?;
        let requested_by = normalize_required_text(&cmd.requested_by, "requested_by")?;
        if cmd.items.is_empty() {
            return Err(EngineError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for (product_id, quantity) in &cmd.items {
            if *quantity <= 0 {
                return Err(EngineError::Validation(format!(
                    "quantity for {product_id} must be > 0"
                )));
            }
            if !seen.insert(*product_id) {
                return Err(EngineError::Validation(format!(
                    "product {product_id} is listed twice"
                )));
            }
        }
        let manual = cmd.manual.clone();
        let notes = normalize_optional_text(cmd.notes.as_deref());

        let order = with_tx!(self, |db_tx| {
            let now = Utc::now();
            let mut items = Vec::with_capacity(cmd.items.len());
            for (product_id, quantity) in &cmd.items {
                let product = self.load_catalog_product(&db_tx, *product_id).await?;
                if !product.is_active {
                    return Err(EngineError::Validation(format!(
                        "{} is not available for ordering",
                        product.name
                    )));
                }
                if product.available() == 0 {
                    return Err(EngineError::InsufficientStock(format!(
                        "{} is out of stock",
                        product.name
                    )));
                }
                items.push(OrderItem {
                    id: Uuid::new_v4(),
                    catalog_product_id: product.id,
                    product_name: product.name,
                    quantity_requested: *quantity,
                    quantity_approved: None,
                    unit_price: product.price,
                });
            }
            let total = ProductOrder::compute_total(&items)?;

            let mut order = ProductOrder {
                id: Uuid::new_v4(),
                order_number: next_reference(&db_tx, "PO", now).await?,
                branch_id: branch_id.clone(),
                requested_by: requested_by.clone(),
                status: OrderStatus::Pending,
                items,
                total_amount: total,
                wallet_hold_amount: 0,
                wallet_transaction_id: None,
                is_paid: false,
                paid_at: None,
                paid_by: None,
                payment_method: None,
                payment_reference: None,
                is_manual_order: manual.is_some(),
                notes,
                rejection_reason: None,
                approved_at: None,
                approved_by: None,
                shipped_at: None,
                shipped_by: None,
                received_at: None,
                received_by: None,
                closed_at: None,
                closed_by: None,
                version: 0,
                created_at: now,
                updated_at: now,
            };

            match &manual {
                None => {
                    let mut wallet = self
                        .ensure_wallet_in(&db_tx, &WalletOwner::branch(branch_id.clone()))
                        .await?;
                    let hold = self
                        .hold_in(
                            &db_tx,
                            &mut wallet,
                            total,
                            Movement::new(Reference::order(order.id), &requested_by)
                                .description(format!("Hold for {}", order.order_number)),
                        )
                        .await?;
                    order.wallet_hold_amount = total;
                    order.wallet_transaction_id = Some(hold.id);
                }
                Some(manual) => {
                    if manual.auto_approve {
                        for item in &mut order.items {
                            let mut product =
                                self.load_catalog_product(&db_tx, item.catalog_product_id).await?;
                            product.reserve(item.quantity_requested)?;
                            self.save_catalog_product(&db_tx, &mut product).await?;
                            item.quantity_approved = Some(item.quantity_requested);
                        }
                        order.status = OrderStatus::Approved;
                        order.approved_at = Some(now);
                        order.approved_by = Some(requested_by.clone());
                    }
                    if let Some(payment) = &manual.payment {
                        self.pay_in(&db_tx, &mut order, payment, &requested_by)
                            .await?;
                    }
                }
            }

            product_orders::ActiveModel::from(&order)
                .insert(&db_tx)
                .await?;
            for (position, item) in order.items.iter().enumerate() {
                let position = i32::try_from(position)
                    .map_err(|_| EngineError::Validation("too many order items".to_string()))?;
                product_order_items::ActiveModel::from_item(order.id, position, item)
                    .insert(&db_tx)
                    .await?;
            }
            record_transition(&db_tx, &order, None, &requested_by).await?;
            Ok(order)
        })?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            branch_id = %order.branch_id,
            status = order.status.as_str(),
            total = order.total_amount,
            manual = order.is_manual_order,
            "order created"
        );
        self.emit(EngineEvent::OrderCreated {
            order_id: order.id,
            order_number: order.order_number.clone(),
            branch_id: order.branch_id.clone(),
            status: order.status,
            total_amount: order.total_amount,
        });
        self.emit_paid(&order);
        Ok(order)
    }

    /// Approve a pending order, fixing the final quantities.
    ///
    /// Approved quantities may differ from the requested ones (zero drops
    /// an item) but must fit the available warehouse stock. The wallet hold
    /// follows the new total and the quantities are reserved.
    pub async fn approve_order(&self, cmd: ApproveOrderCmd) -> ResultEngine<ProductOrder> {
        let actor = normalize_required_text(&cmd.actor, "actor")?;
        let mut overrides = HashMap::new();
        for (product_id, quantity) in &cmd.quantities {
            if *quantity < 0 {
                return Err(EngineError::Validation(format!(
                    "approved quantity for {product_id} must not be negative"
                )));
            }
            overrides.insert(*product_id, *quantity);
        }

        let order = with_tx!(self, |db_tx| {
            let mut order = self.load_order(&db_tx, cmd.order_id).await?;
            let from = order.status;
            from.ensure_transition(OrderStatus::Approved)?;
            if let Some(unknown) = overrides
                .keys()
                .find(|id| !order.items.iter().any(|item| item.catalog_product_id == **id))
            {
                return Err(EngineError::Validation(format!(
                    "product {unknown} is not part of order {}",
                    order.order_number
                )));
            }

            for item in &mut order.items {
                let approved = overrides
                    .get(&item.catalog_product_id)
                    .copied()
                    .unwrap_or(item.quantity_requested);
                item.quantity_approved = Some(approved);
            }
            let total = ProductOrder::compute_total(&order.items)?;
            if total <= 0 {
                return Err(EngineError::Validation(
                    "approved order total must be > 0".to_string(),
                ));
            }
            if order.is_paid && total != order.total_amount {
                return Err(EngineError::Validation(
                    "quantities of a paid order cannot change".to_string(),
                ));
            }

            for item in &order.items {
                let approved = item.effective_quantity();
                if approved == 0 {
                    continue;
                }
                let mut product = self
                    .load_catalog_product(&db_tx, item.catalog_product_id)
                    .await?;
                product.reserve(approved)?;
                self.save_catalog_product(&db_tx, &mut product).await?;
            }

            if !order.is_manual_order {
                let mut wallet = self
                    .require_wallet(&db_tx, &WalletOwner::branch(order.branch_id.clone()))
                    .await?;
                self.adjust_hold_in(
                    &db_tx,
                    &mut wallet,
                    order.wallet_hold_amount,
                    total,
                    Movement::new(Reference::order(order.id), &actor)
                        .description(format!("Hold adjusted for {}", order.order_number)),
                )
                .await?;
                order.wallet_hold_amount = total;
            }

            for item in &order.items {
                product_order_items::Entity::update(product_order_items::ActiveModel {
                    id: ActiveValue::Set(item.id.to_string()),
                    quantity_approved: ActiveValue::Set(item.quantity_approved),
                    ..Default::default()
                })
                .exec(&db_tx)
                .await?;
            }

            let now = Utc::now();
            order.total_amount = total;
            order.status = OrderStatus::Approved;
            order.approved_at = Some(now);
            order.approved_by = Some(actor.clone());
            self.finish_transition(&db_tx, &mut order, from, &actor).await?;
            Ok((order, from))
        })?;

        Ok(self.after_transition(order))
    }

    /// Reject a pending or approved order. The hold and any reservation are
    /// released.
    pub async fn reject_order(
        &self,
        order_id: Uuid,
        actor: &str,
        reason: &str,
    ) -> ResultEngine<ProductOrder> {
        let reason = normalize_required_text(reason, "rejection reason")?;
        self.close_order(order_id, actor, OrderStatus::Rejected, reason)
            .await
    }

    /// Cancel a pending or approved order. Same effects as a rejection.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: &str,
        reason: Option<&str>,
    ) -> ResultEngine<ProductOrder> {
        let reason = normalize_optional_text(reason)
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
        self.close_order(order_id, actor, OrderStatus::Cancelled, reason)
            .await
    }

    /// Ship an approved order out of the warehouse, oldest lots first.
    pub async fn ship_order(&self, order_id: Uuid, actor: &str) -> ResultEngine<ProductOrder> {
        let actor = normalize_required_text(actor, "actor")?;
        let order = with_tx!(self, |db_tx| {
            let mut order = self.load_order(&db_tx, order_id).await?;
            let from = order.status;
            from.ensure_transition(OrderStatus::Shipped)?;

            for item in &order.items {
                let quantity = item.effective_quantity();
                if quantity == 0 {
                    continue;
                }
                let mut product = self
                    .load_catalog_product(&db_tx, item.catalog_product_id)
                    .await?;
                product.ship(quantity)?;
                self.draw_batches(&db_tx, product.id, &StockLocation::Central, quantity)
                    .await?;
                self.save_catalog_product(&db_tx, &mut product).await?;
            }

            order.status = OrderStatus::Shipped;
            order.shipped_at = Some(Utc::now());
            order.shipped_by = Some(actor.clone());
            self.finish_transition(&db_tx, &mut order, from, &actor).await?;
            Ok((order, from))
        })?;

        Ok(self.after_transition(order))
    }

    /// Receive a shipped order at its branch.
    ///
    /// Stock lands on the branch products as new lots priced at the order's
    /// unit prices; the wallet hold of a branch order is captured.
    pub async fn receive_order(&self, order_id: Uuid, actor: &str) -> ResultEngine<ProductOrder> {
        let actor = normalize_required_text(actor, "actor")?;
        let (order, paid_now) = with_tx!(self, |db_tx| {
            let mut order = self.load_order(&db_tx, order_id).await?;
            let from = order.status;
            from.ensure_transition(OrderStatus::Received)?;

            for item in &order.items {
                let quantity = item.effective_quantity();
                if quantity == 0 {
                    continue;
                }
                self.receive_at_branch(
                    &db_tx,
                    &order.branch_id,
                    item.catalog_product_id,
                    &item.product_name,
                    quantity,
                    item.unit_price,
                    &actor,
                )
                .await?;
            }

            let now = Utc::now();
            let mut paid_now = false;
            if !order.is_manual_order && order.wallet_hold_amount > 0 {
                let mut wallet = self
                    .require_wallet(&db_tx, &WalletOwner::branch(order.branch_id.clone()))
                    .await?;
                self.capture_in(
                    &db_tx,
                    &mut wallet,
                    order.wallet_hold_amount,
                    Movement::new(Reference::order(order.id), &actor)
                        .description(format!("Payment for {}", order.order_number)),
                )
                .await?;
                order.is_paid = true;
                order.paid_at = Some(now);
                order.paid_by = Some(actor.clone());
                order.payment_method = Some(PaymentMethod::Wallet);
                paid_now = true;
            }

            order.status = OrderStatus::Received;
            order.received_at = Some(now);
            order.received_by = Some(actor.clone());
            self.finish_transition(&db_tx, &mut order, from, &actor).await?;
            Ok(((order, from), paid_now))
        })?;

        let order = self.after_transition(order);
        if paid_now {
            self.emit_paid(&order);
        }
        Ok(order)
    }

    /// Record the payment of a manual order after the fact.
    ///
    /// Only unpaid manual orders that are approved, shipped or received
    /// qualify. Paying with [`PaymentMethod::Wallet`] debits the branch
    /// wallet; other methods only record the payment.
    pub async fn mark_order_paid(
        &self,
        order_id: Uuid,
        payment: OrderPayment,
        actor: &str,
    ) -> ResultEngine<ProductOrder> {
        let actor = normalize_required_text(actor, "actor")?;
        let order = with_tx!(self, |db_tx| {
            let mut order = self.load_order(&db_tx, order_id).await?;
            if !order.is_manual_order {
                return Err(EngineError::Validation(format!(
                    "{} is paid through its wallet hold",
                    order.order_number
                )));
            }
            if order.is_paid {
                return Err(EngineError::InvalidStateTransition(format!(
                    "{} is already paid",
                    order.order_number
                )));
            }
            if !matches!(
                order.status,
                OrderStatus::Approved | OrderStatus::Shipped | OrderStatus::Received
            ) {
                return Err(EngineError::InvalidStateTransition(format!(
                    "{} cannot be paid while {}",
                    order.order_number,
                    order.status.as_str()
                )));
            }
            self.pay_in(&db_tx, &mut order, &payment, &actor).await?;
            self.save_order(&db_tx, &mut order).await?;
            Ok(order)
        })?;

        self.emit_paid(&order);
        Ok(order)
    }

    pub async fn order(&self, order_id: Uuid) -> ResultEngine<ProductOrder> {
        with_tx!(self, |db_tx| self.load_order(&db_tx, order_id).await)
    }

    /// Orders of a branch, newest first.
    pub async fn orders_for_branch(
        &self,
        branch_id: &str,
        status: Option<OrderStatus>,
    ) -> ResultEngine<Vec<ProductOrder>> {
        with_tx!(self, |db_tx| {
            let mut query = product_orders::Entity::find()
                .filter(product_orders::Column::BranchId.eq(branch_id));
            if let Some(status) = status {
                query = query.filter(product_orders::Column::Status.eq(status.as_str()));
            }
            let models = query
                .order_by_desc(product_orders::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            with_items(&db_tx, models).await
        })
    }

    /// Orders in one status across all branches, oldest first.
    pub async fn orders_by_status(&self, status: OrderStatus) -> ResultEngine<Vec<ProductOrder>> {
        with_tx!(self, |db_tx| {
            let models = product_orders::Entity::find()
                .filter(product_orders::Column::Status.eq(status.as_str()))
                .order_by_asc(product_orders::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            with_items(&db_tx, models).await
        })
    }

    async fn close_order(
        &self,
        order_id: Uuid,
        actor: &str,
        to: OrderStatus,
        reason: String,
    ) -> ResultEngine<ProductOrder> {
        let actor = normalize_required_text(actor, "actor")?;
        let order = with_tx!(self, |db_tx| {
            let mut order = self.load_order(&db_tx, order_id).await?;
            let from = order.status;
            from.ensure_transition(to)?;
            if order.is_paid {
                return Err(EngineError::InvalidStateTransition(format!(
                    "{} is already paid",
                    order.order_number
                )));
            }

            if !order.is_manual_order && order.wallet_hold_amount > 0 {
                let mut wallet = self
                    .require_wallet(&db_tx, &WalletOwner::branch(order.branch_id.clone()))
                    .await?;
                self.release_in(
                    &db_tx,
                    &mut wallet,
                    order.wallet_hold_amount,
                    Movement::new(Reference::order(order.id), &actor)
                        .description(format!("Hold released for {}", order.order_number)),
                )
                .await?;
            }

            if from == OrderStatus::Approved {
                for item in &order.items {
                    let quantity = item.effective_quantity();
                    if quantity == 0 {
                        continue;
                    }
                    let mut product = self
                        .load_catalog_product(&db_tx, item.catalog_product_id)
                        .await?;
                    product.unreserve(quantity);
                    self.save_catalog_product(&db_tx, &mut product).await?;
                }
            }

            order.status = to;
            order.rejection_reason = Some(reason.clone());
            order.closed_at = Some(Utc::now());
            order.closed_by = Some(actor.clone());
            self.finish_transition(&db_tx, &mut order, from, &actor).await?;
            Ok((order, from))
        })?;

        Ok(self.after_transition(order))
    }

    /// Record a payment on the in-memory order. Wallet payments hold and
    /// capture the total in the caller's transaction.
    async fn pay_in(
        &self,
        db_tx: &DatabaseTransaction,
        order: &mut ProductOrder,
        payment: &OrderPayment,
        actor: &str,
    ) -> ResultEngine<()> {
        if payment.method == PaymentMethod::Wallet {
            let mut wallet = self
                .ensure_wallet_in(db_tx, &WalletOwner::branch(order.branch_id.clone()))
                .await?;
            let hold = self
                .hold_in(
                    db_tx,
                    &mut wallet,
                    order.total_amount,
                    Movement::new(Reference::order(order.id), actor)
                        .description(format!("Hold for {}", order.order_number)),
                )
                .await?;
            self.capture_in(
                db_tx,
                &mut wallet,
                order.total_amount,
                Movement::new(Reference::order(order.id), actor)
                    .description(format!("Payment for {}", order.order_number)),
            )
            .await?;
            order.wallet_transaction_id = Some(hold.id);
        }
        order.is_paid = true;
        order.paid_at = Some(Utc::now());
        order.paid_by = Some(actor.to_string());
        order.payment_method = Some(payment.method);
        order.payment_reference = normalize_optional_text(payment.reference.as_deref());
        Ok(())
    }

    async fn load_order(
        &self,
        db_tx: &DatabaseTransaction,
        order_id: Uuid,
    ) -> ResultEngine<ProductOrder> {
        let model = product_orders::Entity::find_by_id(order_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))?;
        let items = product_order_items::Entity::find()
            .filter(product_order_items::Column::OrderId.eq(order_id.to_string()))
            .order_by_asc(product_order_items::Column::Position)
            .all(db_tx)
            .await?
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        ProductOrder::try_from((model, items))
    }

    async fn save_order(
        &self,
        db_tx: &DatabaseTransaction,
        order: &mut ProductOrder,
    ) -> ResultEngine<()> {
        let expected_version = order.version;
        order.version += 1;
        order.updated_at = Utc::now();
        product_orders::Entity::update(product_orders::ActiveModel::from(&*order))
            .filter(product_orders::Column::Version.eq(expected_version))
            .exec(db_tx)
            .await
            .map_err(|err| stale("order", err))?;
        Ok(())
    }

    async fn finish_transition(
        &self,
        db_tx: &DatabaseTransaction,
        order: &mut ProductOrder,
        from: OrderStatus,
        actor: &str,
    ) -> ResultEngine<()> {
        record_transition(db_tx, order, Some(from), actor).await?;
        self.save_order(db_tx, order).await
    }

    fn after_transition(&self, (order, from): (ProductOrder, OrderStatus)) -> ProductOrder {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            from = from.as_str(),
            to = order.status.as_str(),
            "order transition"
        );
        self.emit(EngineEvent::OrderStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            branch_id: order.branch_id.clone(),
            from,
            to: order.status,
        });
        order
    }

    fn emit_paid(&self, order: &ProductOrder) {
        if let (true, Some(method)) = (order.is_paid, order.payment_method) {
            self.emit(EngineEvent::OrderPaid {
                order_id: order.id,
                order_number: order.order_number.clone(),
                method,
                amount: order.total_amount,
            });
        }
    }
}

async fn record_transition(
    db_tx: &DatabaseTransaction,
    order: &ProductOrder,
    from: Option<OrderStatus>,
    actor: &str,
) -> ResultEngine<()> {
    let row = order_transitions::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        order_id: ActiveValue::Set(order.id.to_string()),
        from_status: ActiveValue::Set(from.map(|status| status.as_str().to_string())),
        to_status: ActiveValue::Set(order.status.as_str().to_string()),
        actor: ActiveValue::Set(actor.to_string()),
        created_at: ActiveValue::Set(Utc::now()),
    };
    match row.insert(db_tx).await {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(EngineError::InvalidStateTransition(format!(
                "{} was already {}",
                order.order_number,
                order.status.as_str()
            )))
        }
        Err(err) => Err(err.into()),
    }
}

async fn with_items(
    db_tx: &DatabaseTransaction,
    models: Vec<product_orders::Model>,
) -> ResultEngine<Vec<ProductOrder>> {
    let ids: Vec<String> = models.iter().map(|model| model.id.clone()).collect();
    let mut items_by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for item in product_order_items::Entity::find()
        .filter(product_order_items::Column::OrderId.is_in(ids))
        .order_by_asc(product_order_items::Column::OrderId)
        .order_by_asc(product_order_items::Column::Position)
        .all(db_tx)
        .await?
    {
        let order_id = item.order_id.clone();
        items_by_order
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(item)?);
    }
    models
        .into_iter()
        .map(|model| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            ProductOrder::try_from((model, items))
        })
        .collect()
}
