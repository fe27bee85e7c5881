mod common;

use std::sync::Arc;

use common::{
    FailingNotifier, RecordingNotifier, engine_with, engine_with_db, funded, stocked_product,
};
use engine::{
    ApproveOrderCmd, CreateOrderCmd, EngineConfig, EngineEvent, ErrorKind, OrderPayment,
    OrderStatus, PaymentMethod, ReceiveStockCmd, StockLocation, WalletOwner, WalletTxKind,
};

#[tokio::test]
async fn reduced_approval_then_delivery_moves_exact_amounts() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("north");
    funded(&engine, &branch, 10_000).await;
    let wax = stocked_product(&engine, "Hair wax", 1_000, 20).await;

    let order = engine
        .create_order(CreateOrderCmd::new("north", "manager-1").item(wax.id, 8))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 8_000);
    assert_eq!(order.wallet_hold_amount, 8_000);
    assert!(order.order_number.starts_with("PO-"));
    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (2_000, 8_000));

    let order = engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq-ops").quantity(wax.id, 6))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Approved);
    assert_eq!(order.total_amount, 6_000);
    assert_eq!(order.items[0].quantity_approved, Some(6));
    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (4_000, 6_000));
    let product = engine.catalog_product(wax.id).await.unwrap();
    assert_eq!((product.stock, product.reserved_stock), (20, 6));

    let order = engine.ship_order(order.id, "warehouse").await.unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    let product = engine.catalog_product(wax.id).await.unwrap();
    assert_eq!((product.stock, product.reserved_stock), (14, 0));

    let order = engine.receive_order(order.id, "manager-1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Received);
    assert!(order.is_paid);
    assert_eq!(order.payment_method, Some(PaymentMethod::Wallet));

    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!(wallet.balance, 4_000);
    assert_eq!(wallet.held_balance, 0);
    assert_eq!(wallet.total_spent, 6_000);

    let records = engine.wallet_transactions(&branch).await.unwrap();
    let kinds: Vec<_> = records
        .iter()
        .map(|record| (record.kind, record.amount))
        .collect();
    assert_eq!(
        kinds,
        [
            (WalletTxKind::Topup, 10_000),
            (WalletTxKind::Hold, -8_000),
            (WalletTxKind::ReleaseHold, 2_000),
            (WalletTxKind::Payment, -6_000),
        ]
    );
    assert!(engine.reconcile_wallet(&branch).await.unwrap().is_consistent());
    assert_eq!(order.wallet_transaction_id, Some(records[1].id));

    let stocked = engine.branch_products("north").await.unwrap();
    assert_eq!(stocked.len(), 1);
    assert_eq!(stocked[0].stock, 6);
    assert_eq!(stocked[0].cost, 1_000);
    assert_eq!(stocked[0].catalog_product_id, Some(wax.id));
    let lots = engine
        .batches(&StockLocation::Branch("north".to_string()), stocked[0].id)
        .await
        .unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].unit_cost, 1_000);
    assert_eq!(lots[0].quantity_remaining, 6);
}

#[tokio::test]
async fn hold_failure_refuses_the_order() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("south");
    funded(&engine, &branch, 500).await;
    let clippers = stocked_product(&engine, "Clippers", 2_000, 5).await;

    let err = engine
        .create_order(CreateOrderCmd::new("south", "manager-2").item(clippers.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(engine.orders_for_branch("south", None).await.unwrap().is_empty());
    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (500, 0));
}

#[tokio::test]
async fn order_validation() {
    let (engine, _db) = engine_with_db().await;
    funded(&engine, &WalletOwner::branch("b1"), 100_000).await;
    let gel = stocked_product(&engine, "Gel", 100, 5).await;
    let empty = engine
        .create_catalog_product(engine::CatalogProductCmd::new("Pomade", 300))
        .await
        .unwrap();

    let err = engine
        .create_order(CreateOrderCmd::new("b1", "m"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .create_order(CreateOrderCmd::new("b1", "m").item(gel.id, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .create_order(CreateOrderCmd::new("b1", "m").item(gel.id, 1).item(gel.id, 2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .create_order(CreateOrderCmd::new("b1", "m").item(empty.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    engine.set_catalog_product_active(gel.id, false).await.unwrap();
    let err = engine
        .create_order(CreateOrderCmd::new("b1", "m").item(gel.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn approval_cannot_exceed_available_stock() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("b2");
    funded(&engine, &branch, 100_000).await;
    let razor = stocked_product(&engine, "Razor", 500, 4).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b2", "m").item(razor.id, 3))
        .await
        .unwrap();
    let err = engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq").quantity(razor.id, 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    let err = engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq").quantity(razor.id, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let unchanged = engine.order(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Pending);
    assert_eq!(unchanged.wallet_hold_amount, 1_500);
    let product = engine.catalog_product(razor.id).await.unwrap();
    assert_eq!(product.reserved_stock, 0);
}

#[tokio::test]
async fn rejecting_an_approved_order_releases_everything() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("b3");
    funded(&engine, &branch, 5_000).await;
    let comb = stocked_product(&engine, "Comb", 250, 10).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b3", "m").item(comb.id, 4))
        .await
        .unwrap();
    engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();

    let err = engine.reject_order(order.id, "hq", " ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let rejected = engine
        .reject_order(order.id, "hq", "duplicate request")
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate request"));
    assert_eq!(rejected.closed_by.as_deref(), Some("hq"));

    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (5_000, 0));
    let product = engine.catalog_product(comb.id).await.unwrap();
    assert_eq!((product.stock, product.reserved_stock), (10, 0));

    let err = engine.ship_order(order.id, "warehouse").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    let err = engine.cancel_order(order.id, "m", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn cancel_uses_default_reason() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("b4");
    funded(&engine, &branch, 1_000).await;
    let towel = stocked_product(&engine, "Towel", 100, 10).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b4", "m").item(towel.id, 2))
        .await
        .unwrap();
    let cancelled = engine.cancel_order(order.id, "m", None).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.rejection_reason.as_deref(), Some("Cancelled by user"));
    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (1_000, 0));
}

#[tokio::test]
async fn ship_and_receive_happen_once() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("b5");
    funded(&engine, &branch, 10_000).await;
    let oil = stocked_product(&engine, "Beard oil", 700, 3).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b5", "m").item(oil.id, 2))
        .await
        .unwrap();
    engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();
    engine.ship_order(order.id, "warehouse").await.unwrap();
    let err = engine.ship_order(order.id, "warehouse").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    engine.receive_order(order.id, "m").await.unwrap();
    let err = engine.receive_order(order.id, "m").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!(wallet.total_spent, 1_400);
    let stocked = engine.branch_products("b5").await.unwrap();
    assert_eq!(stocked[0].stock, 2);
}

#[tokio::test]
async fn shipping_draws_oldest_lots_first() {
    let (engine, _db) = engine_with_db().await;
    funded(&engine, &WalletOwner::branch("b6"), 100_000).await;
    let shampoo = stocked_product(&engine, "Shampoo", 300, 5).await;
    engine
        .receive_central_stock(ReceiveStockCmd::new(shampoo.id, 5, "warehouse").unit_cost(180))
        .await
        .unwrap();

    let order = engine
        .create_order(CreateOrderCmd::new("b6", "m").item(shampoo.id, 7))
        .await
        .unwrap();
    engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();
    engine.ship_order(order.id, "warehouse").await.unwrap();

    let lots = engine
        .batches(&StockLocation::Central, shampoo.id)
        .await
        .unwrap();
    let remaining: Vec<_> = lots.iter().map(|lot| lot.quantity_remaining).collect();
    assert_eq!(remaining, [0, 3]);
    assert_eq!(engine.catalog_product(shampoo.id).await.unwrap().stock, 3);
}

#[tokio::test]
async fn manual_order_paid_from_wallet_reconciles() {
    let (engine, _db) = engine_with_db().await;
    let branch = WalletOwner::branch("b7");
    funded(&engine, &branch, 3_000).await;
    let spray = stocked_product(&engine, "Hair spray", 400, 10).await;

    let order = engine
        .create_order(
            CreateOrderCmd::new("b7", "hq-admin")
                .item(spray.id, 5)
                .auto_approve()
                .mark_as_paid(OrderPayment::new(PaymentMethod::Wallet)),
        )
        .await
        .unwrap();
    assert!(order.is_manual_order);
    assert_eq!(order.status, OrderStatus::Approved);
    assert_eq!(order.wallet_hold_amount, 0);
    assert!(order.is_paid);
    assert_eq!(engine.catalog_product(spray.id).await.unwrap().reserved_stock, 5);

    let wallet = engine.wallet(&branch).await.unwrap();
    assert_eq!(wallet.balance, 1_000);
    assert_eq!(wallet.held_balance, 0);
    assert_eq!(wallet.total_spent, 2_000);
    assert!(engine.reconcile_wallet(&branch).await.unwrap().is_consistent());

    engine.ship_order(order.id, "warehouse").await.unwrap();
    let received = engine.receive_order(order.id, "b7-manager").await.unwrap();
    assert_eq!(engine.wallet(&branch).await.unwrap().total_spent, 2_000);

    let hold = engine
        .wallet_transactions(&branch)
        .await
        .unwrap()
        .into_iter()
        .find(|record| record.kind == WalletTxKind::Hold)
        .unwrap();
    assert_eq!(received.wallet_transaction_id, Some(hold.id));
}

#[tokio::test]
async fn manual_order_paid_later_by_cash() {
    let (engine, _db) = engine_with_db().await;
    let spray = stocked_product(&engine, "Clay", 400, 10).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b8", "hq-admin").item(spray.id, 2).manual())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    let err = engine
        .mark_order_paid(order.id, OrderPayment::new(PaymentMethod::Cash), "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();
    let paid = engine
        .mark_order_paid(
            order.id,
            OrderPayment::new(PaymentMethod::Cash).reference("OR-5521"),
            "hq",
        )
        .await
        .unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("OR-5521"));
    assert!(engine.wallet(&WalletOwner::branch("b8")).await.is_err());

    let err = engine
        .mark_order_paid(order.id, OrderPayment::new(PaymentMethod::Cash), "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn events_follow_committed_transitions() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _db) = engine_with(EngineConfig::default(), notifier.clone()).await;
    funded(&engine, &WalletOwner::branch("b9"), 10_000).await;
    let wax = stocked_product(&engine, "Wax", 1_000, 5).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b9", "m").item(wax.id, 1))
        .await
        .unwrap();
    engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();

    let events = notifier.events.lock().unwrap().clone();
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::CatalogRestocked { product_id, quantity: 5, .. } if *product_id == wax.id
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::OrderCreated { order_id, .. } if *order_id == order.id
    )));
    let changes: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::OrderStatusChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(changes, [(OrderStatus::Pending, OrderStatus::Approved)]);
}

#[tokio::test]
async fn failing_notifier_keeps_the_transition() {
    let (engine, _db) = engine_with(EngineConfig::default(), Arc::new(FailingNotifier)).await;
    funded(&engine, &WalletOwner::branch("b10"), 10_000).await;
    let wax = stocked_product(&engine, "Wax", 1_000, 5).await;

    let order = engine
        .create_order(CreateOrderCmd::new("b10", "m").item(wax.id, 2))
        .await
        .unwrap();
    let approved = engine
        .approve_order(ApproveOrderCmd::new(order.id, "hq"))
        .await
        .unwrap();
    assert_eq!(approved.status, OrderStatus::Approved);
    assert_eq!(
        engine.order(order.id).await.unwrap().status,
        OrderStatus::Approved
    );
}

#[tokio::test]
async fn listing_by_branch_and_status() {
    let (engine, _db) = engine_with_db().await;
    funded(&engine, &WalletOwner::branch("b11"), 10_000).await;
    let wax = stocked_product(&engine, "Wax", 100, 50).await;

    let first = engine
        .create_order(CreateOrderCmd::new("b11", "m").item(wax.id, 1))
        .await
        .unwrap();
    let second = engine
        .create_order(CreateOrderCmd::new("b11", "m").item(wax.id, 2))
        .await
        .unwrap();
    engine
        .approve_order(ApproveOrderCmd::new(second.id, "hq"))
        .await
        .unwrap();

    assert_eq!(engine.orders_for_branch("b11", None).await.unwrap().len(), 2);
    let pending = engine
        .orders_for_branch("b11", Some(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first.id);
    assert_eq!(pending[0].items.len(), 1);
    let approved = engine.orders_by_status(OrderStatus::Approved).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].items[0].quantity_approved, Some(2));
}
