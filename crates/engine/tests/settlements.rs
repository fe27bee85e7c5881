mod common;

use std::sync::Arc;

use common::{RecordingNotifier, engine_with, funded};
use engine::{
    BranchWalletSettingsCmd, EarningSource, EarningStatus, Engine, EngineConfig, EngineEvent,
    ErrorKind, PayoutMethod, RecordEarningCmd, SettlementStatus, WalletOwner, WalletPaymentCmd,
};
use sea_orm::DatabaseConnection;

fn config() -> EngineConfig {
    EngineConfig {
        min_settlement_amount: 1_000,
        default_commission_percent: 5,
        ..EngineConfig::default()
    }
}

async fn engine_for_settlements() -> (Engine, DatabaseConnection, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, db) = engine_with(config(), notifier.clone()).await;
    (engine, db, notifier)
}

async fn with_gcash_payout(engine: &Engine, branch: &str) {
    engine
        .set_branch_wallet_settings(
            BranchWalletSettingsCmd::new(branch).payout(PayoutMethod::Gcash, "09171234567", "Ana Cruz"),
        )
        .await
        .unwrap();
}

async fn earn(engine: &Engine, branch: &str, source_id: &str, gross: i64) {
    engine
        .record_earning(RecordEarningCmd::new(
            branch,
            EarningSource::ExternalPayment,
            source_id,
            gross,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn commission_uses_override_then_default() {
    let (engine, _db, _) = engine_for_settlements().await;

    let earning = engine
        .record_earning(RecordEarningCmd::new(
            "north",
            EarningSource::ExternalPayment,
            "sale-1",
            10_000,
        ))
        .await
        .unwrap();
    assert_eq!(earning.commission_percent, 5);
    assert_eq!(earning.commission_amount, 500);
    assert_eq!(earning.net_amount, 9_500);
    assert_eq!(earning.status, EarningStatus::Pending);

    engine
        .set_branch_wallet_settings(BranchWalletSettingsCmd::new("north").commission_override(12))
        .await
        .unwrap();
    let earning = engine
        .record_earning(RecordEarningCmd::new(
            "north",
            EarningSource::ExternalPayment,
            "sale-2",
            1_250,
        ))
        .await
        .unwrap();
    assert_eq!(earning.commission_amount, 150);
    assert_eq!(earning.net_amount, 1_100);

    let err = engine
        .record_earning(RecordEarningCmd::new(
            "north",
            EarningSource::ExternalPayment,
            "sale-3",
            0,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .set_branch_wallet_settings(BranchWalletSettingsCmd::new("north").commission_override(101))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn wallet_payment_debits_customer_and_credits_branch() {
    let (engine, _db, _) = engine_for_settlements().await;
    let customer = WalletOwner::customer("cust-1");
    funded(&engine, &customer, 2_000).await;

    let payment = engine
        .pay_with_wallet(WalletPaymentCmd::new("cust-1", "north", 1_500, "booking-42", "pos"))
        .await
        .unwrap();
    assert_eq!(payment.hold.amount, -1_500);
    assert_eq!(payment.payment.amount, -1_500);
    assert_eq!(payment.earning.source_type, EarningSource::WalletPayment);
    assert_eq!(payment.earning.net_amount, 1_425);
    assert_eq!(payment.earning.customer_id.as_deref(), Some("cust-1"));

    let wallet = engine.wallet(&customer).await.unwrap();
    assert_eq!(wallet.balance, 500);
    assert_eq!(wallet.held_balance, 0);
    assert_eq!(wallet.total_spent, 1_500);
    assert!(engine.reconcile_wallet(&customer).await.unwrap().is_consistent());

    let err = engine
        .pay_with_wallet(WalletPaymentCmd::new("cust-1", "north", 900, "booking-43", "pos"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    let summary = engine.pending_earnings_summary("north").await.unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.net, 1_425);
}

#[tokio::test]
async fn request_needs_payout_details_and_minimum() {
    let (engine, _db, _) = engine_for_settlements().await;

    let err = engine.request_settlement("north", "mgr", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    earn(&engine, "north", "sale-1", 1_000).await;
    let err = engine.request_settlement("north", "mgr", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    earn(&engine, "north", "sale-2", 1_000).await;
    let err = engine.request_settlement("north", "mgr", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .set_branch_wallet_settings(
            BranchWalletSettingsCmd::new("north").payout(PayoutMethod::Bank, "0012-3456", "North Cuts"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    engine
        .set_branch_wallet_settings(
            BranchWalletSettingsCmd::new("north")
                .payout(PayoutMethod::Bank, "0012-3456", "North Cuts")
                .bank_name("BPI"),
        )
        .await
        .unwrap();
    let settlement = engine.request_settlement("north", "mgr", None).await.unwrap();
    assert_eq!(settlement.amount, 1_900);
    assert_eq!(settlement.gross_amount, 2_000);
    assert_eq!(settlement.commission_amount, 100);
    assert_eq!(settlement.earnings_count, 2);
    assert_eq!(settlement.payout_bank_name.as_deref(), Some("BPI"));
}

#[tokio::test]
async fn settlement_runs_to_completion() {
    let (engine, _db, notifier) = engine_for_settlements().await;
    with_gcash_payout(&engine, "south").await;
    earn(&engine, "south", "sale-1", 4_000).await;
    earn(&engine, "south", "sale-2", 6_000).await;

    let settlement = engine
        .request_settlement("south", "mgr", Some("October payout"))
        .await
        .unwrap();
    assert_eq!(settlement.status, SettlementStatus::Pending);
    assert_eq!(settlement.amount, 9_500);
    assert_eq!(engine.pending_earnings_summary("south").await.unwrap().count, 0);

    let settlement = engine
        .approve_settlement(settlement.id, "hq-finance", None)
        .await
        .unwrap();
    assert_eq!(settlement.approved_by.as_deref(), Some("hq-finance"));
    assert_eq!(settlement.notes.as_deref(), Some("October payout"));
    engine
        .mark_settlement_processing(settlement.id, "hq-finance")
        .await
        .unwrap();

    let err = engine
        .complete_settlement(settlement.id, "hq-finance", "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let settlement = engine
        .complete_settlement(settlement.id, "hq-finance", "GC-998877")
        .await
        .unwrap();
    assert_eq!(settlement.status, SettlementStatus::Completed);
    assert_eq!(settlement.transfer_reference.as_deref(), Some("GC-998877"));

    let earnings = engine.settlement_earnings(settlement.id).await.unwrap();
    assert_eq!(earnings.len(), 2);
    assert!(earnings.iter().all(|e| e.status == EarningStatus::Settled));

    let err = engine
        .reject_settlement(settlement.id, "hq-finance", "too late")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let statuses: Vec<_> = notifier
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::SettlementStatusChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        [
            SettlementStatus::Pending,
            SettlementStatus::Approved,
            SettlementStatus::Processing,
            SettlementStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn earnings_belong_to_one_open_settlement() {
    let (engine, _db, _) = engine_for_settlements().await;
    with_gcash_payout(&engine, "east").await;
    earn(&engine, "east", "sale-1", 2_000).await;
    earn(&engine, "east", "sale-2", 3_000).await;

    let first = engine.request_settlement("east", "mgr", None).await.unwrap();
    earn(&engine, "east", "sale-3", 5_000).await;

    let err = engine.request_settlement("east", "mgr", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert_eq!(engine.settlement_earnings(first.id).await.unwrap().len(), 2);

    let rejected = engine
        .reject_settlement(first.id, "hq-finance", "wrong account")
        .await
        .unwrap();
    assert_eq!(rejected.status, SettlementStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("wrong account"));
    assert!(engine.settlement_earnings(first.id).await.unwrap().is_empty());

    let err = engine
        .reject_settlement(first.id, "hq-finance", "again")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let second = engine.request_settlement("east", "mgr", None).await.unwrap();
    assert_eq!(second.earnings_count, 3);
    assert_eq!(second.gross_amount, 10_000);
    assert_eq!(second.amount, 9_500);

    let history = engine.branch_settlements("east").await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn reject_requires_reason_and_skipping_steps_is_refused() {
    let (engine, _db, _) = engine_for_settlements().await;
    with_gcash_payout(&engine, "west").await;
    earn(&engine, "west", "sale-1", 2_000).await;
    let settlement = engine.request_settlement("west", "mgr", None).await.unwrap();

    let err = engine
        .reject_settlement(settlement.id, "hq", "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .complete_settlement(settlement.id, "hq", "TX-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    let err = engine
        .mark_settlement_processing(settlement.id, "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let current = engine.settlement(settlement.id).await.unwrap();
    assert_eq!(current.status, SettlementStatus::Pending);
}

#[tokio::test]
async fn settlements_queue_by_status_across_branches() {
    let (engine, _db, _) = engine_for_settlements().await;
    for branch in ["north", "south", "east"] {
        with_gcash_payout(&engine, branch).await;
        earn(&engine, branch, &format!("{branch}-sale"), 5_000).await;
    }
    let north = engine.request_settlement("north", "mgr", None).await.unwrap();
    let south = engine.request_settlement("south", "mgr", None).await.unwrap();
    let east = engine.request_settlement("east", "mgr", None).await.unwrap();
    engine
        .approve_settlement(south.id, "finance", None)
        .await
        .unwrap();

    let pending: Vec<_> = engine
        .settlements_by_status(SettlementStatus::Pending)
        .await
        .unwrap()
        .iter()
        .map(|settlement| settlement.id)
        .collect();
    assert_eq!(pending, [north.id, east.id]);

    let approved = engine
        .settlements_by_status(SettlementStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].branch_id, "south");
    assert!(
        engine
            .settlements_by_status(SettlementStatus::Completed)
            .await
            .unwrap()
            .is_empty()
    );
}
