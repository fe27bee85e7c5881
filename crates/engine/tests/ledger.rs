mod common;

use common::{engine_with_db, funded};
use engine::{
    AdjustBalanceCmd, EngineError, ErrorKind, Reference, ReferenceType, TopUpCmd, WalletOwner,
    WalletTxKind,
};

fn manual(id: &str) -> Reference {
    Reference::new(ReferenceType::Manual, Some(id.to_string()))
}

#[tokio::test]
async fn movements_replay_to_stored_counters() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::branch("north");

    funded(&engine, &owner, 10_000).await;
    engine.hold(&owner, 4_000, manual("r1"), "hq").await.unwrap();
    engine
        .release_hold(&owner, 1_000, manual("r1"), "hq")
        .await
        .unwrap();
    engine.capture(&owner, 2_500, manual("r1"), "hq").await.unwrap();
    engine
        .adjust_balance(AdjustBalanceCmd::new(
            owner.clone(),
            -500,
            "till shortfall",
            "hq",
        ))
        .await
        .unwrap();

    let wallet = engine.wallet(&owner).await.unwrap();
    assert_eq!(wallet.balance, 6_500);
    assert_eq!(wallet.held_balance, 500);
    assert_eq!(wallet.total_spent, 2_500);
    assert_eq!(wallet.total_topped_up, 10_000);

    let report = engine.reconcile_wallet(&owner).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.replayed, report.stored);

    let records = engine.wallet_transactions(&owner).await.unwrap();
    let kinds: Vec<_> = records.iter().map(|record| record.kind).collect();
    assert_eq!(
        kinds,
        [
            WalletTxKind::Topup,
            WalletTxKind::Hold,
            WalletTxKind::ReleaseHold,
            WalletTxKind::Payment,
            WalletTxKind::Adjustment,
        ]
    );
    let amounts: Vec<_> = records.iter().map(|record| record.amount).collect();
    assert_eq!(amounts, [10_000, -4_000, 1_000, -2_500, -500]);
    let sequences: Vec<_> = records.iter().map(|record| record.sequence).collect();
    assert_eq!(sequences, [1, 2, 3, 4, 5]);
    assert_eq!(records[4].description.as_deref(), Some("till shortfall"));
}

#[tokio::test]
async fn failed_hold_leaves_wallet_untouched() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::customer("cust-1");
    funded(&engine, &owner, 100).await;

    let err = engine
        .hold(&owner, 150, manual("booking-9"), "pos")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let wallet = engine.wallet(&owner).await.unwrap();
    assert_eq!(wallet.balance, 100);
    assert_eq!(wallet.held_balance, 0);
    assert_eq!(engine.wallet_transactions(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn release_and_capture_need_enough_held() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::branch("south");
    funded(&engine, &owner, 1_000).await;
    engine.hold(&owner, 300, manual("r"), "hq").await.unwrap();

    let err = engine
        .release_hold(&owner, 301, manual("r"), "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHoldState);
    let err = engine
        .capture(&owner, 500, manual("r"), "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHoldState);

    let wallet = engine.wallet(&owner).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (700, 300));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::branch("east");
    funded(&engine, &owner, 1_000).await;

    let err = engine.hold(&owner, 0, manual("r"), "hq").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let err = engine
        .top_up(TopUpCmd::new(owner.clone(), -5, "hq"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(owner.clone(), 0, "noop", "hq"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn adjust_hold_follows_the_new_amount() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::branch("west");
    funded(&engine, &owner, 1_000).await;
    engine.hold(&owner, 600, manual("po"), "hq").await.unwrap();

    let none = engine
        .adjust_hold(&owner, 600, 600, manual("po"), "hq")
        .await
        .unwrap();
    assert!(none.is_none());

    let released = engine
        .adjust_hold(&owner, 600, 400, manual("po"), "hq")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(released.kind, WalletTxKind::ReleaseHold);
    assert_eq!(released.amount, 200);

    let err = engine
        .adjust_hold(&owner, 400, 1_500, manual("po"), "hq")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let wallet = engine.wallet(&owner).await.unwrap();
    assert_eq!((wallet.balance, wallet.held_balance), (600, 400));
    assert_eq!(engine.wallet_transactions(&owner).await.unwrap().len(), 3);
}

#[tokio::test]
async fn top_up_replay_credits_once() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::customer("cust-7");
    let cmd = TopUpCmd::new(owner.clone(), 5_000, "cashier")
        .reference_id("gcash-88")
        .idempotency_key("gcash-88");

    let first = engine.top_up(cmd.clone()).await.unwrap();
    let replay = engine.top_up(cmd).await.unwrap();
    assert_eq!(first.id, replay.id);

    let wallet = engine.wallet(&owner).await.unwrap();
    assert_eq!(wallet.balance, 5_000);
    assert_eq!(wallet.total_topped_up, 5_000);
    assert_eq!(engine.wallet_transactions(&owner).await.unwrap().len(), 1);

    let err = engine
        .top_up(TopUpCmd::new(owner.clone(), 4_000, "cashier").idempotency_key("gcash-88"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn adjustment_needs_reason_and_guards_negative() {
    let (engine, _db) = engine_with_db().await;
    let owner = WalletOwner::branch("central");
    funded(&engine, &owner, 300).await;

    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(owner.clone(), 100, "  ", "auditor"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("adjustment reason must not be empty".to_string())
    );

    let err = engine
        .adjust_balance(AdjustBalanceCmd::new(owner.clone(), -400, "write-off", "auditor"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let record = engine
        .adjust_balance(
            AdjustBalanceCmd::new(owner.clone(), -400, "write-off", "auditor").allow_negative(),
        )
        .await
        .unwrap();
    assert_eq!(record.balance_after, -100);
    assert!(engine.reconcile_wallet(&owner).await.unwrap().is_consistent());
}

#[tokio::test]
async fn unknown_wallet_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .wallet(&WalletOwner::customer("ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
