mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use common::{RecordingNotifier, engine_with, engine_with_db};
use engine::{
    AdjustPointsCmd, EngineConfig, EngineEvent, ErrorKind, Points, PointsCmd, PointsTxKind,
};

fn pts(value: &str) -> Points {
    value.parse().unwrap()
}

#[tokio::test]
async fn seeding_tiers_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let first = engine.seed_default_tiers().await.unwrap();
    let second = engine.seed_default_tiers().await.unwrap();
    assert_eq!(first, second);
    let names: Vec<_> = engine
        .tiers()
        .await
        .unwrap()
        .into_iter()
        .map(|tier| tier.name)
        .collect();
    assert_eq!(names, ["Bronze", "Silver", "Gold", "Platinum"]);
}

#[tokio::test]
async fn earning_promotes_upward() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _db) = engine_with(EngineConfig::default(), notifier.clone()).await;
    engine.seed_default_tiers().await.unwrap();

    let outcome = engine
        .earn_points(PointsCmd::new("cust-1", pts("45.75"), "payment").branch_id("north"))
        .await
        .unwrap();
    assert_eq!(outcome.ledger.current_balance, pts("45.75"));
    assert_eq!(outcome.ledger.current_tier.as_deref(), Some("Bronze"));
    assert_eq!(
        outcome.transaction.notes.as_deref(),
        Some("[TIER_PROMOTION:None→Bronze]")
    );
    assert_eq!(outcome.transaction.sequence, 1);

    let outcome = engine
        .earn_points(PointsCmd::new("cust-1", pts("4954.25"), "payment").notes("anniversary"))
        .await
        .unwrap();
    let promotion = outcome.promotion.unwrap();
    assert_eq!(promotion.previous.as_deref(), Some("Bronze"));
    assert_eq!(promotion.new, "Silver");
    assert_eq!(
        outcome.transaction.notes.as_deref(),
        Some("anniversary [TIER_PROMOTION:Bronze→Silver]")
    );
    assert_eq!(outcome.ledger.lifetime_earned, pts("5000"));

    let outcome = engine
        .earn_points(PointsCmd::new("cust-1", pts("10"), "payment"))
        .await
        .unwrap();
    assert!(outcome.promotion.is_none());
    assert_eq!(outcome.transaction.notes, None);

    let promoted: Vec<_> = notifier
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::TierPromoted { new, .. } => Some(new.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(promoted, ["Bronze", "Silver"]);
}

#[tokio::test]
async fn redeeming_more_than_balance_changes_nothing() {
    let (engine, _db) = engine_with_db().await;
    engine
        .earn_points(PointsCmd::new("cust-2", pts("300"), "payment"))
        .await
        .unwrap();

    let err = engine
        .redeem_points(PointsCmd::new("cust-2", pts("500"), "reward"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

    let ledger = engine.points_ledger("cust-2").await.unwrap();
    assert_eq!(ledger.current_balance, pts("300"));
    assert_eq!(ledger.lifetime_redeemed, Points::ZERO);
    assert_eq!(ledger.version, 1);
    assert_eq!(engine.points_history("cust-2").await.unwrap().len(), 1);

    let outcome = engine
        .redeem_points(PointsCmd::new("cust-2", pts("120.50"), "reward").actor("pos"))
        .await
        .unwrap();
    assert_eq!(outcome.transaction.kind, PointsTxKind::Redeem);
    assert_eq!(outcome.transaction.amount, pts("-120.50"));
    assert_eq!(outcome.ledger.current_balance, pts("179.50"));
    assert_eq!(outcome.ledger.lifetime_redeemed, pts("120.50"));

    let err = engine
        .redeem_points(PointsCmd::new("nobody", pts("1"), "reward"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
}

#[tokio::test]
async fn redemption_never_demotes() {
    let (engine, _db) = engine_with_db().await;
    engine.seed_default_tiers().await.unwrap();
    engine
        .earn_points(PointsCmd::new("cust-3", pts("15000"), "payment"))
        .await
        .unwrap();
    let outcome = engine
        .redeem_points(PointsCmd::new("cust-3", pts("14000"), "reward"))
        .await
        .unwrap();
    assert_eq!(outcome.ledger.current_tier.as_deref(), Some("Gold"));
    assert!(outcome.promotion.is_none());
}

#[tokio::test]
async fn adjustments_need_reason_and_guard_negative() {
    let (engine, _db) = engine_with_db().await;
    engine.seed_default_tiers().await.unwrap();
    engine
        .earn_points(PointsCmd::new("cust-4", pts("100"), "payment"))
        .await
        .unwrap();

    let err = engine
        .adjust_points(AdjustPointsCmd::new("cust-4", pts("10"), "", "auditor"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = engine
        .adjust_points(AdjustPointsCmd::new("cust-4", pts("-150"), "chargeback", "auditor"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

    let outcome = engine
        .adjust_points(
            AdjustPointsCmd::new("cust-4", pts("-150"), "chargeback", "auditor").allow_negative(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.ledger.current_balance, pts("-50"));
    assert_eq!(outcome.transaction.source_type, "adjustment");
    assert_eq!(outcome.transaction.created_by.as_deref(), Some("auditor"));
    assert_eq!(
        outcome.transaction.notes.as_deref(),
        Some("[MANUAL_ADJUST by auditor] chargeback")
    );

    let outcome = engine
        .adjust_points(AdjustPointsCmd::new("cust-4", pts("5000"), "migration", "auditor"))
        .await
        .unwrap();
    assert_eq!(outcome.ledger.lifetime_earned, pts("5100"));
    assert_eq!(outcome.ledger.current_tier.as_deref(), Some("Silver"));
    assert_eq!(
        outcome.transaction.notes.as_deref(),
        Some("[MANUAL_ADJUST by auditor] migration [TIER_PROMOTION:Bronze→Silver]")
    );

    let history = engine.points_history("cust-4").await.unwrap();
    let sequences: Vec<_> = history.iter().map(|record| record.sequence).collect();
    assert_eq!(sequences, [1, 2, 3]);
}

#[tokio::test]
async fn inactive_balances_expire_once() {
    let config = EngineConfig {
        points_expiry_months: 12,
        ..EngineConfig::default()
    };
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _db) = engine_with(config, notifier).await;
    engine
        .earn_points(PointsCmd::new("cust-5", pts("80"), "payment"))
        .await
        .unwrap();
    engine
        .earn_points(PointsCmd::new("cust-6", pts("20"), "payment"))
        .await
        .unwrap();
    engine
        .redeem_points(PointsCmd::new("cust-6", pts("20"), "reward"))
        .await
        .unwrap();

    let recent = engine.expire_points(Utc::now(), false).await.unwrap();
    assert!(recent.expired.is_empty());

    let later = Utc::now() + TimeDelta::days(400);
    let preview = engine.expire_points(later, true).await.unwrap();
    assert!(preview.dry_run);
    let users: Vec<_> = preview.expired.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(users, ["cust-5"]);
    assert_eq!(preview.total, pts("80"));
    assert_eq!(
        engine.points_ledger("cust-5").await.unwrap().current_balance,
        pts("80")
    );

    let run = engine.expire_points(later, false).await.unwrap();
    assert_eq!(run.total, pts("80"));

    let ledger = engine.points_ledger("cust-5").await.unwrap();
    assert_eq!(ledger.current_balance, Points::ZERO);
    assert_eq!(ledger.lifetime_earned, pts("80"));
    assert!(ledger.last_activity_at > Utc::now());

    let history = engine.points_history("cust-5").await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.kind, PointsTxKind::Adjust);
    assert_eq!(last.source_type, "expiry");
    assert_eq!(last.amount, pts("-80"));
    assert_eq!(last.balance_after, Points::ZERO);
    assert_eq!(
        last.notes.as_deref(),
        Some("Points expired after 12 months of inactivity")
    );

    let again = engine.expire_points(later, false).await.unwrap();
    assert!(again.expired.is_empty());
    assert_eq!(engine.points_history("cust-5").await.unwrap().len(), 2);
}

#[tokio::test]
async fn expiry_is_off_by_default() {
    let (engine, _db) = engine_with_db().await;
    engine
        .earn_points(PointsCmd::new("cust-7", pts("10"), "payment"))
        .await
        .unwrap();

    let report = engine
        .expire_points(Utc::now() + TimeDelta::days(4_000), false)
        .await
        .unwrap();
    assert_eq!(report.expiry_months, 0);
    assert!(report.expired.is_empty());
    assert_eq!(
        engine.points_ledger("cust-7").await.unwrap().current_balance,
        pts("10")
    );
}
