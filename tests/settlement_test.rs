mod common;

use chrono::{Duration, Utc};
use common::*;
use logoped_backend::entities::{
    PassStatus, PaymentMethod, TransactionKind, UserRole, group_entity as groups,
    pass_usage_entity as usages,
};
use logoped_backend::models::{SettlementOutcome, SkipReason};
use logoped_backend::services::SettlementService;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;

#[tokio::test]
async fn cash_leader_splits_by_commission_rate() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    create_rate(&db, org.therapist.id, 60).await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let service = SettlementService::new(db.clone());
    let outcome = service
        .settle_lesson(lesson.id, Some(PaymentMethod::CashLeader))
        .await
        .unwrap();

    match outcome {
        SettlementOutcome::Settled {
            revenue,
            therapist_share,
            leader_share,
            commission_percent,
            personal,
            ledger_rows,
            ..
        } => {
            assert_eq!(revenue, 1000);
            assert_eq!(therapist_share, 600);
            assert_eq!(leader_share, 400);
            assert_eq!(commission_percent, 60);
            assert!(!personal);
            assert_eq!(ledger_rows, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let lesson = reload_lesson(&db, lesson.id).await;
    assert!(lesson.settled_at.is_some());
    assert_eq!(lesson.payment_method, Some(PaymentMethod::CashLeader));
    assert_eq!(lesson.commission_percent_at_time, Some(60));
    assert_eq!(lesson.revenue_at_time, Some(1000));
    assert_eq!(lesson.therapist_share_at_time, Some(600));
    assert_eq!(lesson.leader_share_at_time, Some(400));

    let rows = ledger_for_lesson(&db, lesson.id).await;
    assert_eq!(rows.len(), 2);
    let balance = rows
        .iter()
        .find(|r| r.kind == TransactionKind::TherapistBalance)
        .unwrap();
    assert_eq!(balance.amount, 600);
    assert_eq!(balance.user_id, org.therapist.id);
    assert_eq!(balance.branch_id, Some(org.branch.id));
    assert_eq!(balance.company_id, Some(org.company.id));
    let revenue = rows
        .iter()
        .find(|r| r.kind == TransactionKind::Revenue)
        .unwrap();
    assert_eq!(revenue.amount, 1000);
    assert_eq!(revenue.meta["personal"], json!(false));
    assert_eq!(revenue.meta["payment_method"], json!("CASH_LEADER"));
}

#[tokio::test]
async fn auto_consumes_pass_at_per_lesson_price() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1500)).await;
    create_rate(&db, org.therapist.id, 50).await;
    let pass = create_pass(
        &db,
        org.child.id,
        None,
        4,
        4000,
        Utc::now() + Duration::days(30),
    )
    .await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let service = SettlementService::new(db.clone());
    let outcome = service.settle_lesson(lesson.id, None).await.unwrap();

    match outcome {
        SettlementOutcome::Settled {
            payment_method,
            revenue,
            therapist_share,
            pass_id,
            ..
        } => {
            assert_eq!(payment_method, PaymentMethod::Auto);
            assert_eq!(revenue, 1000);
            assert_eq!(therapist_share, 500);
            assert_eq!(pass_id, Some(pass.id));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let pass = reload_pass(&db, pass.id).await;
    assert_eq!(pass.remaining_lessons, 3);
    assert_eq!(pass.status, PassStatus::Active);

    let used = usages::Entity::find()
        .filter(usages::Column::LessonId.eq(lesson.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].pass_id, pass.id);

    let rows = ledger_for_lesson(&db, lesson.id).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.meta["pass_id"] == json!(pass.id)));
}

#[tokio::test]
async fn last_pass_lesson_closes_the_pass() {
    let db = setup_db().await;
    let org = create_org(&db, Some(800)).await;
    let pass = create_pass(
        &db,
        org.child.id,
        Some(org.therapist.id),
        1,
        900,
        Utc::now() + Duration::days(7),
    )
    .await;

    let service = SettlementService::new(db.clone());

    let first = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, first.id, org.child.id).await;
    let outcome = service.settle_lesson(first.id, None).await.unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled { revenue: 900, pass_id: Some(_), .. }
    ));

    let pass = reload_pass(&db, pass.id).await;
    assert_eq!(pass.remaining_lessons, 0);
    assert_eq!(pass.status, PassStatus::Cancelled);

    // exhausted pass: billed at nominal price
    let second = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, second.id, org.child.id).await;
    let outcome = service.settle_lesson(second.id, None).await.unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled { revenue: 800, pass_id: None, .. }
    ));
}

#[tokio::test]
async fn pass_scoped_to_other_therapist_or_expired_is_ignored() {
    let db = setup_db().await;
    let org = create_org(&db, Some(700)).await;
    create_pass(
        &db,
        org.child.id,
        Some(org.manager.id),
        5,
        5000,
        Utc::now() + Duration::days(10),
    )
    .await;
    let expired = create_pass(
        &db,
        org.child.id,
        None,
        5,
        5000,
        Utc::now() - Duration::days(1),
    )
    .await;

    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::Auto))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled { revenue: 700, pass_id: None, .. }
    ));
    assert_eq!(reload_pass(&db, expired.id).await.remaining_lessons, 5);
}

#[tokio::test]
async fn cash_therapist_records_debt_only() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    create_rate(&db, org.therapist.id, 70).await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::CashTherapist))
        .await
        .unwrap();

    match outcome {
        SettlementOutcome::Settled {
            revenue,
            therapist_share,
            leader_share,
            cash_held,
            ..
        } => {
            assert_eq!((revenue, therapist_share, leader_share), (0, 0, 0));
            assert_eq!(cash_held, 300);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let lesson = reload_lesson(&db, lesson.id).await;
    assert_eq!(lesson.revenue_at_time, Some(0));
    assert_eq!(lesson.therapist_share_at_time, Some(0));
    assert_eq!(lesson.leader_share_at_time, Some(0));

    let rows = ledger_for_lesson(&db, lesson.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::CashHeld);
    assert_eq!(rows[0].amount, 300);
    assert_eq!(rows[0].user_id, org.therapist.id);
}

#[tokio::test]
async fn settling_twice_changes_nothing() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let pass = create_pass(
        &db,
        org.child.id,
        None,
        10,
        10000,
        Utc::now() + Duration::days(30),
    )
    .await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let service = SettlementService::new(db.clone());
    assert!(service.settle_lesson(lesson.id, None).await.unwrap().is_settled());
    let rows_after_first = ledger_count(&db).await;
    let snapshot = reload_lesson(&db, lesson.id).await;

    for method in [None, Some(PaymentMethod::CashLeader), Some(PaymentMethod::CashTherapist)] {
        let outcome = service.settle_lesson(lesson.id, method).await.unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::AlreadySettled {
                lesson_id: lesson.id
            }
        );
    }

    assert_eq!(ledger_count(&db).await, rows_after_first);
    assert_eq!(reload_lesson(&db, lesson.id).await, snapshot);
    assert_eq!(reload_pass(&db, pass.id).await.remaining_lessons, 9);
}

#[tokio::test]
async fn concurrent_settlement_settles_once() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let service = SettlementService::new(db.clone());
    let (a, b) = tokio::join!(
        service.settle_lesson(lesson.id, Some(PaymentMethod::CashLeader)),
        service.settle_lesson(lesson.id, Some(PaymentMethod::CashlessLeader)),
    );
    let settled = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| o.is_settled())
        .count();
    assert_eq!(settled, 1);
    assert_eq!(ledger_for_lesson(&db, lesson.id).await.len(), 2);
}

#[tokio::test]
async fn owner_lessons_are_personal() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1200)).await;
    create_rate(&db, org.owner.id, 40).await;
    let lesson = create_lesson(&db, org.owner.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::CashlessLeader))
        .await
        .unwrap();
    match outcome {
        SettlementOutcome::Settled {
            personal,
            commission_percent,
            therapist_share,
            leader_share,
            ..
        } => {
            assert!(personal);
            assert_eq!(commission_percent, 100);
            assert_eq!(therapist_share, 1200);
            assert_eq!(leader_share, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let rows = ledger_for_lesson(&db, lesson.id).await;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.branch_id, None);
        assert_eq!(row.company_id, None);
        assert!(row.is_personal());
    }
}

#[tokio::test]
async fn manager_keeping_cash_books_plain_revenue() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let lesson = create_lesson(&db, org.manager.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::CashTherapist))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled {
            revenue: 1000,
            therapist_share: 1000,
            cash_held: 0,
            personal: true,
            ..
        }
    ));

    let rows = ledger_for_lesson(&db, lesson.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::Revenue);
    assert_eq!(rows[0].branch_id, None);
}

#[tokio::test]
async fn solo_therapist_without_branch_is_personal() {
    let db = setup_db().await;
    let solo = create_user(&db, "solo", UserRole::Therapist, None, Some(900)).await;
    let parent = create_user(&db, "mum", UserRole::Parent, None, None).await;
    let child = create_child(&db, parent.id, "Kuba", None).await;
    let lesson = create_lesson(&db, solo.id, None).await;
    enroll(&db, lesson.id, child.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::CashLeader))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled { personal: true, therapist_share: 900, .. }
    ));
    // no branch, so no default group either
    assert_eq!(reload_lesson(&db, lesson.id).await.group_id, None);
}

#[tokio::test]
async fn lesson_without_group_gets_default_group() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let service = SettlementService::new(db.clone());

    let first = create_lesson(&db, org.therapist.id, None).await;
    service
        .settle_lesson(first.id, Some(PaymentMethod::CashLeader))
        .await
        .unwrap();
    let second = create_lesson(&db, org.therapist.id, None).await;
    service
        .settle_lesson(second.id, Some(PaymentMethod::CashLeader))
        .await
        .unwrap();

    let first = reload_lesson(&db, first.id).await;
    let second = reload_lesson(&db, second.id).await;
    let group_id = first.group_id.expect("default group attached");
    assert_eq!(second.group_id, Some(group_id));

    let group = groups::Entity::find_by_id(group_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(group.is_default);
    assert_eq!(group.therapist_id, org.therapist.id);
    assert_eq!(group.branch_id, Some(org.branch.id));
}

#[tokio::test]
async fn child_price_overrides_therapist_price() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let discounted = create_child(&db, org.parent.id, "Zosia", Some(750)).await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, discounted.id).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(PaymentMethod::CashLeader))
        .await
        .unwrap();
    // no rate on file: default 50%
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled {
            revenue: 750,
            commission_percent: 50,
            therapist_share: 375,
            leader_share: 375,
            ..
        }
    ));
}

#[tokio::test]
async fn zero_price_writes_no_ledger_rows() {
    let db = setup_db().await;
    let org = create_org(&db, None).await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, None)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled { revenue: 0, ledger_rows: 0, .. }
    ));
    assert!(reload_lesson(&db, lesson.id).await.settled_at.is_some());
    assert_eq!(ledger_count(&db).await, 0);
}

#[tokio::test]
async fn missing_lesson_is_skipped() {
    let db = setup_db().await;
    let outcome = SettlementService::new(db.clone())
        .settle_lesson(4242, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SettlementOutcome::Skipped {
            lesson_id: 4242,
            reason: SkipReason::LessonNotFound
        }
    );
}

#[tokio::test]
async fn shares_always_add_up_to_revenue() {
    let db = setup_db().await;
    let org = create_org(&db, Some(333)).await;
    create_rate(&db, org.therapist.id, 33).await;
    let service = SettlementService::new(db.clone());

    for _ in 0..3 {
        let lesson = create_lesson(&db, org.therapist.id, None).await;
        enroll(&db, lesson.id, org.child.id).await;
        service
            .settle_lesson(lesson.id, Some(PaymentMethod::CashlessLeader))
            .await
            .unwrap();
        let lesson = reload_lesson(&db, lesson.id).await;
        assert_eq!(
            lesson.therapist_share_at_time.unwrap() + lesson.leader_share_at_time.unwrap(),
            lesson.revenue_at_time.unwrap()
        );
        assert_eq!(lesson.therapist_share_at_time, Some(110));
    }
}

#[tokio::test]
async fn existing_pass_usage_only_finishes_the_snapshot() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1500)).await;
    create_rate(&db, org.therapist.id, 50).await;
    let pass = create_pass(
        &db,
        org.child.id,
        None,
        4,
        4000,
        Utc::now() + Duration::days(30),
    )
    .await;
    let lesson = create_lesson(&db, org.therapist.id, None).await;
    enroll(&db, lesson.id, org.child.id).await;

    // an earlier run recorded the usage but never marked the lesson
    usages::ActiveModel {
        pass_id: Set(pass.id),
        lesson_id: Set(lesson.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let outcome = SettlementService::new(db.clone())
        .settle_lesson(lesson.id, None)
        .await
        .unwrap();
    match outcome {
        SettlementOutcome::Settled {
            payment_method,
            revenue,
            therapist_share,
            pass_id,
            ledger_rows,
            ..
        } => {
            assert_eq!(payment_method, PaymentMethod::Auto);
            assert_eq!(revenue, 1000);
            assert_eq!(therapist_share, 500);
            assert_eq!(pass_id, Some(pass.id));
            assert_eq!(ledger_rows, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let lesson = reload_lesson(&db, lesson.id).await;
    assert!(lesson.settled_at.is_some());
    assert_eq!(lesson.revenue_at_time, Some(1000));
    assert_eq!(lesson.therapist_share_at_time, Some(500));
    assert_eq!(reload_pass(&db, pass.id).await.remaining_lessons, 4);
    assert!(ledger_for_lesson(&db, lesson.id).await.is_empty());
}
