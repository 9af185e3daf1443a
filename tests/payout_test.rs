mod common;

use chrono::Utc;
use common::*;
use logoped_backend::AppError;
use logoped_backend::entities::{
    LessonPayoutStatus, PaymentMethod, PayoutRequestStatus, TransactionKind, UserRole,
    commission_rate_entity as rates, transaction_entity as ledger,
};
use logoped_backend::models::{PayoutQuery, Period};
use logoped_backend::services::commission_service::resolve_percent;
use logoped_backend::services::{
    CommissionService, FinanceService, PayoutService, SettlementService,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::json;
use std::sync::Arc;

async fn settled_lesson(
    db: &DatabaseConnection,
    therapist_id: i32,
    method: PaymentMethod,
) -> i32 {
    let lesson = create_lesson(db, therapist_id, None).await;
    SettlementService::new(db.clone())
        .settle_lesson(lesson.id, Some(method))
        .await
        .unwrap();
    lesson.id
}

fn all_requests() -> PayoutQuery {
    PayoutQuery {
        status: None,
        page: None,
        per_page: None,
    }
}

#[tokio::test]
async fn request_snapshots_balance_and_links_lessons() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    create_rate(&db, org.therapist.id, 60).await;
    let first = settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;
    let second = settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashTherapist).await;
    let unsettled = create_lesson(&db, org.therapist.id, None).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();

    assert_eq!(request.status, PayoutRequestStatus::Pending);
    assert_eq!(request.balance_snapshot, 800);
    assert_eq!(request.cash_held_snapshot, 400);
    assert_eq!(request.amount, 800);
    assert_eq!(request.lesson_count, 3);

    for id in [first, second] {
        let lesson = reload_lesson(&db, id).await;
        assert_eq!(lesson.payout_status, LessonPayoutStatus::Pending);
        assert_eq!(lesson.payout_request_id, Some(request.id));
    }
    let unsettled = reload_lesson(&db, unsettled.id).await;
    assert_eq!(unsettled.payout_status, LessonPayoutStatus::NotRequested);

    let err = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn confirm_books_payout_and_marks_lessons_paid() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let lesson_id = settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;

    let (recorder, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();
    assert_eq!(request.amount, 500);

    let confirmed = service
        .confirm_payout(&as_user(&org.manager), request.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PayoutRequestStatus::Approved);
    assert_eq!(confirmed.processed_by, Some(org.manager.id));
    assert!(confirmed.processed_at.is_some());

    let payouts = ledger::Entity::find()
        .filter(ledger::Column::Kind.eq(TransactionKind::Payout))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].amount, 500);
    assert_eq!(payouts[0].payout_request_id, Some(request.id));

    assert_eq!(
        reload_lesson(&db, lesson_id).await.payout_status,
        LessonPayoutStatus::Paid
    );

    let summary = FinanceService::new(db.clone())
        .user_summary(&as_user(&org.therapist), org.therapist.id, Period::default())
        .await
        .unwrap();
    assert_eq!(summary.totals.payouts, 500);
    assert_eq!(summary.totals.balance, 0);

    assert_eq!(recorder.recipients(), vec!["therapist@example.com".to_string()]);

    let err = service.confirm_payout(&admin(), request.id).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // nothing left to pay out
    let err = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn reject_releases_lessons() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    let lesson_id = settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();

    let rejected = service.reject_payout(&admin(), request.id).await.unwrap();
    assert_eq!(rejected.status, PayoutRequestStatus::Rejected);

    let lesson = reload_lesson(&db, lesson_id).await;
    assert_eq!(lesson.payout_status, LessonPayoutStatus::NotRequested);
    assert_eq!(lesson.payout_request_id, None);

    let payouts = ledger::Entity::find()
        .filter(ledger::Column::Kind.eq(TransactionKind::Payout))
        .all(&db)
        .await
        .unwrap();
    assert!(payouts.is_empty());

    // a new request picks the lesson up again
    let again = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();
    assert_eq!(again.lesson_count, 1);
}

#[tokio::test]
async fn failed_notification_does_not_undo_confirmation() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;

    let service = PayoutService::new(db.clone(), Arc::new(FailingNotifier));
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();
    let confirmed = service.confirm_payout(&admin(), request.id).await.unwrap();
    assert_eq!(confirmed.status, PayoutRequestStatus::Approved);
}

#[tokio::test]
async fn only_leaders_decide_on_requests() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;
    let colleague = create_user(
        &db,
        "colleague",
        UserRole::Therapist,
        Some(org.branch.id),
        None,
    )
    .await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();

    for ctx in [as_user(&colleague), as_user(&org.therapist), as_user(&org.parent)] {
        let err = service.confirm_payout(&ctx, request.id).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
    }

    // the company owner leads every branch of the company
    let confirmed = service
        .confirm_payout(&as_user(&org.owner), request.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PayoutRequestStatus::Approved);

    let err = service.reject_payout(&admin(), 5555).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn non_positive_balance_cannot_be_requested() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    // only cash kept by the therapist: balance is negative
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashTherapist).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let err = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = service.request_payout(&as_user(&org.parent)).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied));
}

#[tokio::test]
async fn listing_is_scoped_to_the_caller() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;
    settled_lesson(&db, org.manager.id, PaymentMethod::CashLeader).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();
    service.request_payout(&as_user(&org.manager)).await.unwrap();

    let own = service
        .list_requests(&as_user(&org.therapist), all_requests())
        .await
        .unwrap();
    assert_eq!(own.total, 1);
    assert_eq!(own.data[0].user_id, org.therapist.id);

    let everything = service.list_requests(&admin(), all_requests()).await.unwrap();
    assert_eq!(everything.total, 2);

    let approved = service
        .list_requests(
            &admin(),
            PayoutQuery {
                status: Some(PayoutRequestStatus::Approved),
                page: None,
                per_page: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.total, 0);
}

#[tokio::test]
async fn confirmed_payout_reduces_branch_and_company_balance() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.therapist))
        .await
        .unwrap();
    service
        .confirm_payout(&as_user(&org.manager), request.id)
        .await
        .unwrap();

    let payout = ledger::Entity::find()
        .filter(ledger::Column::Kind.eq(TransactionKind::Payout))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payout.branch_id, Some(org.branch.id));
    assert_eq!(payout.company_id, Some(org.company.id));
    assert_eq!(payout.meta["personal"], json!(false));

    let finance = FinanceService::new(db.clone());
    let branch = finance
        .branch_summary(&as_user(&org.manager), org.branch.id, Period::default())
        .await
        .unwrap();
    assert_eq!(branch.totals.payouts, 500);
    assert_eq!(branch.totals.balance, 0);
    let row = branch
        .therapists
        .iter()
        .find(|t| t.user_id == org.therapist.id)
        .unwrap();
    assert_eq!(row.totals.balance, 0);

    let company = finance
        .company_summary(&as_user(&org.owner), org.company.id, Period::default())
        .await
        .unwrap();
    assert_eq!(company.totals.payouts, 500);
    assert_eq!(company.totals.balance, 0);
}

#[tokio::test]
async fn personal_payout_stays_out_of_unit_totals() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.manager.id, PaymentMethod::CashLeader).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let request = service
        .request_payout(&as_user(&org.manager))
        .await
        .unwrap();
    assert_eq!(request.amount, 1000);
    service.confirm_payout(&as_user(&org.owner), request.id).await.unwrap();

    let branch = FinanceService::new(db.clone())
        .branch_summary(&as_user(&org.owner), org.branch.id, Period::default())
        .await
        .unwrap();
    assert_eq!(branch.totals.payouts, 0);
    assert_eq!(branch.totals.balance, 0);
}

#[tokio::test]
async fn simultaneous_requests_leave_one_pending() {
    let db = setup_db().await;
    let org = create_org(&db, Some(1000)).await;
    settled_lesson(&db, org.therapist.id, PaymentMethod::CashLeader).await;

    let (_, notifier) = recording();
    let service = PayoutService::new(db.clone(), notifier);
    let ctx = as_user(&org.therapist);
    let (a, b) = tokio::join!(service.request_payout(&ctx), service.request_payout(&ctx));
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let pending = service.list_requests(&ctx, all_requests()).await.unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.data[0].lesson_count, 1);
}

#[tokio::test]
async fn simultaneous_rate_edits_leave_one_open_interval() {
    let db = setup_db().await;
    let org = create_org(&db, None).await;
    let service = CommissionService::new(db.clone());
    let ctx = admin();

    let (a, b) = tokio::join!(
        service.set_rate(&ctx, org.therapist.id, 60),
        service.set_rate(&ctx, org.therapist.id, 70)
    );
    a.unwrap();
    b.unwrap();

    let open = rates::Entity::find()
        .filter(rates::Column::UserId.eq(org.therapist.id))
        .filter(rates::Column::ValidTo.is_null())
        .all(&db)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    let percent = resolve_percent(&db, org.therapist.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(percent, open[0].percent);
}
