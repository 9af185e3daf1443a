#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use logoped_backend::entities::{
    EnrollmentStatus, LessonPayoutStatus, LessonStatus, PassStatus, UserRole,
    branch_entity as branches, child_entity as children, commission_rate_entity as rates,
    company_entity as companies, enrollment_entity as enrollments, lesson_entity as lessons,
    pass_entity as passes, transaction_entity as ledger, user_entity as users,
};
use logoped_backend::external::{Notifier, SharedNotifier};
use logoped_backend::models::RequestContext;
use logoped_backend::{AppError, AppResult};
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::{Arc, Mutex};

/// Fresh in-memory database with the full schema. A single connection keeps
/// every query on the same memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub fn admin() -> RequestContext {
    RequestContext::new(9999, UserRole::Admin)
}

pub fn as_user(user: &users::Model) -> RequestContext {
    RequestContext::new(user.id, user.role)
}

pub async fn create_user(
    db: &DatabaseConnection,
    name: &str,
    role: UserRole,
    branch_id: Option<i32>,
    lesson_price: Option<i64>,
) -> users::Model {
    users::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{name}@example.com")),
        role: Set(role),
        branch_id: Set(branch_id),
        lesson_price: Set(lesson_price),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn create_company(db: &DatabaseConnection, owner_id: i32) -> companies::Model {
    companies::ActiveModel {
        name: Set("Speech Studio".to_string()),
        owner_id: Set(owner_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert company")
}

pub async fn create_branch(
    db: &DatabaseConnection,
    company_id: i32,
    name: &str,
    manager_id: Option<i32>,
) -> branches::Model {
    branches::ActiveModel {
        company_id: Set(company_id),
        name: Set(name.to_string()),
        manager_id: Set(manager_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert branch")
}

pub async fn move_to_branch(
    db: &DatabaseConnection,
    user: users::Model,
    branch_id: i32,
) -> users::Model {
    let mut active: users::ActiveModel = user.into();
    active.branch_id = Set(Some(branch_id));
    active.update(db).await.expect("update user branch")
}

pub async fn create_child(
    db: &DatabaseConnection,
    parent_id: i32,
    name: &str,
    individual_price: Option<i64>,
) -> children::Model {
    children::ActiveModel {
        parent_id: Set(parent_id),
        name: Set(name.to_string()),
        individual_price: Set(individual_price),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert child")
}

pub async fn create_lesson(
    db: &DatabaseConnection,
    therapist_id: i32,
    group_id: Option<i32>,
) -> lessons::Model {
    let starts_at = Utc::now() - Duration::hours(2);
    lessons::ActiveModel {
        therapist_id: Set(therapist_id),
        group_id: Set(group_id),
        starts_at: Set(starts_at),
        ends_at: Set(starts_at + Duration::minutes(45)),
        status: Set(LessonStatus::Scheduled),
        evaluation: Set(None),
        payment_method: Set(None),
        commission_percent_at_time: Set(None),
        revenue_at_time: Set(None),
        therapist_share_at_time: Set(None),
        leader_share_at_time: Set(None),
        settled_at: Set(None),
        payout_status: Set(LessonPayoutStatus::NotRequested),
        payout_request_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert lesson")
}

pub async fn enroll(db: &DatabaseConnection, lesson_id: i32, child_id: i32) -> enrollments::Model {
    enrollments::ActiveModel {
        lesson_id: Set(lesson_id),
        child_id: Set(child_id),
        status: Set(EnrollmentStatus::Enrolled),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert enrollment")
}

pub async fn create_pass(
    db: &DatabaseConnection,
    child_id: i32,
    therapist_id: Option<i32>,
    total_lessons: i32,
    total_price: i64,
    valid_until: DateTime<Utc>,
) -> passes::Model {
    passes::ActiveModel {
        child_id: Set(child_id),
        therapist_id: Set(therapist_id),
        total_lessons: Set(total_lessons),
        remaining_lessons: Set(total_lessons),
        total_price: Set(total_price),
        valid_until: Set(valid_until),
        status: Set(PassStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert pass")
}

/// Open rate that started an hour ago.
pub async fn create_rate(db: &DatabaseConnection, user_id: i32, percent: i32) -> rates::Model {
    rates::ActiveModel {
        user_id: Set(user_id),
        percent: Set(percent),
        valid_from: Set(Utc::now() - Duration::hours(1)),
        valid_to: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert commission rate")
}

pub async fn reload_lesson(db: &DatabaseConnection, lesson_id: i32) -> lessons::Model {
    lessons::Entity::find_by_id(lesson_id)
        .one(db)
        .await
        .expect("query lesson")
        .expect("lesson exists")
}

pub async fn reload_pass(db: &DatabaseConnection, pass_id: i32) -> passes::Model {
    passes::Entity::find_by_id(pass_id)
        .one(db)
        .await
        .expect("query pass")
        .expect("pass exists")
}

pub async fn ledger_for_lesson(db: &DatabaseConnection, lesson_id: i32) -> Vec<ledger::Model> {
    ledger::Entity::find()
        .filter(ledger::Column::LessonId.eq(lesson_id))
        .order_by_asc(ledger::Column::Id)
        .all(db)
        .await
        .expect("query ledger")
}

pub async fn ledger_count(db: &DatabaseConnection) -> usize {
    ledger::Entity::find()
        .all(db)
        .await
        .expect("query ledger")
        .len()
}

/// A company with one branch: the owner, a branch manager, a plain
/// therapist in the branch and a parent with one child.
pub struct Org {
    pub owner: users::Model,
    pub manager: users::Model,
    pub therapist: users::Model,
    pub parent: users::Model,
    pub child: children::Model,
    pub company: companies::Model,
    pub branch: branches::Model,
}

pub async fn create_org(db: &DatabaseConnection, lesson_price: Option<i64>) -> Org {
    let owner = create_user(db, "owner", UserRole::Therapist, None, lesson_price).await;
    let manager = create_user(db, "manager", UserRole::Therapist, None, lesson_price).await;
    let company = create_company(db, owner.id).await;
    let branch = create_branch(db, company.id, "Center", Some(manager.id)).await;
    let owner = move_to_branch(db, owner, branch.id).await;
    let manager = move_to_branch(db, manager, branch.id).await;
    let therapist =
        create_user(db, "therapist", UserRole::Therapist, Some(branch.id), lesson_price).await;
    let parent = create_user(db, "parent", UserRole::Parent, None, None).await;
    let child = create_child(db, parent.id, "Ola", None).await;

    Org {
        owner,
        manager,
        therapist,
        parent,
        child,
        company,
        branch,
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("notifier lock")
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .expect("notifier lock")
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> AppResult<()> {
        Err(AppError::ExternalApiError("mail service down".to_string()))
    }
}

pub fn recording() -> (Arc<RecordingNotifier>, SharedNotifier) {
    let notifier = Arc::new(RecordingNotifier::default());
    let shared: SharedNotifier = notifier.clone();
    (notifier, shared)
}
