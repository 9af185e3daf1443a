use crate::entities::{
    EnrollmentStatus, LessonPayoutStatus, LessonStatus, PaymentMethod, UserRole,
    child_entity as children, enrollment_entity as enrollments, group_entity as groups,
    lesson_entity as lessons, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::SharedNotifier;
use crate::models::{
    EvaluateLessonRequest, EvaluateLessonResponse, LessonQuery, LessonResponse, RequestContext,
    ScheduleLessonRequest, SettlementOutcome,
};
use crate::services::settlement_service::SettlementService;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct LessonService {
    pool: DatabaseConnection,
    settlement: SettlementService,
    notifier: SharedNotifier,
}

impl LessonService {
    pub fn new(
        pool: DatabaseConnection,
        settlement: SettlementService,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            pool,
            settlement,
            notifier,
        }
    }

    pub async fn schedule_lesson(
        &self,
        ctx: &RequestContext,
        request: ScheduleLessonRequest,
    ) -> AppResult<LessonResponse> {
        ctx.require_therapist()?;
        if request.ends_at <= request.starts_at {
            return Err(AppError::ValidationError(
                "Lesson must end after it starts".to_string(),
            ));
        }

        let therapist_id = match (ctx.is_admin(), request.therapist_id) {
            (true, Some(id)) => id,
            (true, None) => {
                return Err(AppError::ValidationError(
                    "therapist_id is required".to_string(),
                ));
            }
            (false, Some(id)) if id != ctx.user_id => return Err(AppError::PermissionDenied),
            (false, _) => ctx.user_id,
        };

        let therapist = users::Entity::find_by_id(therapist_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Therapist not found".to_string()))?;
        if therapist.role != UserRole::Therapist {
            return Err(AppError::ValidationError(
                "Lessons can only be scheduled for therapists".to_string(),
            ));
        }

        if let Some(group_id) = request.group_id {
            let group = groups::Entity::find_by_id(group_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
            if group.therapist_id != therapist_id {
                return Err(AppError::ValidationError(
                    "Group belongs to another therapist".to_string(),
                ));
            }
        }

        let child_ids: BTreeSet<i32> = request.child_ids.iter().copied().collect();
        if !child_ids.is_empty() {
            let found = children::Entity::find()
                .filter(children::Column::Id.is_in(child_ids.iter().copied()))
                .all(&self.pool)
                .await?;
            if found.len() != child_ids.len() {
                return Err(AppError::NotFound("Child not found".to_string()));
            }
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let lesson = lessons::ActiveModel {
            therapist_id: Set(therapist_id),
            group_id: Set(request.group_id),
            starts_at: Set(request.starts_at),
            ends_at: Set(request.ends_at),
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
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for child_id in &child_ids {
            enrollments::ActiveModel {
                lesson_id: Set(lesson.id),
                child_id: Set(*child_id),
                status: Set(EnrollmentStatus::Enrolled),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        log::info!(
            "Lesson {} scheduled for therapist {therapist_id} with {} children",
            lesson.id,
            child_ids.len()
        );
        Ok(lesson.into())
    }

    /// The lesson's therapist, the child's parent or an admin may cancel.
    pub async fn cancel_enrollment(
        &self,
        ctx: &RequestContext,
        enrollment_id: i32,
    ) -> AppResult<()> {
        let enrollment = enrollments::Entity::find_by_id(enrollment_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

        if !ctx.is_admin() {
            let allowed = match ctx.role {
                UserRole::Therapist => lessons::Entity::find_by_id(enrollment.lesson_id)
                    .one(&self.pool)
                    .await?
                    .is_some_and(|l| l.therapist_id == ctx.user_id),
                UserRole::Parent => children::Entity::find_by_id(enrollment.child_id)
                    .one(&self.pool)
                    .await?
                    .is_some_and(|c| c.parent_id == ctx.user_id),
                UserRole::Admin => true,
            };
            if !allowed {
                return Err(AppError::PermissionDenied);
            }
        }

        let result = enrollments::Entity::update_many()
            .set(enrollments::ActiveModel {
                status: Set(EnrollmentStatus::Cancelled),
                ..Default::default()
            })
            .filter(enrollments::Column::Id.eq(enrollment_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Enrolled))
            .exec(&self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::ValidationError(
                "Enrollment is already cancelled".to_string(),
            ));
        }

        log::info!("Enrollment {enrollment_id} cancelled by user {}", ctx.user_id);
        Ok(())
    }

    /// Records the evaluation, settles the lesson and tells the parents.
    pub async fn evaluate_lesson(
        &self,
        ctx: &RequestContext,
        lesson_id: i32,
        request: EvaluateLessonRequest,
    ) -> AppResult<EvaluateLessonResponse> {
        let lesson = lessons::Entity::find_by_id(lesson_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;
        ctx.require_self_or_admin(lesson.therapist_id)?;
        if lesson.status == LessonStatus::Cancelled {
            return Err(AppError::ValidationError(
                "Cancelled lessons cannot be evaluated".to_string(),
            ));
        }

        let mut active: lessons::ActiveModel = lesson.into();
        active.status = Set(LessonStatus::Evaluated);
        if let Some(text) = request.evaluation.clone() {
            active.evaluation = Set(Some(text));
        }
        active.update(&self.pool).await?;

        let settlement = self
            .settlement
            .settle_lesson(lesson_id, request.payment_method)
            .await?;

        // the lesson is settled at this point, mail problems must not undo that
        let notification_failures = match self
            .notify_parents(lesson_id, request.evaluation.as_deref())
            .await
        {
            Ok(failures) => failures,
            Err(e) => {
                log::warn!("Could not load parents of lesson {lesson_id}: {e}");
                0
            }
        };

        let lesson = lessons::Entity::find_by_id(lesson_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

        Ok(EvaluateLessonResponse {
            lesson: lesson.into(),
            settlement,
            notification_failures,
        })
    }

    /// Settlement re-run for lessons whose evaluation did not settle them.
    pub async fn settle(
        &self,
        ctx: &RequestContext,
        lesson_id: i32,
        payment_method: Option<PaymentMethod>,
    ) -> AppResult<SettlementOutcome> {
        ctx.require_admin()?;
        self.settlement.settle_lesson(lesson_id, payment_method).await
    }

    pub async fn list_lessons(
        &self,
        ctx: &RequestContext,
        query: LessonQuery,
    ) -> AppResult<Vec<LessonResponse>> {
        let mut select = lessons::Entity::find();

        match ctx.role {
            UserRole::Admin => {
                if let Some(therapist_id) = query.therapist_id {
                    select = select.filter(lessons::Column::TherapistId.eq(therapist_id));
                }
            }
            UserRole::Therapist => {
                select = select.filter(lessons::Column::TherapistId.eq(ctx.user_id));
            }
            UserRole::Parent => {
                let child_ids: Vec<i32> = children::Entity::find()
                    .filter(children::Column::ParentId.eq(ctx.user_id))
                    .all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|c| c.id)
                    .collect();
                let lesson_ids: Vec<i32> = enrollments::Entity::find()
                    .filter(enrollments::Column::ChildId.is_in(child_ids))
                    .all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|e| e.lesson_id)
                    .collect();
                select = select.filter(lessons::Column::Id.is_in(lesson_ids));
            }
        }

        if let Some(from) = query.from {
            select = select.filter(lessons::Column::StartsAt.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(lessons::Column::StartsAt.lt(to));
        }

        let list = select
            .order_by_asc(lessons::Column::StartsAt)
            .order_by_asc(lessons::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// Returns how many parents could not be reached.
    async fn notify_parents(&self, lesson_id: i32, evaluation: Option<&str>) -> AppResult<usize> {
        let child_ids: Vec<i32> = enrollments::Entity::find()
            .filter(enrollments::Column::LessonId.eq(lesson_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Enrolled))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|e| e.child_id)
            .collect();
        if child_ids.is_empty() {
            return Ok(0);
        }

        let kids = children::Entity::find()
            .filter(children::Column::Id.is_in(child_ids))
            .all(&self.pool)
            .await?;
        let parent_ids: BTreeSet<i32> = kids.iter().map(|c| c.parent_id).collect();
        let parents = users::Entity::find()
            .filter(users::Column::Id.is_in(parent_ids))
            .all(&self.pool)
            .await?;

        let body = match evaluation {
            Some(text) => format!("Lesson evaluation:\n\n{text}"),
            None => "Your child's lesson has been evaluated.".to_string(),
        };

        let mut failures = 0;
        for parent in parents {
            if let Err(e) = self
                .notifier
                .send(&parent.email, "Lesson evaluated", &body)
                .await
            {
                log::warn!(
                    "Failed to notify parent {} about lesson {lesson_id}: {e}",
                    parent.id
                );
                failures += 1;
            }
        }
        Ok(failures)
    }
}
