use crate::entities::{
    PassStatus, UserRole, child_entity as children, pass_entity as passes, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{PassResponse, RequestContext, SellPassRequest};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

/// Active pass a lesson of `therapist_id` may consume for `child_id`: not
/// expired, not exhausted, and either open or scoped to that therapist.
/// The pass that expires soonest is used first.
pub async fn find_active_pass<C: ConnectionTrait>(
    conn: &C,
    child_id: i32,
    therapist_id: i32,
    now: DateTime<Utc>,
) -> AppResult<Option<passes::Model>> {
    let pass = passes::Entity::find()
        .filter(passes::Column::ChildId.eq(child_id))
        .filter(passes::Column::Status.eq(PassStatus::Active))
        .filter(passes::Column::ValidUntil.gte(now))
        .filter(passes::Column::RemainingLessons.gt(0))
        .filter(
            Condition::any()
                .add(passes::Column::TherapistId.is_null())
                .add(passes::Column::TherapistId.eq(therapist_id)),
        )
        .order_by_asc(passes::Column::ValidUntil)
        .order_by_asc(passes::Column::Id)
        .one(conn)
        .await?;
    Ok(pass)
}

#[derive(Clone)]
pub struct PassService {
    pool: DatabaseConnection,
}

impl PassService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn sell_pass(
        &self,
        ctx: &RequestContext,
        request: SellPassRequest,
    ) -> AppResult<PassResponse> {
        ctx.require_therapist()?;

        if request.total_lessons <= 0 {
            return Err(AppError::ValidationError(
                "A pass must contain at least one lesson".to_string(),
            ));
        }
        if request.total_price < 0 {
            return Err(AppError::ValidationError(
                "Pass price cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        if request.valid_until <= now {
            return Err(AppError::ValidationError(
                "Pass validity must end in the future".to_string(),
            ));
        }

        // therapists sell passes for their own lessons only
        let therapist_id = if ctx.is_admin() {
            request.therapist_id
        } else {
            match request.therapist_id {
                Some(id) if id != ctx.user_id => return Err(AppError::PermissionDenied),
                _ => Some(ctx.user_id),
            }
        };

        if let Some(therapist_id) = therapist_id {
            let therapist = users::Entity::find_by_id(therapist_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Therapist not found".to_string()))?;
            if therapist.role != UserRole::Therapist {
                return Err(AppError::ValidationError(
                    "Passes can only be scoped to therapists".to_string(),
                ));
            }
        }

        children::Entity::find_by_id(request.child_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Child not found".to_string()))?;

        let pass = passes::ActiveModel {
            child_id: Set(request.child_id),
            therapist_id: Set(therapist_id),
            total_lessons: Set(request.total_lessons),
            remaining_lessons: Set(request.total_lessons),
            total_price: Set(request.total_price),
            valid_until: Set(request.valid_until),
            status: Set(PassStatus::Active),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Pass {} sold for child {}: {} lessons for {}",
            pass.id,
            pass.child_id,
            pass.total_lessons,
            pass.total_price
        );
        Ok(pass.into())
    }

    pub async fn list_for_child(
        &self,
        ctx: &RequestContext,
        child_id: i32,
    ) -> AppResult<Vec<PassResponse>> {
        let child = children::Entity::find_by_id(child_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Child not found".to_string()))?;
        if ctx.role == UserRole::Parent && child.parent_id != ctx.user_id {
            return Err(AppError::PermissionDenied);
        }

        let list = passes::Entity::find()
            .filter(passes::Column::ChildId.eq(child_id))
            .order_by_desc(passes::Column::CreatedAt)
            .order_by_desc(passes::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// Marks active passes past their validity as expired. Remaining lessons
    /// are left untouched.
    pub async fn expire_passes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = passes::Entity::update_many()
            .set(passes::ActiveModel {
                status: Set(PassStatus::Expired),
                ..Default::default()
            })
            .filter(passes::Column::Status.eq(PassStatus::Active))
            .filter(passes::Column::ValidUntil.lt(now))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }
}
