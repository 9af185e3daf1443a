use crate::entities::{UserRole, commission_rate_entity as rates, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::{CommissionOverviewResponse, CommissionRateResponse, RequestContext};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// Applied when a therapist has no valid rate for the moment of settlement.
pub const DEFAULT_COMMISSION_PERCENT: i32 = 50;

pub fn is_valid_percent(percent: i32) -> bool {
    percent > 0 && percent <= 100
}

/// Therapist's share in percent at `now`. Never fails on business grounds:
/// a missing or out-of-range rate falls back to the default.
pub async fn resolve_percent<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    now: DateTime<Utc>,
) -> AppResult<i32> {
    let rate = rates::Entity::find()
        .filter(rates::Column::UserId.eq(user_id))
        .filter(rates::Column::ValidFrom.lte(now))
        .filter(
            Condition::any()
                .add(rates::Column::ValidTo.is_null())
                .add(rates::Column::ValidTo.gte(now)),
        )
        .order_by_desc(rates::Column::ValidFrom)
        .one(conn)
        .await?;

    Ok(rate
        .map(|r| r.percent)
        .filter(|p| is_valid_percent(*p))
        .unwrap_or(DEFAULT_COMMISSION_PERCENT))
}

#[derive(Clone)]
pub struct CommissionService {
    pool: DatabaseConnection,
}

impl CommissionService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Closes the open interval and opens a new one starting now, in one
    /// transaction, so a user never has two open rates.
    pub async fn set_rate(
        &self,
        ctx: &RequestContext,
        user_id: i32,
        percent: i32,
    ) -> AppResult<CommissionRateResponse> {
        ctx.require_admin()?;
        if !is_valid_percent(percent) {
            return Err(AppError::ValidationError(
                "Commission percent must be in (0, 100]".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;

        // row lock keeps concurrent edits from opening two intervals
        let Some(user) = users::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(AppError::NotFound("User not found".to_string()));
        };
        if user.role != UserRole::Therapist {
            txn.rollback().await?;
            return Err(AppError::ValidationError(
                "Commission rates apply to therapists only".to_string(),
            ));
        }

        rates::Entity::update_many()
            .set(rates::ActiveModel {
                valid_to: Set(Some(now)),
                ..Default::default()
            })
            .filter(rates::Column::UserId.eq(user_id))
            .filter(rates::Column::ValidTo.is_null())
            .exec(&txn)
            .await?;

        let rate = rates::ActiveModel {
            user_id: Set(user_id),
            percent: Set(percent),
            valid_from: Set(now),
            valid_to: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        log::info!(
            "Commission rate for user {user_id} set to {percent}% by admin {}",
            ctx.user_id
        );
        Ok(rate.into())
    }

    pub async fn overview(
        &self,
        ctx: &RequestContext,
        user_id: i32,
    ) -> AppResult<CommissionOverviewResponse> {
        ctx.require_self_or_admin(user_id)?;

        let history = rates::Entity::find()
            .filter(rates::Column::UserId.eq(user_id))
            .order_by_desc(rates::Column::ValidFrom)
            .order_by_desc(rates::Column::Id)
            .all(&self.pool)
            .await?;
        let current_percent = resolve_percent(&self.pool, user_id, Utc::now()).await?;

        Ok(CommissionOverviewResponse {
            user_id,
            current_percent,
            history: history.into_iter().map(Into::into).collect(),
        })
    }
}
