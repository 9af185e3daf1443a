use crate::entities::{
    LessonPayoutStatus, PayoutRequestStatus, TransactionKind, UserRole,
    lesson_entity as lessons, payout_request_entity as payouts, transaction_entity as ledger,
    user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::SharedNotifier;
use crate::models::{
    PaginatedResponse, PaginationParams, PayoutQuery, PayoutRequestResponse, Period,
    RequestContext,
};
use crate::services::finance_service::ledger_totals;
use crate::services::organization::{leads_branch, resolve_attribution};
use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use std::collections::HashMap;

#[derive(Clone)]
pub struct PayoutService {
    pool: DatabaseConnection,
    notifier: SharedNotifier,
}

impl PayoutService {
    pub fn new(pool: DatabaseConnection, notifier: SharedNotifier) -> Self {
        Self { pool, notifier }
    }

    /// Requests the whole current balance. Settled lessons not yet covered by
    /// a payout are attached to the request.
    pub async fn request_payout(&self, ctx: &RequestContext) -> AppResult<PayoutRequestResponse> {
        if !ctx.is_therapist() {
            return Err(AppError::PermissionDenied);
        }
        let user_id = ctx.user_id;
        let now = Utc::now();

        let txn = self.pool.begin().await?;

        // serializes concurrent requests of the same user
        if users::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .is_none()
        {
            txn.rollback().await?;
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let pending = payouts::Entity::find()
            .filter(payouts::Column::UserId.eq(user_id))
            .filter(payouts::Column::Status.eq(PayoutRequestStatus::Pending))
            .count(&txn)
            .await?;
        if pending > 0 {
            txn.rollback().await?;
            return Err(AppError::ValidationError(
                "A payout request is already pending".to_string(),
            ));
        }

        let totals = ledger_totals(
            &txn,
            Condition::all().add(ledger::Column::UserId.eq(user_id)),
            Period::default(),
        )
        .await?;
        if totals.balance <= 0 {
            txn.rollback().await?;
            return Err(AppError::ValidationError(
                "Nothing to pay out: balance is not positive".to_string(),
            ));
        }

        let request = payouts::ActiveModel {
            user_id: Set(user_id),
            balance_snapshot: Set(totals.balance),
            cash_held_snapshot: Set(totals.cash_held),
            amount: Set(totals.balance),
            status: Set(PayoutRequestStatus::Pending),
            processed_by: Set(None),
            processed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let linked = lessons::Entity::update_many()
            .set(lessons::ActiveModel {
                payout_status: Set(LessonPayoutStatus::Pending),
                payout_request_id: Set(Some(request.id)),
                ..Default::default()
            })
            .filter(lessons::Column::TherapistId.eq(user_id))
            .filter(lessons::Column::SettledAt.is_not_null())
            .filter(lessons::Column::PayoutStatus.eq(LessonPayoutStatus::NotRequested))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        log::info!(
            "Payout request {} by user {user_id}: amount {}, {} lessons",
            request.id,
            request.amount,
            linked.rows_affected
        );
        Ok(PayoutRequestResponse::from_model(request, linked.rows_affected))
    }

    pub async fn confirm_payout(
        &self,
        ctx: &RequestContext,
        request_id: i32,
    ) -> AppResult<PayoutRequestResponse> {
        let request = self.find_processable(ctx, request_id).await?;
        let now = Utc::now();

        let txn = self.pool.begin().await?;
        if !transition(&txn, request.id, PayoutRequestStatus::Approved, ctx.user_id).await? {
            txn.rollback().await?;
            return Err(not_pending());
        }

        // same attribution as the requester's settlement rows
        let requester = users::Entity::find_by_id(request.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Requester not found".to_string()))?;
        let attribution = resolve_attribution(&txn, &requester, None).await?;

        ledger::ActiveModel {
            kind: Set(TransactionKind::Payout),
            amount: Set(request.amount),
            user_id: Set(request.user_id),
            branch_id: Set(attribution.branch_id()),
            company_id: Set(attribution.company_id()),
            lesson_id: Set(None),
            payout_request_id: Set(Some(request.id)),
            meta: Set(json!({
                "processed_by": ctx.user_id,
                "personal": attribution.personal,
            })),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let paid = lessons::Entity::update_many()
            .set(lessons::ActiveModel {
                payout_status: Set(LessonPayoutStatus::Paid),
                ..Default::default()
            })
            .filter(lessons::Column::PayoutRequestId.eq(request.id))
            .exec(&txn)
            .await?;

        let updated = payouts::Entity::find_by_id(request.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Payout request not found".to_string()))?;
        txn.commit().await?;

        log::info!(
            "Payout request {} approved by {}: {} paid",
            request.id,
            ctx.user_id,
            request.amount
        );
        self.notify_requester(
            request.user_id,
            "Payout approved",
            &format!("Your payout of {} has been approved.", request.amount),
        )
        .await;

        Ok(PayoutRequestResponse::from_model(updated, paid.rows_affected))
    }

    pub async fn reject_payout(
        &self,
        ctx: &RequestContext,
        request_id: i32,
    ) -> AppResult<PayoutRequestResponse> {
        let request = self.find_processable(ctx, request_id).await?;

        let txn = self.pool.begin().await?;
        if !transition(&txn, request.id, PayoutRequestStatus::Rejected, ctx.user_id).await? {
            txn.rollback().await?;
            return Err(not_pending());
        }

        // released lessons can be requested again
        lessons::Entity::update_many()
            .set(lessons::ActiveModel {
                payout_status: Set(LessonPayoutStatus::NotRequested),
                payout_request_id: Set(None),
                ..Default::default()
            })
            .filter(lessons::Column::PayoutRequestId.eq(request.id))
            .exec(&txn)
            .await?;

        let updated = payouts::Entity::find_by_id(request.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Payout request not found".to_string()))?;
        txn.commit().await?;

        log::info!("Payout request {} rejected by {}", request.id, ctx.user_id);
        self.notify_requester(
            request.user_id,
            "Payout rejected",
            &format!("Your payout request of {} was rejected.", request.amount),
        )
        .await;

        Ok(PayoutRequestResponse::from_model(updated, 0))
    }

    pub async fn list_requests(
        &self,
        ctx: &RequestContext,
        query: PayoutQuery,
    ) -> AppResult<PaginatedResponse<PayoutRequestResponse>> {
        let mut select = payouts::Entity::find();
        if !ctx.is_admin() {
            select = select.filter(payouts::Column::UserId.eq(ctx.user_id));
        }
        if let Some(status) = query.status {
            select = select.filter(payouts::Column::Status.eq(status));
        }

        let params = PaginationParams::new(query.page, query.per_page);
        let paginator = select
            .order_by_desc(payouts::Column::CreatedAt)
            .order_by_desc(payouts::Column::Id)
            .paginate(&self.pool, u64::from(params.get_per_page()));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.get_page_index()).await?;

        let counts = lesson_counts(&self.pool, models.iter().map(|m| m.id).collect()).await?;
        let data = models
            .into_iter()
            .map(|model| {
                let lesson_count = counts.get(&model.id).copied().unwrap_or(0);
                PayoutRequestResponse::from_model(model, lesson_count)
            })
            .collect();

        Ok(PaginatedResponse::new(data, &params, total))
    }

    /// Loads a pending request the caller may decide on: admins always, else
    /// the leader of the requester's branch.
    async fn find_processable(
        &self,
        ctx: &RequestContext,
        request_id: i32,
    ) -> AppResult<payouts::Model> {
        let request = payouts::Entity::find_by_id(request_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payout request not found".to_string()))?;

        if !ctx.is_admin() {
            if ctx.role != UserRole::Therapist || ctx.user_id == request.user_id {
                return Err(AppError::PermissionDenied);
            }
            let requester = users::Entity::find_by_id(request.user_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Requester not found".to_string()))?;
            let allowed = match requester.branch_id {
                Some(branch_id) => leads_branch(&self.pool, ctx, branch_id).await?,
                None => false,
            };
            if !allowed {
                return Err(AppError::PermissionDenied);
            }
        }

        if request.status != PayoutRequestStatus::Pending {
            return Err(not_pending());
        }
        Ok(request)
    }

    async fn notify_requester(&self, user_id: i32, subject: &str, body: &str) {
        let user = match users::Entity::find_by_id(user_id).one(&self.pool).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Could not load user {user_id} for notification: {e}");
                return;
            }
        };
        if let Err(e) = self.notifier.send(&user.email, subject, body).await {
            log::warn!("Failed to notify user {user_id} about payout: {e}");
        }
    }
}

fn not_pending() -> AppError {
    AppError::ValidationError("Payout request is not pending".to_string())
}

/// Lessons linked to each of the given requests, in one grouped query.
async fn lesson_counts<C: ConnectionTrait>(
    conn: &C,
    request_ids: Vec<i32>,
) -> AppResult<HashMap<i32, u64>> {
    if request_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Option<i32>, i64)> = lessons::Entity::find()
        .select_only()
        .column(lessons::Column::PayoutRequestId)
        .column_as(
            SimpleExpr::from(Func::cast_as(
                Func::count(Expr::col(lessons::Column::Id)),
                Alias::new("BIGINT"),
            )),
            "lesson_count",
        )
        .filter(lessons::Column::PayoutRequestId.is_in(request_ids))
        .group_by(lessons::Column::PayoutRequestId)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count.max(0) as u64)))
        .collect())
}

/// `pending -> to`, guarded on the current status. Returns whether it applied.
async fn transition<C: ConnectionTrait>(
    conn: &C,
    request_id: i32,
    to: PayoutRequestStatus,
    processed_by: i32,
) -> AppResult<bool> {
    let result = payouts::Entity::update_many()
        .set(payouts::ActiveModel {
            status: Set(to),
            processed_by: Set(Some(processed_by)),
            processed_at: Set(Some(Utc::now())),
            ..Default::default()
        })
        .filter(payouts::Column::Id.eq(request_id))
        .filter(payouts::Column::Status.eq(PayoutRequestStatus::Pending))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}
