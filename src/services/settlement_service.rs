use crate::entities::{
    EnrollmentStatus, PassStatus, PaymentMethod, TransactionKind, child_entity as children,
    enrollment_entity as enrollments, group_entity as groups, lesson_entity as lessons,
    pass_entity as passes, pass_usage_entity as usages, transaction_entity as ledger,
    user_entity as users,
};
use crate::error::AppResult;
use crate::models::{SettlementOutcome, SkipReason};
use crate::services::commission_service::resolve_percent;
use crate::services::organization::{Attribution, resolve_attribution};
use crate::services::pass_service::find_active_pass;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::json;

/// Lessons of leaders and solo practitioners are entirely their own income.
const PERSONAL_PERCENT: i32 = 100;

/// Revenue split between therapist and leader. The leader's part is the
/// remainder, so the two always add up to `revenue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShareSplit {
    pub revenue: i64,
    pub therapist_share: i64,
    pub leader_share: i64,
}

/// `value * factor / denominator` rounded half up, like `Math.round`.
/// The product is taken in i128 so large amounts cannot overflow.
fn round_div(value: i64, factor: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    let n = i128::from(value) * i128::from(factor);
    let d = i128::from(denominator);
    let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
    ((2 * n + d).div_euclid(2 * d)) as i64
}

pub fn split_revenue(revenue: i64, percent: i32) -> ShareSplit {
    let therapist_share = round_div(revenue, i64::from(percent), 100);
    ShareSplit {
        revenue,
        therapist_share,
        leader_share: revenue - therapist_share,
    }
}

pub fn price_per_lesson(total_price: i64, total_lessons: i32) -> i64 {
    if total_lessons <= 0 {
        return 0;
    }
    round_div(total_price, 1, i64::from(total_lessons))
}

/// What a therapist who kept the cash owes the organization.
pub fn cash_held_amount(nominal: i64, percent: i32) -> i64 {
    nominal - split_revenue(nominal, percent).therapist_share
}

/// Everything settlement needs to know about a lesson before writing.
struct SettlementInput {
    lesson: lessons::Model,
    therapist: users::Model,
    attribution: Attribution,
    percent: i32,
    child: Option<children::Model>,
    nominal: i64,
    now: DateTime<Utc>,
}

impl SettlementInput {
    fn meta(&self, method: PaymentMethod, pass_id: Option<i32>) -> serde_json::Value {
        let mut meta = json!({
            "personal": self.attribution.personal,
            "payment_method": method.to_string(),
        });
        if let Some(pass_id) = pass_id {
            meta["pass_id"] = json!(pass_id);
        }
        meta
    }
}

#[derive(Clone)]
pub struct SettlementService {
    pool: DatabaseConnection,
}

impl SettlementService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Turns an evaluated lesson into ledger facts, at most once.
    ///
    /// Missing data is reported as `Skipped`, a lesson that was settled before
    /// (or concurrently) as `AlreadySettled`. Only database failures are errors.
    pub async fn settle_lesson(
        &self,
        lesson_id: i32,
        payment_method: Option<PaymentMethod>,
    ) -> AppResult<SettlementOutcome> {
        let method = payment_method.unwrap_or_default();

        let Some(lesson) = lessons::Entity::find_by_id(lesson_id).one(&self.pool).await? else {
            log::warn!("Settlement skipped: lesson {lesson_id} not found");
            return Ok(SettlementOutcome::Skipped {
                lesson_id,
                reason: SkipReason::LessonNotFound,
            });
        };
        if lesson.is_settled() {
            log::debug!("Lesson {lesson_id} already settled");
            return Ok(SettlementOutcome::AlreadySettled { lesson_id });
        }
        let Some(therapist) = users::Entity::find_by_id(lesson.therapist_id)
            .one(&self.pool)
            .await?
        else {
            log::warn!(
                "Settlement skipped: therapist {} of lesson {lesson_id} not found",
                lesson.therapist_id
            );
            return Ok(SettlementOutcome::Skipped {
                lesson_id,
                reason: SkipReason::TherapistNotFound,
            });
        };

        let input = self.prepare(lesson, therapist).await?;

        if method == PaymentMethod::Auto {
            if let Some(outcome) = self.settle_auto_from_pass(&input).await? {
                return Ok(outcome);
            }
        }

        match method {
            PaymentMethod::CashTherapist => self.settle_cash_therapist(&input).await,
            _ => self.settle_nominal(&input, method).await,
        }
    }

    async fn prepare(
        &self,
        lesson: lessons::Model,
        therapist: users::Model,
    ) -> AppResult<SettlementInput> {
        let now = Utc::now();
        let lesson = self.ensure_group(lesson, &therapist, now).await?;

        let group_branch = match lesson.group_id {
            Some(group_id) => groups::Entity::find_by_id(group_id)
                .one(&self.pool)
                .await?
                .and_then(|g| g.branch_id),
            None => None,
        };
        let attribution = resolve_attribution(&self.pool, &therapist, group_branch).await?;

        let percent = if attribution.personal {
            PERSONAL_PERCENT
        } else {
            resolve_percent(&self.pool, therapist.id, now).await?
        };

        let child = self.enrolled_child(lesson.id).await?;
        let nominal = child
            .as_ref()
            .and_then(|c| c.individual_price)
            .or(therapist.lesson_price)
            .unwrap_or(0);

        Ok(SettlementInput {
            lesson,
            therapist,
            attribution,
            percent,
            child,
            nominal,
            now,
        })
    }

    /// Lessons of a therapist with a branch must belong to a group of that
    /// branch; attach the therapist's default group when none was chosen.
    async fn ensure_group(
        &self,
        mut lesson: lessons::Model,
        therapist: &users::Model,
        now: DateTime<Utc>,
    ) -> AppResult<lessons::Model> {
        let (None, Some(branch_id)) = (lesson.group_id, therapist.branch_id) else {
            return Ok(lesson);
        };

        let existing = groups::Entity::find()
            .filter(groups::Column::TherapistId.eq(therapist.id))
            .filter(groups::Column::BranchId.eq(branch_id))
            .filter(groups::Column::IsDefault.eq(true))
            .order_by_asc(groups::Column::Id)
            .one(&self.pool)
            .await?;
        let group = match existing {
            Some(group) => group,
            None => {
                log::info!(
                    "Creating default group for therapist {} in branch {branch_id}",
                    therapist.id
                );
                groups::ActiveModel {
                    name: Set(format!("{} (default)", therapist.name)),
                    therapist_id: Set(therapist.id),
                    branch_id: Set(Some(branch_id)),
                    is_default: Set(true),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?
            }
        };

        lessons::Entity::update_many()
            .set(lessons::ActiveModel {
                group_id: Set(Some(group.id)),
                ..Default::default()
            })
            .filter(lessons::Column::Id.eq(lesson.id))
            .filter(lessons::Column::GroupId.is_null())
            .exec(&self.pool)
            .await?;
        lesson.group_id = Some(group.id);
        Ok(lesson)
    }

    async fn enrolled_child(&self, lesson_id: i32) -> AppResult<Option<children::Model>> {
        let Some(enrollment) = enrollments::Entity::find()
            .filter(enrollments::Column::LessonId.eq(lesson_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Enrolled))
            .order_by_asc(enrollments::Column::Id)
            .one(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let child = children::Entity::find_by_id(enrollment.child_id)
            .one(&self.pool)
            .await?;
        Ok(child)
    }

    /// `None` means no pass applies and the lesson falls through to the
    /// nominal price.
    async fn settle_auto_from_pass(
        &self,
        input: &SettlementInput,
    ) -> AppResult<Option<SettlementOutcome>> {
        let lesson_id = input.lesson.id;

        // re-entry after the usage row was written: only finish the snapshot
        if let Some(usage) = usages::Entity::find()
            .filter(usages::Column::LessonId.eq(lesson_id))
            .one(&self.pool)
            .await?
        {
            let Some(pass) = passes::Entity::find_by_id(usage.pass_id)
                .one(&self.pool)
                .await?
            else {
                return Ok(None);
            };
            let split = split_revenue(
                price_per_lesson(pass.total_price, pass.total_lessons),
                input.percent,
            );
            let marked = mark_settled(
                &self.pool,
                lesson_id,
                PaymentMethod::Auto,
                input.percent,
                &split,
                input.now,
            )
            .await?;
            if !marked {
                return Ok(Some(SettlementOutcome::AlreadySettled { lesson_id }));
            }
            log::info!("Lesson {lesson_id} marked settled from existing usage of pass {}", pass.id);
            return Ok(Some(settled(input, PaymentMethod::Auto, split, 0, Some(pass.id), 0)));
        }

        let Some(child) = input.child.as_ref() else {
            return Ok(None);
        };
        let Some(pass) =
            find_active_pass(&self.pool, child.id, input.therapist.id, input.now).await?
        else {
            return Ok(None);
        };

        let split = split_revenue(
            price_per_lesson(pass.total_price, pass.total_lessons),
            input.percent,
        );

        let txn = self.pool.begin().await?;

        if !mark_settled(
            &txn,
            lesson_id,
            PaymentMethod::Auto,
            input.percent,
            &split,
            input.now,
        )
        .await?
        {
            txn.rollback().await?;
            log::debug!("Lesson {lesson_id} settled concurrently");
            return Ok(Some(SettlementOutcome::AlreadySettled { lesson_id }));
        }

        let decremented = passes::Entity::update_many()
            .col_expr(
                passes::Column::RemainingLessons,
                Expr::col(passes::Column::RemainingLessons).sub(1),
            )
            .filter(passes::Column::Id.eq(pass.id))
            .filter(passes::Column::Status.eq(PassStatus::Active))
            .filter(passes::Column::RemainingLessons.gt(0))
            .exec(&txn)
            .await?;
        if decremented.rows_affected == 0 {
            // exhausted between lookup and write
            txn.rollback().await?;
            log::info!("Pass {} exhausted before lesson {lesson_id} could use it", pass.id);
            return Ok(None);
        }

        usages::ActiveModel {
            pass_id: Set(pass.id),
            lesson_id: Set(lesson_id),
            created_at: Set(input.now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        passes::Entity::update_many()
            .set(passes::ActiveModel {
                status: Set(PassStatus::Cancelled),
                ..Default::default()
            })
            .filter(passes::Column::Id.eq(pass.id))
            .filter(passes::Column::RemainingLessons.lte(0))
            .exec(&txn)
            .await?;

        let meta = input.meta(PaymentMethod::Auto, Some(pass.id));
        let mut rows = 0;
        rows += append_ledger(
            &txn,
            input,
            TransactionKind::TherapistBalance,
            split.therapist_share,
            &meta,
        )
        .await?;
        rows += append_ledger(&txn, input, TransactionKind::Revenue, split.revenue, &meta).await?;

        txn.commit().await?;

        log::info!(
            "Lesson {lesson_id} settled from pass {}: revenue {}, therapist {}, leader {}",
            pass.id,
            split.revenue,
            split.therapist_share,
            split.leader_share
        );
        Ok(Some(settled(input, PaymentMethod::Auto, split, 0, Some(pass.id), rows)))
    }

    async fn settle_cash_therapist(&self, input: &SettlementInput) -> AppResult<SettlementOutcome> {
        let lesson_id = input.lesson.id;
        let method = PaymentMethod::CashTherapist;

        // a leader keeping cash keeps their own money: plain revenue
        let (split, cash_held) = if input.attribution.personal {
            (split_revenue(input.nominal, input.percent), 0)
        } else {
            (
                ShareSplit::default(),
                cash_held_amount(input.nominal, input.percent),
            )
        };

        let txn = self.pool.begin().await?;
        if !mark_settled(&txn, lesson_id, method, input.percent, &split, input.now).await? {
            txn.rollback().await?;
            return Ok(SettlementOutcome::AlreadySettled { lesson_id });
        }

        let meta = input.meta(method, None);
        let rows = if input.attribution.personal {
            append_ledger(&txn, input, TransactionKind::Revenue, split.revenue, &meta).await?
        } else {
            append_ledger(&txn, input, TransactionKind::CashHeld, cash_held, &meta).await?
        };
        txn.commit().await?;

        log::info!(
            "Lesson {lesson_id} settled as cash kept by therapist {}: cash held {cash_held}",
            input.therapist.id
        );
        Ok(settled(input, method, split, cash_held, None, rows))
    }

    async fn settle_nominal(
        &self,
        input: &SettlementInput,
        method: PaymentMethod,
    ) -> AppResult<SettlementOutcome> {
        let lesson_id = input.lesson.id;
        let split = split_revenue(input.nominal, input.percent);

        let txn = self.pool.begin().await?;
        if !mark_settled(&txn, lesson_id, method, input.percent, &split, input.now).await? {
            txn.rollback().await?;
            return Ok(SettlementOutcome::AlreadySettled { lesson_id });
        }

        let meta = input.meta(method, None);
        let mut rows = 0;
        rows += append_ledger(
            &txn,
            input,
            TransactionKind::TherapistBalance,
            split.therapist_share,
            &meta,
        )
        .await?;
        rows += append_ledger(&txn, input, TransactionKind::Revenue, split.revenue, &meta).await?;
        txn.commit().await?;

        log::info!(
            "Lesson {lesson_id} settled ({method}): revenue {}, therapist {}, leader {}",
            split.revenue,
            split.therapist_share,
            split.leader_share
        );
        Ok(settled(input, method, split, 0, None, rows))
    }
}

/// Compare-and-swap on `settled_at IS NULL`. Returns whether this call won.
async fn mark_settled<C: ConnectionTrait>(
    conn: &C,
    lesson_id: i32,
    method: PaymentMethod,
    percent: i32,
    split: &ShareSplit,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result = lessons::Entity::update_many()
        .set(lessons::ActiveModel {
            payment_method: Set(Some(method)),
            commission_percent_at_time: Set(Some(percent)),
            revenue_at_time: Set(Some(split.revenue)),
            therapist_share_at_time: Set(Some(split.therapist_share)),
            leader_share_at_time: Set(Some(split.leader_share)),
            settled_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(lessons::Column::Id.eq(lesson_id))
        .filter(lessons::Column::SettledAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Appends one ledger row; zero amounts are not recorded.
async fn append_ledger<C: ConnectionTrait>(
    conn: &C,
    input: &SettlementInput,
    kind: TransactionKind,
    amount: i64,
    meta: &serde_json::Value,
) -> Result<usize, DbErr> {
    if amount == 0 {
        return Ok(0);
    }
    ledger::ActiveModel {
        kind: Set(kind),
        amount: Set(amount),
        user_id: Set(input.therapist.id),
        branch_id: Set(input.attribution.branch_id()),
        company_id: Set(input.attribution.company_id()),
        lesson_id: Set(Some(input.lesson.id)),
        payout_request_id: Set(None),
        meta: Set(meta.clone()),
        created_at: Set(input.now),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(1)
}

fn settled(
    input: &SettlementInput,
    method: PaymentMethod,
    split: ShareSplit,
    cash_held: i64,
    pass_id: Option<i32>,
    ledger_rows: usize,
) -> SettlementOutcome {
    SettlementOutcome::Settled {
        lesson_id: input.lesson.id,
        payment_method: method,
        commission_percent: input.percent,
        revenue: split.revenue,
        therapist_share: split.therapist_share,
        leader_share: split.leader_share,
        cash_held,
        personal: input.attribution.personal,
        pass_id,
        ledger_rows,
    }
}
