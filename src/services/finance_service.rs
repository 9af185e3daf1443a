use crate::entities::{
    TransactionKind, branch_entity as branches, company_entity as companies,
    transaction_entity as ledger,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    BranchFinanceResponse, BranchTotals, CompanyFinanceResponse, LedgerTotals, Period,
    RequestContext, TherapistTotals, UserFinanceResponse,
};
use crate::services::organization::{leads_branch, leads_company};
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use std::collections::BTreeMap;

fn period_condition(period: Period) -> Condition {
    let mut cond = Condition::all();
    if let Some(from) = period.from {
        cond = cond.add(ledger::Column::CreatedAt.gte(from));
    }
    if let Some(to) = period.to {
        cond = cond.add(ledger::Column::CreatedAt.lt(to));
    }
    cond
}

fn sum_amount() -> SimpleExpr {
    Func::cast_as(Func::sum(Expr::col(ledger::Column::Amount)), Alias::new("BIGINT")).into()
}

/// Folds per-kind sums into totals and derives the balance.
pub fn fold_totals<I>(sums: I) -> LedgerTotals
where
    I: IntoIterator<Item = (TransactionKind, i64)>,
{
    let mut totals = LedgerTotals::default();
    for (kind, amount) in sums {
        match kind {
            TransactionKind::Revenue => totals.revenue += amount,
            TransactionKind::TherapistBalance => totals.therapist_balance += amount,
            TransactionKind::CashHeld => totals.cash_held += amount,
            TransactionKind::Payout => totals.payouts += amount,
        }
    }
    totals.recompute_balance()
}

/// Grouped `SUM(amount)` per kind over the rows matching `scope`.
pub async fn ledger_totals<C: ConnectionTrait>(
    conn: &C,
    scope: Condition,
    period: Period,
) -> AppResult<LedgerTotals> {
    let rows: Vec<(TransactionKind, Option<i64>)> = ledger::Entity::find()
        .select_only()
        .column(ledger::Column::Kind)
        .column_as(sum_amount(), "total")
        .filter(scope)
        .filter(period_condition(period))
        .group_by(ledger::Column::Kind)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(fold_totals(
        rows.into_iter().map(|(kind, total)| (kind, total.unwrap_or(0))),
    ))
}

/// Same sums, broken down by `key` (user or branch).
async fn ledger_totals_by<C: ConnectionTrait>(
    conn: &C,
    key: ledger::Column,
    scope: Condition,
    period: Period,
) -> AppResult<BTreeMap<i32, LedgerTotals>> {
    let rows: Vec<(Option<i32>, TransactionKind, Option<i64>)> = ledger::Entity::find()
        .select_only()
        .column(key)
        .column(ledger::Column::Kind)
        .column_as(sum_amount(), "total")
        .filter(scope)
        .filter(period_condition(period))
        .group_by(key)
        .group_by(ledger::Column::Kind)
        .into_tuple()
        .all(conn)
        .await?;

    let mut grouped: BTreeMap<i32, Vec<(TransactionKind, i64)>> = BTreeMap::new();
    for (id, kind, total) in rows {
        if let Some(id) = id {
            grouped
                .entry(id)
                .or_default()
                .push((kind, total.unwrap_or(0)));
        }
    }
    Ok(grouped
        .into_iter()
        .map(|(id, sums)| (id, fold_totals(sums)))
        .collect())
}

#[derive(Clone)]
pub struct FinanceService {
    pool: DatabaseConnection,
}

impl FinanceService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Balance of one user over all their rows, personal ones included.
    pub async fn user_summary(
        &self,
        ctx: &RequestContext,
        user_id: i32,
        period: Period,
    ) -> AppResult<UserFinanceResponse> {
        ctx.require_self_or_admin(user_id)?;
        let totals = ledger_totals(
            &self.pool,
            Condition::all().add(ledger::Column::UserId.eq(user_id)),
            period,
        )
        .await?;
        Ok(UserFinanceResponse { user_id, totals })
    }

    pub async fn branch_summary(
        &self,
        ctx: &RequestContext,
        branch_id: i32,
        period: Period,
    ) -> AppResult<BranchFinanceResponse> {
        branches::Entity::find_by_id(branch_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))?;
        if !leads_branch(&self.pool, ctx, branch_id).await? {
            return Err(AppError::PermissionDenied);
        }

        let scope = Condition::all().add(ledger::Column::BranchId.eq(branch_id));
        let totals = ledger_totals(&self.pool, scope.clone(), period).await?;
        let therapists = ledger_totals_by(&self.pool, ledger::Column::UserId, scope, period)
            .await?
            .into_iter()
            .map(|(user_id, totals)| TherapistTotals { user_id, totals })
            .collect();

        Ok(BranchFinanceResponse {
            branch_id,
            totals,
            therapists,
        })
    }

    pub async fn company_summary(
        &self,
        ctx: &RequestContext,
        company_id: i32,
        period: Period,
    ) -> AppResult<CompanyFinanceResponse> {
        companies::Entity::find_by_id(company_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
        if !leads_company(&self.pool, ctx, company_id).await? {
            return Err(AppError::PermissionDenied);
        }

        let scope = Condition::all().add(ledger::Column::CompanyId.eq(company_id));
        let totals = ledger_totals(&self.pool, scope.clone(), period).await?;
        let mut by_branch =
            ledger_totals_by(&self.pool, ledger::Column::BranchId, scope, period).await?;

        // every branch of the company is listed, quiet ones with zero totals
        let company_branches = branches::Entity::find()
            .filter(branches::Column::CompanyId.eq(company_id))
            .order_by_asc(branches::Column::Id)
            .all(&self.pool)
            .await?;
        let branches = company_branches
            .into_iter()
            .map(|b| BranchTotals {
                branch_id: b.id,
                totals: by_branch.remove(&b.id).unwrap_or_default(),
            })
            .collect();

        Ok(CompanyFinanceResponse {
            company_id,
            totals,
            branches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_totals() {
        let totals = fold_totals([
            (TransactionKind::Revenue, 1000),
            (TransactionKind::TherapistBalance, 600),
            (TransactionKind::CashHeld, 300),
            (TransactionKind::Payout, 200),
            (TransactionKind::Revenue, 500),
        ]);
        assert_eq!(totals.revenue, 1500);
        assert_eq!(totals.therapist_balance, 600);
        assert_eq!(totals.balance, 100);
    }

    #[test]
    fn test_fold_empty_is_zero() {
        assert_eq!(fold_totals(Vec::new()), LedgerTotals::default());
    }
}
