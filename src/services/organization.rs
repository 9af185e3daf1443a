//! Organizational lookups shared by settlement, finance and payouts.

use crate::entities::{branch_entity as branches, company_entity as companies, user_entity as users};
use crate::models::RequestContext;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};

/// Where a therapist's ledger rows are attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution {
    pub branch_id: Option<i32>,
    pub company_id: Option<i32>,
    /// Leader or solo practitioner: income is never counted in org aggregates.
    pub personal: bool,
}

impl Attribution {
    pub fn branch_id(&self) -> Option<i32> {
        if self.personal { None } else { self.branch_id }
    }

    pub fn company_id(&self) -> Option<i32> {
        if self.personal { None } else { self.company_id }
    }
}

/// A therapist is a leader when they own a company or manage a branch.
pub async fn is_leader<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<bool, DbErr> {
    let owned = companies::Entity::find()
        .filter(companies::Column::OwnerId.eq(user_id))
        .count(conn)
        .await?;
    if owned > 0 {
        return Ok(true);
    }
    let managed = branches::Entity::find()
        .filter(branches::Column::ManagerId.eq(user_id))
        .count(conn)
        .await?;
    Ok(managed > 0)
}

/// Resolves attribution for a therapist, preferring an explicit branch
/// (e.g. the lesson group's) over the therapist's own.
pub async fn resolve_attribution<C: ConnectionTrait>(
    conn: &C,
    therapist: &users::Model,
    branch_id: Option<i32>,
) -> Result<Attribution, DbErr> {
    let branch_id = branch_id.or(therapist.branch_id);
    let company_id = match branch_id {
        Some(id) => branches::Entity::find_by_id(id)
            .one(conn)
            .await?
            .map(|b| b.company_id),
        None => None,
    };
    let personal = therapist.branch_id.is_none() || is_leader(conn, therapist.id).await?;

    Ok(Attribution {
        branch_id,
        company_id,
        personal,
    })
}

/// Admins lead everything; otherwise the branch manager or the owner of the
/// branch's company.
pub async fn leads_branch<C: ConnectionTrait>(
    conn: &C,
    ctx: &RequestContext,
    branch_id: i32,
) -> Result<bool, DbErr> {
    if ctx.is_admin() {
        return Ok(true);
    }
    let Some(branch) = branches::Entity::find_by_id(branch_id).one(conn).await? else {
        return Ok(false);
    };
    if branch.manager_id == Some(ctx.user_id) {
        return Ok(true);
    }
    leads_company(conn, ctx, branch.company_id).await
}

pub async fn leads_company<C: ConnectionTrait>(
    conn: &C,
    ctx: &RequestContext,
    company_id: i32,
) -> Result<bool, DbErr> {
    if ctx.is_admin() {
        return Ok(true);
    }
    let company = companies::Entity::find_by_id(company_id).one(conn).await?;
    Ok(company.is_some_and(|c| c.owner_id == ctx.user_id))
}
