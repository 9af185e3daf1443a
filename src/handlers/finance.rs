use crate::models::*;
use crate::services::FinanceService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/finance/me",
    tag = "finance",
    params(Period),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Caller's ledger totals", body = UserFinanceResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_summary(
    service: web::Data<FinanceService>,
    ctx: RequestContext,
    period: web::Query<Period>,
) -> Result<HttpResponse> {
    match service
        .user_summary(&ctx, ctx.user_id, period.into_inner())
        .await
    {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/finance/users/{id}",
    tag = "finance",
    params(
        ("id" = i32, Path, description = "User id"),
        Period
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User ledger totals", body = UserFinanceResponse),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn user_summary(
    service: web::Data<FinanceService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    period: web::Query<Period>,
) -> Result<HttpResponse> {
    match service
        .user_summary(&ctx, path.into_inner(), period.into_inner())
        .await
    {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/finance/branches/{id}",
    tag = "finance",
    params(
        ("id" = i32, Path, description = "Branch id"),
        Period
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Branch totals with per-therapist breakdown", body = BranchFinanceResponse),
        (status = 403, description = "Not the branch's leader"),
        (status = 404, description = "Branch not found")
    )
)]
pub async fn branch_summary(
    service: web::Data<FinanceService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    period: web::Query<Period>,
) -> Result<HttpResponse> {
    match service
        .branch_summary(&ctx, path.into_inner(), period.into_inner())
        .await
    {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/finance/companies/{id}",
    tag = "finance",
    params(
        ("id" = i32, Path, description = "Company id"),
        Period
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Company totals with per-branch breakdown", body = CompanyFinanceResponse),
        (status = 403, description = "Not the company's owner"),
        (status = 404, description = "Company not found")
    )
)]
pub async fn company_summary(
    service: web::Data<FinanceService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    period: web::Query<Period>,
) -> Result<HttpResponse> {
    match service
        .company_summary(&ctx, path.into_inner(), period.into_inner())
        .await
    {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn finance_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/finance")
            .route("/me", web::get().to(my_summary))
            .route("/users/{id}", web::get().to(user_summary))
            .route("/branches/{id}", web::get().to(branch_summary))
            .route("/companies/{id}", web::get().to(company_summary)),
    );
}
