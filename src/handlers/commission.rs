use crate::models::*;
use crate::services::CommissionService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    put,
    path = "/commission-rates/{user_id}",
    tag = "commission",
    params(
        ("user_id" = i32, Path, description = "Therapist id")
    ),
    request_body = SetCommissionRateRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "New rate opened, previous one closed", body = CommissionRateResponse),
        (status = 400, description = "Percent out of range"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn set_rate(
    service: web::Data<CommissionService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    request: web::Json<SetCommissionRateRequest>,
) -> Result<HttpResponse> {
    match service
        .set_rate(&ctx, path.into_inner(), request.percent)
        .await
    {
        Ok(rate) => Ok(ApiResponse::ok(rate)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/commission-rates/{user_id}",
    tag = "commission",
    params(
        ("user_id" = i32, Path, description = "Therapist id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Rate history and current percent", body = CommissionOverviewResponse),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_rates(
    service: web::Data<CommissionService>,
    ctx: RequestContext,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match service.overview(&ctx, path.into_inner()).await {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn commission_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/commission-rates")
            .route("/{user_id}", web::put().to(set_rate))
            .route("/{user_id}", web::get().to(get_rates)),
    );
}
