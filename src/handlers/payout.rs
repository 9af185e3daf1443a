use crate::models::*;
use crate::services::PayoutService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/payouts",
    tag = "payouts",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Payout requested for the whole balance", body = PayoutRequestResponse),
        (status = 400, description = "Pending request exists or balance is not positive"),
        (status = 403, description = "Therapists only")
    )
)]
pub async fn request_payout(
    service: web::Data<PayoutService>,
    ctx: RequestContext,
) -> Result<HttpResponse> {
    match service.request_payout(&ctx).await {
        Ok(data) => Ok(ApiResponse::created(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/payouts",
    tag = "payouts",
    params(PayoutQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payout requests, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_payouts(
    service: web::Data<PayoutService>,
    ctx: RequestContext,
    query: web::Query<PayoutQuery>,
) -> Result<HttpResponse> {
    match service.list_requests(&ctx, query.into_inner()).await {
        Ok(page) => Ok(ApiResponse::ok(page)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/payouts/{id}/confirm",
    tag = "payouts",
    params(
        ("id" = i32, Path, description = "Payout request id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payout approved and booked", body = PayoutRequestResponse),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Not the requester's leader")
    )
)]
pub async fn confirm_payout(
    service: web::Data<PayoutService>,
    ctx: RequestContext,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match service.confirm_payout(&ctx, path.into_inner()).await {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/payouts/{id}/reject",
    tag = "payouts",
    params(
        ("id" = i32, Path, description = "Payout request id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payout rejected, lessons released", body = PayoutRequestResponse),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Not the requester's leader")
    )
)]
pub async fn reject_payout(
    service: web::Data<PayoutService>,
    ctx: RequestContext,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match service.reject_payout(&ctx, path.into_inner()).await {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn payout_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payouts")
            .route("", web::post().to(request_payout))
            .route("", web::get().to(list_payouts))
            .route("/{id}/confirm", web::post().to(confirm_payout))
            .route("/{id}/reject", web::post().to(reject_payout)),
    );
}
