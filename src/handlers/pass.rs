use crate::models::*;
use crate::services::PassService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/passes",
    tag = "passes",
    request_body = SellPassRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Pass sold", body = PassResponse),
        (status = 400, description = "Invalid lesson count, price or validity"),
        (status = 404, description = "Child not found")
    )
)]
pub async fn sell_pass(
    service: web::Data<PassService>,
    ctx: RequestContext,
    request: web::Json<SellPassRequest>,
) -> Result<HttpResponse> {
    match service.sell_pass(&ctx, request.into_inner()).await {
        Ok(pass) => Ok(ApiResponse::created(pass)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/children/{id}/passes",
    tag = "passes",
    params(
        ("id" = i32, Path, description = "Child id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Passes of the child, newest first", body = [PassResponse]),
        (status = 404, description = "Child not found")
    )
)]
pub async fn list_child_passes(
    service: web::Data<PassService>,
    ctx: RequestContext,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match service.list_for_child(&ctx, path.into_inner()).await {
        Ok(list) => Ok(ApiResponse::ok(list)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn pass_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/passes", web::post().to(sell_pass))
        .route("/children/{id}/passes", web::get().to(list_child_passes));
}
