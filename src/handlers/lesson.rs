use crate::models::*;
use crate::services::LessonService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/lessons",
    tag = "lessons",
    request_body = ScheduleLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Lesson scheduled", body = LessonResponse),
        (status = 400, description = "Invalid time range or group"),
        (status = 403, description = "Not a therapist")
    )
)]
pub async fn schedule_lesson(
    service: web::Data<LessonService>,
    ctx: RequestContext,
    request: web::Json<ScheduleLessonRequest>,
) -> Result<HttpResponse> {
    match service.schedule_lesson(&ctx, request.into_inner()).await {
        Ok(lesson) => Ok(ApiResponse::created(lesson)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lessons",
    tag = "lessons",
    params(LessonQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lessons ordered by start time", body = [LessonResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_lessons(
    service: web::Data<LessonService>,
    ctx: RequestContext,
    query: web::Query<LessonQuery>,
) -> Result<HttpResponse> {
    match service.list_lessons(&ctx, query.into_inner()).await {
        Ok(list) => Ok(ApiResponse::ok(list)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/evaluate",
    tag = "lessons",
    params(
        ("id" = i32, Path, description = "Lesson id")
    ),
    request_body = EvaluateLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lesson evaluated and settled", body = EvaluateLessonResponse),
        (status = 400, description = "Lesson is cancelled"),
        (status = 403, description = "Not the lesson's therapist"),
        (status = 404, description = "Lesson not found")
    )
)]
/// Stores the evaluation and settles the lesson. Parents are notified by mail;
/// failed notifications are counted but do not fail the call.
pub async fn evaluate_lesson(
    service: web::Data<LessonService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    request: web::Json<EvaluateLessonRequest>,
) -> Result<HttpResponse> {
    match service
        .evaluate_lesson(&ctx, path.into_inner(), request.into_inner())
        .await
    {
        Ok(data) => Ok(ApiResponse::ok(data)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/settle",
    tag = "lessons",
    params(
        ("id" = i32, Path, description = "Lesson id")
    ),
    request_body = SettleLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Settlement outcome", body = SettlementOutcome),
        (status = 403, description = "Admin only")
    )
)]
pub async fn settle_lesson(
    service: web::Data<LessonService>,
    ctx: RequestContext,
    path: web::Path<i32>,
    request: web::Json<SettleLessonRequest>,
) -> Result<HttpResponse> {
    match service
        .settle(&ctx, path.into_inner(), request.into_inner().payment_method)
        .await
    {
        Ok(outcome) => Ok(ApiResponse::ok(outcome)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/enrollments/{id}/cancel",
    tag = "lessons",
    params(
        ("id" = i32, Path, description = "Enrollment id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Enrollment cancelled"),
        (status = 400, description = "Already cancelled"),
        (status = 404, description = "Enrollment not found")
    )
)]
pub async fn cancel_enrollment(
    service: web::Data<LessonService>,
    ctx: RequestContext,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let enrollment_id = path.into_inner();
    match service.cancel_enrollment(&ctx, enrollment_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            enrollment_id,
            "Enrollment cancelled",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn lesson_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lessons")
            .route("", web::post().to(schedule_lesson))
            .route("", web::get().to(list_lessons))
            .route("/{id}/evaluate", web::post().to(evaluate_lesson))
            .route("/{id}/settle", web::post().to(settle_lesson)),
    )
    .route("/enrollments/{id}/cancel", web::post().to(cancel_enrollment));
}
