use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    EnrollmentStatus, LessonPayoutStatus, LessonStatus, PassStatus, PaymentMethod,
    PayoutRequestStatus, TransactionKind, UserRole,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::lesson::schedule_lesson,
        handlers::lesson::list_lessons,
        handlers::lesson::evaluate_lesson,
        handlers::lesson::settle_lesson,
        handlers::lesson::cancel_enrollment,
        handlers::pass::sell_pass,
        handlers::pass::list_child_passes,
        handlers::commission::set_rate,
        handlers::commission::get_rates,
        handlers::finance::my_summary,
        handlers::finance::user_summary,
        handlers::finance::branch_summary,
        handlers::finance::company_summary,
        handlers::payout::request_payout,
        handlers::payout::list_payouts,
        handlers::payout::confirm_payout,
        handlers::payout::reject_payout,
    ),
    components(
        schemas(
            UserRole,
            LessonStatus,
            PaymentMethod,
            LessonPayoutStatus,
            EnrollmentStatus,
            PassStatus,
            PayoutRequestStatus,
            TransactionKind,
            ScheduleLessonRequest,
            EvaluateLessonRequest,
            EvaluateLessonResponse,
            SettleLessonRequest,
            LessonResponse,
            SettlementOutcome,
            SkipReason,
            SellPassRequest,
            PassResponse,
            SetCommissionRateRequest,
            CommissionRateResponse,
            CommissionOverviewResponse,
            LedgerTotals,
            UserFinanceResponse,
            TherapistTotals,
            BranchFinanceResponse,
            BranchTotals,
            CompanyFinanceResponse,
            PayoutRequestResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "lessons", description = "Scheduling, evaluation and settlement"),
        (name = "passes", description = "Prepaid lesson packs"),
        (name = "commission", description = "Therapist commission rates"),
        (name = "finance", description = "Ledger aggregates"),
        (name = "payouts", description = "Payout requests"),
    ),
    info(
        title = "Logoped Backend API",
        version = "1.0.0",
        description = "Settlement and finance API for speech therapy practices"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
