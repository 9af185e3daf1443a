use crate::entities::{LessonPayoutStatus, LessonStatus, PaymentMethod, lesson_entity};
use crate::models::SettlementOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleLessonRequest {
    /// Admins schedule for a therapist; therapists always schedule for themselves.
    pub therapist_id: Option<i32>,
    pub group_id: Option<i32>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub child_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EvaluateLessonRequest {
    #[schema(example = "Worked on the [r] sound, good progress")]
    pub evaluation: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SettleLessonRequest {
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LessonQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub therapist_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    pub id: i32,
    pub therapist_id: i32,
    pub group_id: Option<i32>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: LessonStatus,
    pub evaluation: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub commission_percent_at_time: Option<i32>,
    pub revenue_at_time: Option<i64>,
    pub therapist_share_at_time: Option<i64>,
    pub leader_share_at_time: Option<i64>,
    pub settled_at: Option<DateTime<Utc>>,
    pub payout_status: LessonPayoutStatus,
}

impl From<lesson_entity::Model> for LessonResponse {
    fn from(m: lesson_entity::Model) -> Self {
        Self {
            id: m.id,
            therapist_id: m.therapist_id,
            group_id: m.group_id,
            starts_at: m.starts_at,
            ends_at: m.ends_at,
            status: m.status,
            evaluation: m.evaluation,
            payment_method: m.payment_method,
            commission_percent_at_time: m.commission_percent_at_time,
            revenue_at_time: m.revenue_at_time,
            therapist_share_at_time: m.therapist_share_at_time,
            leader_share_at_time: m.leader_share_at_time,
            settled_at: m.settled_at,
            payout_status: m.payout_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluateLessonResponse {
    pub lesson: LessonResponse,
    pub settlement: SettlementOutcome,
    /// Parents that could not be notified. Never fails the evaluation.
    pub notification_failures: usize,
}
