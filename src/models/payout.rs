use crate::entities::{PayoutRequestStatus, payout_request_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayoutQuery {
    pub status: Option<PayoutRequestStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayoutRequestResponse {
    pub id: i32,
    pub user_id: i32,
    pub balance_snapshot: i64,
    pub cash_held_snapshot: i64,
    pub amount: i64,
    pub status: PayoutRequestStatus,
    pub processed_by: Option<i32>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Settled lessons covered by this request.
    pub lesson_count: u64,
}

impl PayoutRequestResponse {
    pub fn from_model(m: payout_request_entity::Model, lesson_count: u64) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            balance_snapshot: m.balance_snapshot,
            cash_held_snapshot: m.cash_held_snapshot,
            amount: m.amount,
            status: m.status,
            processed_by: m.processed_by,
            processed_at: m.processed_at,
            created_at: m.created_at,
            lesson_count,
        }
    }
}
