use crate::entities::commission_rate_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetCommissionRateRequest {
    #[schema(example = 60)]
    pub percent: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommissionRateResponse {
    pub id: i32,
    pub user_id: i32,
    pub percent: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl From<commission_rate_entity::Model> for CommissionRateResponse {
    fn from(m: commission_rate_entity::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            percent: m.percent,
            valid_from: m.valid_from,
            valid_to: m.valid_to,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommissionOverviewResponse {
    pub user_id: i32,
    /// Percent applied to a lesson settled right now, default included.
    pub current_percent: i32,
    pub history: Vec<CommissionRateResponse>,
}
