use crate::entities::{PassStatus, pass_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SellPassRequest {
    pub child_id: i32,
    /// Restrict the pass to one therapist; admins may leave it open.
    pub therapist_id: Option<i32>,
    #[schema(example = 4)]
    pub total_lessons: i32,
    #[schema(example = 4000)]
    pub total_price: i64,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PassResponse {
    pub id: i32,
    pub child_id: i32,
    pub therapist_id: Option<i32>,
    pub total_lessons: i32,
    pub remaining_lessons: i32,
    pub total_price: i64,
    pub valid_until: DateTime<Utc>,
    pub status: PassStatus,
    pub created_at: DateTime<Utc>,
}

impl From<pass_entity::Model> for PassResponse {
    fn from(m: pass_entity::Model) -> Self {
        Self {
            id: m.id,
            child_id: m.child_id,
            therapist_id: m.therapist_id,
            total_lessons: m.total_lessons,
            remaining_lessons: m.remaining_lessons,
            total_price: m.total_price,
            valid_until: m.valid_until,
            status: m.status,
            created_at: m.created_at,
        }
    }
}
