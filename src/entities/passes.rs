use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassStatus {
    #[sea_orm(string_value = "active")]
    Active,
    /// Exhausted: every lesson of the pack was consumed.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "passes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub child_id: i32,
    /// When set, only lessons of this therapist may consume the pass.
    pub therapist_id: Option<i32>,
    pub total_lessons: i32,
    pub remaining_lessons: i32,
    pub total_price: i64,
    pub valid_until: DateTime<Utc>,
    pub status: PassStatus,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_usable(&self, at: DateTime<Utc>) -> bool {
        self.status == PassStatus::Active && self.remaining_lessons > 0 && self.valid_until >= at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
