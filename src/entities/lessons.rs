use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "evaluated")]
    Evaluated,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// How the money for a lesson was collected.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Deduct from an active pass, otherwise bill the nominal price.
    #[default]
    #[sea_orm(string_value = "auto")]
    Auto,
    /// The therapist took cash and keeps it; the leader's cut becomes a debt.
    #[sea_orm(string_value = "cash_therapist")]
    CashTherapist,
    #[sea_orm(string_value = "cash_leader")]
    CashLeader,
    #[sea_orm(string_value = "cashless_leader")]
    CashlessLeader,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Auto => write!(f, "AUTO"),
            PaymentMethod::CashTherapist => write!(f, "CASH_THERAPIST"),
            PaymentMethod::CashLeader => write!(f, "CASH_LEADER"),
            PaymentMethod::CashlessLeader => write!(f, "CASHLESS_LEADER"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonPayoutStatus {
    #[sea_orm(string_value = "none")]
    NotRequested,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub therapist_id: i32,
    pub group_id: Option<i32>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: LessonStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub evaluation: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    // settlement snapshot, written once together with settled_at
    pub commission_percent_at_time: Option<i32>,
    pub revenue_at_time: Option<i64>,
    pub therapist_share_at_time: Option<i64>,
    pub leader_share_at_time: Option<i64>,
    pub settled_at: Option<DateTime<Utc>>,
    pub payout_status: LessonPayoutStatus,
    pub payout_request_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
