use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    #[sea_orm(string_value = "revenue")]
    Revenue,
    #[sea_orm(string_value = "therapist_balance")]
    TherapistBalance,
    #[sea_orm(string_value = "cash_held")]
    CashHeld,
    #[sea_orm(string_value = "payout")]
    Payout,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Revenue => write!(f, "REVENUE"),
            TransactionKind::TherapistBalance => write!(f, "THERAPIST_BALANCE"),
            TransactionKind::CashHeld => write!(f, "CASH_HELD"),
            TransactionKind::Payout => write!(f, "PAYOUT"),
        }
    }
}

/// Ledger row. Never updated or deleted; balances are sums over these.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: TransactionKind,
    pub amount: i64,
    pub user_id: i32,
    pub branch_id: Option<i32>,
    pub company_id: Option<i32>,
    pub lesson_id: Option<i32>,
    pub payout_request_id: Option<i32>,
    pub meta: Json,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_personal(&self) -> bool {
        self.meta
            .get("personal")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
