use crate::entities::PaymentMethod;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Why a settlement call did nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LessonNotFound,
    TherapistNotFound,
}

/// What `settle_lesson` did. Business no-ops are outcomes, not errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled {
        lesson_id: i32,
        payment_method: PaymentMethod,
        commission_percent: i32,
        revenue: i64,
        therapist_share: i64,
        leader_share: i64,
        cash_held: i64,
        personal: bool,
        pass_id: Option<i32>,
        ledger_rows: usize,
    },
    AlreadySettled {
        lesson_id: i32,
    },
    Skipped {
        lesson_id: i32,
        reason: SkipReason,
    },
}

impl SettlementOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, SettlementOutcome::Settled { .. })
    }
}
