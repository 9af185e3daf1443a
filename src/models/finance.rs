use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// `[from, to)` filter on ledger `created_at`; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Period {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct LedgerTotals {
    pub revenue: i64,
    pub therapist_balance: i64,
    pub cash_held: i64,
    pub payouts: i64,
    /// therapist_balance - cash_held - payouts
    pub balance: i64,
}

impl LedgerTotals {
    pub fn recompute_balance(mut self) -> Self {
        self.balance = self.therapist_balance - self.cash_held - self.payouts;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserFinanceResponse {
    pub user_id: i32,
    pub totals: LedgerTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TherapistTotals {
    pub user_id: i32,
    pub totals: LedgerTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchFinanceResponse {
    pub branch_id: i32,
    pub totals: LedgerTotals,
    pub therapists: Vec<TherapistTotals>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchTotals {
    pub branch_id: i32,
    pub totals: LedgerTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyFinanceResponse {
    pub company_id: i32,
    pub totals: LedgerTotals,
    pub branches: Vec<BranchTotals>,
}
