pub mod commission_service;
pub mod finance_service;
pub mod lesson_service;
pub mod organization;
pub mod pass_service;
pub mod payout_service;
pub mod settlement_service;

pub use commission_service::CommissionService;
pub use finance_service::FinanceService;
pub use lesson_service::LessonService;
pub use pass_service::PassService;
pub use payout_service::PayoutService;
pub use settlement_service::SettlementService;
