pub mod branches;
pub mod children;
pub mod commission_rates;
pub mod companies;
pub mod enrollments;
pub mod groups;
pub mod lessons;
pub mod pass_usages;
pub mod passes;
pub mod payout_requests;
pub mod transactions;
pub mod users;

pub use branches as branch_entity;
pub use children as child_entity;
pub use commission_rates as commission_rate_entity;
pub use companies as company_entity;
pub use enrollments as enrollment_entity;
pub use groups as group_entity;
pub use lessons as lesson_entity;
pub use pass_usages as pass_usage_entity;
pub use passes as pass_entity;
pub use payout_requests as payout_request_entity;
pub use transactions as transaction_entity;
pub use users as user_entity;

pub use enrollments::EnrollmentStatus;
pub use lessons::{LessonPayoutStatus, LessonStatus, PaymentMethod};
pub use passes::PassStatus;
pub use payout_requests::PayoutRequestStatus;
pub use transactions::TransactionKind;
pub use users::UserRole;
