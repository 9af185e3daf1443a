pub mod commission;
pub mod finance;
pub mod health;
pub mod lesson;
pub mod pass;
pub mod payout;

pub use commission::commission_config;
pub use finance::finance_config;
pub use health::health_config;
pub use lesson::lesson_config;
pub use pass::pass_config;
pub use payout::payout_config;
