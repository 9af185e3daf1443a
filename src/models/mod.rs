pub mod commission;
pub mod common;
pub mod context;
pub mod finance;
pub mod lesson;
pub mod pagination;
pub mod pass;
pub mod payout;
pub mod settlement;

pub use commission::*;
pub use common::*;
pub use context::*;
pub use finance::*;
pub use lesson::*;
pub use pagination::*;
pub use pass::*;
pub use payout::*;
pub use settlement::*;
