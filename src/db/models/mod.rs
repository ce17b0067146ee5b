//! Database models split into domain-specific modules.

pub mod booking;
pub mod catalog;
pub mod rate_limit;
pub mod review;
pub mod user;

pub use booking::*;
pub use catalog::*;
pub use rate_limit::*;
pub use review::*;
pub use user::*;
