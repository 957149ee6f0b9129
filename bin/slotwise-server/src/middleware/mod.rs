//! HTTP middleware stack.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod trace;

pub use auth::AuthUser;
pub use rate_limit::RateLimiter;
