//! Authentication: account signup/login, JWT issuing and validation, and
//! the per-user rate limiter used by the AI endpoint.

pub mod handlers;
mod rate_limit;
mod service;

pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::{AuthService, Claims};
