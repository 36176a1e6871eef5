//! Shared utilities for the ledger gateway.

pub mod log_limiter;
pub mod time;

pub use log_limiter::LogLimiter;
pub use time::format_duration;
