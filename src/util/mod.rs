//! Shared utilities

pub mod ids;
pub mod rate_limit;
pub mod time;
