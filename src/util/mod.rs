//! Utility modules: retry schedule and timeouts.

pub mod retry;
pub mod timeout;
