//! State module for per-domain bookkeeping
//!
//! - `RateLimitState`: request timing and window counters for one domain

mod domain_state;

pub use domain_state::RateLimitState;
