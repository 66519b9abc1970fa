//! Rate Limiting Module
//!
//! Throttles calls to the upstream map APIs.
//!
//! # Limiters
//! - geocode: reverse-geocoding requests
//! - staticmap: static-map image requests

mod limiter;

pub use limiter::{RateLimitStatus, RateLimiter, LOCKOUT_DURATION};
