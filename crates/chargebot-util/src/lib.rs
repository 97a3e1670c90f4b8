//! Shared utilities for chargebot
//!
//! This crate provides:
//! - Identity types (UserId, ClientId)
//! - Time utilities (monotonic time, remaining-time formatting)
//! - The user-facing error taxonomy
//! - Rate limiting helpers
//! - Default paths for the socket and config file

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
