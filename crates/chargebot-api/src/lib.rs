//! Protocol types for chargebot IPC
//!
//! This crate defines the stable API between chargebotd and clients:
//! - Commands (requests from clients, keyed by requester identity)
//! - Responses and error codes
//! - Events (daemon -> subscribed clients)
//! - Status snapshots and notice kinds

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
