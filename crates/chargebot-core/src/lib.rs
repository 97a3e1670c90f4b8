//! Charger arbitration core for chargebot
//!
//! This crate holds everything that decides who may use the charger:
//! - Cancellable one-shot timers
//! - The FIFO waitlist
//! - The session state machine (Grace -> Charging -> ended)
//! - The session manager that serializes every operation behind one lock
//! - The notifier seam notices leave through

mod manager;
mod notifier;
mod session;
mod timer;
mod waitlist;

pub use manager::*;
pub use notifier::*;
pub use session::*;
pub use timer::*;
pub use waitlist::*;
