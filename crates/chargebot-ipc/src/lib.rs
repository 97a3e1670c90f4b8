//! Unix-socket transport between chargebotd and its clients
//!
//! One JSON document per line in both directions. Clients send `Request`s and
//! receive a `Response` for each; clients that subscribe also receive `Event`
//! lines for every notice and state change.

mod client;
mod server;

pub use client::*;
pub use server::*;

use chargebot_api::ErrorInfo;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("unreadable message: {0}")]
    InvalidMessage(String),

    #[error("server not ready: {0}")]
    ServerError(String),

    /// The daemon understood the command and said no
    #[error("{}", .0.message)]
    Refused(ErrorInfo),
}

pub type IpcResult<T> = Result<T, IpcError>;
