//! Command types for the chargebot protocol

use chargebot_util::{ChargeError, ClientId, UserId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{StatusSnapshot, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ChargeError> for ErrorInfo {
    fn from(err: &ChargeError) -> Self {
        let code = match err {
            ChargeError::AlreadyHolder(_) => ErrorCode::AlreadyHolder,
            ChargeError::ResourceBusy { .. } => ErrorCode::ResourceBusy,
            ChargeError::AlreadyQueued { .. } => ErrorCode::AlreadyQueued,
            ChargeError::NotHolder(_) => ErrorCode::NotHolder,
            ChargeError::NotQueued(_) => ErrorCode::NotQueued,
            ChargeError::InvalidIdentity(_) => ErrorCode::InvalidIdentity,
        };
        Self::new(code, err.to_string())
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AlreadyHolder,
    ResourceBusy,
    AlreadyQueued,
    NotHolder,
    NotQueued,
    InvalidIdentity,
    InvalidRequest,
    RateLimited,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Take the charger if it is free
    CheckIn { user_id: UserId },

    /// Take the charger if free, otherwise join the queue
    Request { user_id: UserId },

    /// Release the charger before the session runs out
    EndEarly { user_id: UserId },

    /// Leave the queue
    LeaveQueue { user_id: UserId },

    /// Get the current charger status
    Status,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Requester the command is issued for, if any
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Command::CheckIn { user_id }
            | Command::Request { user_id }
            | Command::EndEarly { user_id }
            | Command::LeaveQueue { user_id } => Some(user_id),
            _ => None,
        }
    }
}

/// Request id used when a line is rejected before its id could be read
pub const UNPARSED_REQUEST_ID: u64 = 0;

/// Parse one NDJSON line into a [`Request`].
///
/// On failure returns the error response to send back, correlated by the
/// line's `request_id` when that much could be read. A malformed identity is
/// reported as `invalid_identity`, anything else as `invalid_request`.
pub fn decode_request(line: &str) -> Result<Request, Response> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        Response::error(
            UNPARSED_REQUEST_ID,
            ErrorInfo::new(ErrorCode::InvalidRequest, format!("Invalid JSON: {}", e)),
        )
    })?;

    let request_id = value
        .get("request_id")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(UNPARSED_REQUEST_ID);

    serde_json::from_value::<Request>(value.clone()).map_err(|e| {
        let identity_error = value
            .get("command")
            .and_then(|c| c.get("user_id"))
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| UserId::parse(raw).err());

        let info = match identity_error {
            Some(err) => ErrorInfo::from(&err),
            None => ErrorInfo::new(ErrorCode::InvalidRequest, format!("Invalid request: {}", e)),
        };
        Response::error(request_id, info)
    })
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Caller now holds the charger, in its plug-in window
    CheckedIn { grace_ends_at: DateTime<Local> },
    /// Caller joined the queue
    Queued { position: usize },
    /// Caller released the charger; `promoted` took over
    Ended { promoted: Option<UserId> },
    LeftQueue,
    Status(StatusSnapshot),
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(crate::HealthStatus),
    Pong,
}
