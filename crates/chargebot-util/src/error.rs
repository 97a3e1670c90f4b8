//! Error types for chargebot

use thiserror::Error;

use crate::UserId;

/// Expected, recoverable outcomes of a charger command.
///
/// None of these abort processing; the transport turns each one into a reply
/// for the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChargeError {
    #[error("{0} already holds the charger")]
    AlreadyHolder(UserId),

    #[error("the charger is in use by {holder}; join the queue instead")]
    ResourceBusy { holder: UserId },

    #[error("{user_id} is already queued at position {position}")]
    AlreadyQueued { user_id: UserId, position: usize },

    #[error("{0} is not currently charging")]
    NotHolder(UserId),

    #[error("{0} is not in the queue")]
    NotQueued(UserId),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

impl ChargeError {
    pub fn invalid_identity(msg: impl Into<String>) -> Self {
        Self::InvalidIdentity(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ChargeError>;
