//! Strongly-typed identifiers for chargebot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ChargeError;

/// Maximum accepted length of a requester identity
pub const MAX_USER_ID_LEN: usize = 64;

/// Identity of a requester (for example a chat user ID).
///
/// Always non-empty and free of whitespace and control characters; the only
/// way to build one is through [`UserId::parse`], so the core never sees a
/// malformed identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(id: impl Into<String>) -> Result<Self, ChargeError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ChargeError::invalid_identity("identity is empty"));
        }
        if id.len() > MAX_USER_ID_LEN {
            return Err(ChargeError::invalid_identity(format!(
                "identity is longer than {} bytes",
                MAX_USER_ID_LEN
            )));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ChargeError::invalid_identity(format!(
                "identity {:?} contains whitespace or control characters",
                id
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ChargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = ChargeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_equality() {
        let a1 = UserId::parse("U123").unwrap();
        let a2 = UserId::parse("U123").unwrap();
        let b = UserId::parse("U456").unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn user_id_rejects_malformed() {
        assert!(matches!(UserId::parse(""), Err(ChargeError::InvalidIdentity(_))));
        assert!(matches!(UserId::parse("two words"), Err(ChargeError::InvalidIdentity(_))));
        assert!(matches!(UserId::parse("tab\tid"), Err(ChargeError::InvalidIdentity(_))));
        assert!(matches!(
            UserId::parse("x".repeat(MAX_USER_ID_LEN + 1)),
            Err(ChargeError::InvalidIdentity(_))
        ));
        assert!(UserId::parse("x".repeat(MAX_USER_ID_LEN)).is_ok());
    }

    #[test]
    fn user_id_deserialize_validates() {
        let parsed: UserId = serde_json::from_str("\"U123\"").unwrap();
        assert_eq!(parsed.as_str(), "U123");

        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
        assert!(serde_json::from_str::<UserId>("\"a b\"").is_err());
    }

    #[test]
    fn client_id_uniqueness() {
        assert_ne!(ClientId::new(), ClientId::new());
    }
}
