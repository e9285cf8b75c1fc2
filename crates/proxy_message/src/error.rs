use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Failures raised while decoding or constructing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message type code {0}")]
    UnknownMessageType(i32),
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ProtocolError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::Malformed(msg.into())
    }
}

/// Error categories carried inside a reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display, Serialize, Deserialize,
)]
pub enum ErrorKind {
    UnknownMessageType,
    MalformedMessage,
    EntityNotExists,
    Unroutable,
    Timeout,
    Cancelled,
    EngineError,
}

/// The error payload embedded in any reply under the `Error` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CadenceError {
    pub kind: ErrorKind,
    pub message: String,
    /// Engine-specific error type name, e.g. `EntityNotExistsError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_kind: Option<String>,
    /// Stack captured where the error originated, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub transient: bool,
}

impl CadenceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            engine_kind: None,
            stack: None,
            // timeouts are always worth retrying
            transient: kind == ErrorKind::Timeout,
        }
    }

    pub fn with_engine_kind(mut self, engine_kind: impl Into<String>) -> Self {
        self.engine_kind = Some(engine_kind.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn entity_not_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EntityNotExists, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedMessage, message)
    }
}

impl std::fmt::Display for CadenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.engine_kind {
            Some(engine_kind) => write!(f, "{} ({}): {}", self.kind, engine_kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for CadenceError {}

impl From<ProtocolError> for CadenceError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownMessageType(_) => {
                CadenceError::new(ErrorKind::UnknownMessageType, err.to_string())
            }
            ProtocolError::Malformed(_) => {
                CadenceError::new(ErrorKind::MalformedMessage, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient_by_default() {
        assert!(CadenceError::new(ErrorKind::Timeout, "late").transient);
        assert!(!CadenceError::new(ErrorKind::Cancelled, "stop").transient);
    }

    #[test]
    fn json_shape_uses_pascal_case() {
        let err = CadenceError::new(ErrorKind::EngineError, "boom")
            .with_engine_kind("BadRequestError");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["Kind"], "EngineError");
        assert_eq!(json["EngineKind"], "BadRequestError");
        assert!(json.get("Stack").is_none());
        let back: CadenceError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
