use proxy_message::{CadenceError, ErrorKind, MessageType, ProtocolError};
use thiserror::Error;

/// Engine type name used for lookups that found nothing.
pub const ENTITY_NOT_EXISTS: &str = "EntityNotExistsError";
pub const BAD_REQUEST: &str = "BadRequestError";
pub const UNSUPPORTED: &str = "UnsupportedError";
pub const TIMEOUT: &str = "TimeoutError";

/// An error raised by the orchestration engine.
///
/// `Clone` so it can travel through shared completion handles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct EngineError {
    /// Engine-specific error type name.
    pub kind: String,
    pub message: String,
    pub stack: Option<String>,
    pub transient: bool,
}

impl EngineError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack: None,
            transient: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ENTITY_NOT_EXISTS, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(BAD_REQUEST, message)
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::new(UNSUPPORTED, format!("{operation} is not supported by this engine"))
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ENTITY_NOT_EXISTS
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TIMEOUT
    }
}

impl From<CadenceError> for EngineError {
    fn from(err: CadenceError) -> Self {
        EngineError {
            kind: err.engine_kind.unwrap_or_else(|| err.kind.to_string()),
            message: err.message,
            stack: err.stack,
            transient: err.transient,
        }
    }
}

/// Proxy to library calls surface to the engine as engine errors.
impl From<ProxyError> for EngineError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Timeout(_) => EngineError::new(TIMEOUT, err.to_string()).transient(),
            other => EngineError::from(other.to_cadence_error()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("workflow context {0} does not exist")]
    ContextNotFound(i64),
    #[error("activity context {0} does not exist")]
    ActivityContextNotFound(i64),
    #[error("{0}")]
    EntityNotExists(String),
    #[error("no pending request with id {0}")]
    Unroutable(i64),
    #[error("request {0} timed out")]
    Timeout(i64),
    #[error("request {0} was cancelled")]
    Cancelled(i64),
    #[error("{0} cannot be sent to the proxy")]
    WrongDirection(MessageType),
    #[error("{0} is reserved and not implemented")]
    Reserved(MessageType),
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The library answered a proxy request with an error.
    #[error("library error: {0}")]
    Library(CadenceError),
    #[error("transport closed")]
    TransportClosed,
}

impl ProxyError {
    /// The payload carried in a reply's `Error` property.
    pub fn to_cadence_error(&self) -> CadenceError {
        let message = self.to_string();
        match self {
            ProxyError::Protocol(err) => CadenceError::from(err.clone()),
            ProxyError::ContextNotFound(_)
            | ProxyError::ActivityContextNotFound(_)
            | ProxyError::EntityNotExists(_) => {
                CadenceError::new(ErrorKind::EntityNotExists, message)
            }
            ProxyError::Unroutable(_) | ProxyError::TransportClosed => {
                CadenceError::new(ErrorKind::Unroutable, message)
            }
            ProxyError::Timeout(_) => CadenceError::new(ErrorKind::Timeout, message),
            ProxyError::Cancelled(_) => CadenceError::new(ErrorKind::Cancelled, message),
            ProxyError::WrongDirection(_) | ProxyError::Reserved(_) => {
                CadenceError::new(ErrorKind::MalformedMessage, message)
            }
            ProxyError::Engine(err) => {
                let kind = if err.is_not_found() {
                    ErrorKind::EntityNotExists
                } else {
                    ErrorKind::EngineError
                };
                let mut out = CadenceError::new(kind, err.message.clone())
                    .with_engine_kind(err.kind.clone())
                    .transient(err.transient);
                if let Some(stack) = &err.stack {
                    out = out.with_stack(stack.clone());
                }
                out
            }
            ProxyError::Library(err) => err.clone(),
        }
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
