#[macro_use]
mod macros;

pub mod codec;
pub mod error;
pub mod message_type;
pub mod messages;
pub mod properties;
pub mod proxy_message;
pub mod registry;
pub mod types;

pub use codec::{deserialize, peek_request_id, serialize};
pub use error::{CadenceError, ErrorKind, ProtocolError};
pub use message_type::{Direction, MessageType};
pub use messages::ProxyReply;
pub use properties::{PropertyBag, keys};
pub use proxy_message::{
    HasActivityContextId, HasContextId, HasError, HasRequestId, Message, ProxyMessage,
};
