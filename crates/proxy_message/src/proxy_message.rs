use std::any::Any;
use std::fmt;

use crate::error::CadenceError;
use crate::message_type::MessageType;
use crate::properties::PropertyBag;

/// The envelope every message is stored in: a type code, the property bag
/// and an ordered list of binary attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyMessage {
    message_type: MessageType,
    pub properties: PropertyBag,
    pub attachments: Vec<Vec<u8>>,
}

impl ProxyMessage {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            properties: PropertyBag::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_parts(
        message_type: MessageType,
        properties: PropertyBag,
        attachments: Vec<Vec<u8>>,
    ) -> Self {
        Self { message_type, properties, attachments }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }
}

// -----------------------------------------------------------------------------
// Capabilities
//
// A message type opts into each layer by listing it in its `proxy_message!`
// declaration. `Message` exposes them as optional views so code holding a
// `dyn Message` can ask "do you carry a request id?" without knowing the type.
// -----------------------------------------------------------------------------

/// Carried by every request and reply.
pub trait HasRequestId {
    fn request_id(&self) -> i64;
    fn set_request_id(&mut self, request_id: i64);
}

/// Carried by every reply.
pub trait HasError {
    fn error(&self) -> Option<CadenceError>;
    fn set_error(&mut self, error: Option<&CadenceError>);
}

/// Carried by workflow requests and replies.
pub trait HasContextId {
    fn context_id(&self) -> i64;
    fn set_context_id(&mut self, context_id: i64);
}

/// Carried by activity requests and replies.
pub trait HasActivityContextId {
    fn activity_context_id(&self) -> i64;
    fn set_activity_context_id(&mut self, context_id: i64);
}

pub trait Message: fmt::Debug + Send + Sync + Any {
    fn envelope(&self) -> &ProxyMessage;
    fn envelope_mut(&mut self) -> &mut ProxyMessage;

    /// Deep copy of the same concrete type.
    fn clone_message(&self) -> Box<dyn Message>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    fn message_type(&self) -> MessageType {
        self.envelope().message_type()
    }

    fn as_request_id(&self) -> Option<&dyn HasRequestId> {
        None
    }
    fn as_request_id_mut(&mut self) -> Option<&mut dyn HasRequestId> {
        None
    }
    fn as_error(&self) -> Option<&dyn HasError> {
        None
    }
    fn as_error_mut(&mut self) -> Option<&mut dyn HasError> {
        None
    }
    fn as_context_id(&self) -> Option<&dyn HasContextId> {
        None
    }
    fn as_context_id_mut(&mut self) -> Option<&mut dyn HasContextId> {
        None
    }
    fn as_activity_context_id(&self) -> Option<&dyn HasActivityContextId> {
        None
    }
    fn as_activity_context_id_mut(&mut self) -> Option<&mut dyn HasActivityContextId> {
        None
    }

    /// Copies the capability fields this message shares with `target`.
    ///
    /// Each layer is copied only when both sides carry it. Business
    /// properties are never copied.
    fn copy_to(&self, target: &mut dyn Message) {
        if let (Some(src), Some(dst)) = (self.as_request_id(), target.as_request_id_mut()) {
            dst.set_request_id(src.request_id());
        }
        if let (Some(src), Some(dst)) = (self.as_error(), target.as_error_mut()) {
            dst.set_error(src.error().as_ref());
        }
        if let (Some(src), Some(dst)) = (self.as_context_id(), target.as_context_id_mut()) {
            dst.set_context_id(src.context_id());
        }
        if let (Some(src), Some(dst)) =
            (self.as_activity_context_id(), target.as_activity_context_id_mut())
        {
            dst.set_activity_context_id(src.activity_context_id());
        }
    }
}

impl dyn Message {
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recovers the concrete message, handing the box back on mismatch.
    pub fn downcast<T: Message>(self: Box<Self>) -> Result<Box<T>, Box<dyn Message>> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.into_any().downcast::<T>() {
            Ok(message) => Ok(message),
            Err(_) => unreachable!("concrete type checked above"),
        }
    }

    /// Request id, or 0 for messages without one.
    pub fn request_id(&self) -> i64 {
        self.as_request_id().map(|m| m.request_id()).unwrap_or(0)
    }

    /// Context id, or 0 for messages outside the workflow layer.
    pub fn context_id(&self) -> i64 {
        self.as_context_id().map(|m| m.context_id()).unwrap_or(0)
    }

    /// Stamps an error on a reply. Requests have nowhere to put one and are left untouched.
    pub fn set_error(&mut self, error: &CadenceError) {
        if let Some(reply) = self.as_error_mut() {
            reply.set_error(Some(error));
        }
    }
}
