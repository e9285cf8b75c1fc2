pub mod activity;
pub mod global;
pub mod workflow;

proxy_message! {
    /// Any reply. Its message type is picked at construction, so it can
    /// stand in for the reply to a request whose type is unknown.
    pub struct ProxyReply [RequestId, Error];
}

impl ProxyReply {
    /// Builds the reply answering `request`, with its capability fields
    /// copied over.
    pub fn for_request(
        request: &dyn crate::Message,
    ) -> Result<Box<dyn crate::Message>, crate::ProtocolError> {
        crate::registry::reply_for(request)
    }
}
