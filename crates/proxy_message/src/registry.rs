//! Closed mapping from message type codes to concrete message types.

use crate::error::ProtocolError;
use crate::message_type::MessageType;
use crate::messages::{self, ProxyReply};
use crate::properties::keys;
use crate::proxy_message::{Message, ProxyMessage};

macro_rules! registry {
    ($($ty:ident => $module:ident),* $(,)?) => {
        /// Wraps a decoded envelope in the concrete type its code names.
        pub fn from_envelope(envelope: ProxyMessage) -> Result<Box<dyn Message>, ProtocolError> {
            let message: Box<dyn Message> = match envelope.message_type() {
                // only a generic error reply may go out without a type
                MessageType::Unspecified if envelope.properties.contains(keys::ERROR) => {
                    Box::new(ProxyReply::from_envelope(envelope))
                }
                MessageType::Unspecified => {
                    return Err(ProtocolError::UnknownMessageType(MessageType::Unspecified.code()));
                }
                $(
                    MessageType::$ty => Box::new(messages::$module::$ty::from_envelope(envelope)?),
                )*
            };
            Ok(message)
        }
    };
}

registry! {
    InitializeRequest => global,
    InitializeReply => global,
    ConnectRequest => global,
    ConnectReply => global,
    TerminateRequest => global,
    TerminateReply => global,
    DomainRegisterRequest => global,
    DomainRegisterReply => global,
    DomainDescribeRequest => global,
    DomainDescribeReply => global,
    DomainUpdateRequest => global,
    DomainUpdateReply => global,
    HeartbeatRequest => global,
    HeartbeatReply => global,
    CancelRequest => global,
    CancelReply => global,
    NewWorkerRequest => global,
    NewWorkerReply => global,
    StopWorkerRequest => global,
    StopWorkerReply => global,
    PingRequest => global,
    PingReply => global,
    WorkflowSetCacheSizeRequest => global,
    WorkflowSetCacheSizeReply => global,

    WorkflowRegisterRequest => workflow,
    WorkflowRegisterReply => workflow,
    WorkflowExecuteRequest => workflow,
    WorkflowExecuteReply => workflow,
    WorkflowSignalRequest => workflow,
    WorkflowSignalReply => workflow,
    WorkflowSignalWithStartRequest => workflow,
    WorkflowSignalWithStartReply => workflow,
    WorkflowCancelRequest => workflow,
    WorkflowCancelReply => workflow,
    WorkflowTerminateRequest => workflow,
    WorkflowTerminateReply => workflow,
    WorkflowGetHistoryRequest => workflow,
    WorkflowGetHistoryReply => workflow,
    WorkflowCompleteActivityRequest => workflow,
    WorkflowCompleteActivityReply => workflow,
    WorkflowCompleteActivityByIdRequest => workflow,
    WorkflowCompleteActivityByIdReply => workflow,
    WorkflowRecordActivityHeartbeatRequest => workflow,
    WorkflowRecordActivityHeartbeatReply => workflow,
    WorkflowRecordActivityHeartbeatByIdRequest => workflow,
    WorkflowRecordActivityHeartbeatByIdReply => workflow,
    WorkflowListClosedExecutionsRequest => workflow,
    WorkflowListClosedExecutionsReply => workflow,
    WorkflowListOpenExecutionsRequest => workflow,
    WorkflowListOpenExecutionsReply => workflow,
    WorkflowQueryRequest => workflow,
    WorkflowQueryReply => workflow,
    WorkflowDescribeExecutionRequest => workflow,
    WorkflowDescribeExecutionReply => workflow,
    WorkflowDescribeTaskListRequest => workflow,
    WorkflowDescribeTaskListReply => workflow,
    WorkflowInvokeRequest => workflow,
    WorkflowInvokeReply => workflow,
    WorkflowExecuteChildRequest => workflow,
    WorkflowExecuteChildReply => workflow,
    WorkflowSignalSubscribeRequest => workflow,
    WorkflowSignalSubscribeReply => workflow,
    WorkflowSignalReceivedRequest => workflow,
    WorkflowSignalReceivedReply => workflow,
    WorkflowMutableRequest => workflow,
    WorkflowMutableReply => workflow,
    WorkflowMutableInvokeRequest => workflow,
    WorkflowMutableInvokeReply => workflow,
    WorkflowCountRequest => workflow,
    WorkflowCountReply => workflow,

    ActivityInvokeRequest => activity,
    ActivityInvokeReply => activity,
    ActivityGetHeartbeatDetailsRequest => activity,
    ActivityGetHeartbeatDetailsReply => activity,
    ActivityLogRequest => activity,
    ActivityLogReply => activity,
    ActivityRecordHeartbeatRequest => activity,
    ActivityRecordHeartbeatReply => activity,
    ActivityHasHeartbeatDetailsRequest => activity,
    ActivityHasHeartbeatDetailsReply => activity,
    ActivityStopRequest => activity,
    ActivityStopReply => activity,
}

/// Creates an empty message of the given type.
pub fn create(message_type: MessageType) -> Result<Box<dyn Message>, ProtocolError> {
    from_envelope(ProxyMessage::new(message_type))
}

/// Creates an empty message from a raw wire code.
pub fn create_from_code(code: i32) -> Result<Box<dyn Message>, ProtocolError> {
    let message_type = MessageType::from_code(code).ok_or(ProtocolError::UnknownMessageType(code))?;
    create(message_type)
}

/// Allocates the reply answering `request` and copies its capability fields.
pub fn reply_for(request: &dyn Message) -> Result<Box<dyn Message>, ProtocolError> {
    let request_type = request.message_type();
    let reply_type = request_type
        .reply_type()
        .ok_or_else(|| ProtocolError::malformed(format!("{request_type} is not a request")))?;
    let mut reply = create(reply_type)?;
    request.copy_to(reply.as_mut());
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::global::{InitializeReply, PingRequest};
    use crate::messages::workflow::{WorkflowSignalReply, WorkflowSignalRequest};
    use crate::{HasContextId, HasRequestId};
    use strum::IntoEnumIterator;

    #[test]
    fn every_known_type_is_constructible() {
        for ty in MessageType::iter().filter(|t| *t != MessageType::Unspecified) {
            let message = create(ty).unwrap();
            assert_eq!(message.message_type(), ty);
        }
    }

    #[test]
    fn unspecified_and_unknown_codes_are_rejected() {
        assert_eq!(
            create(MessageType::Unspecified).unwrap_err(),
            ProtocolError::UnknownMessageType(0)
        );
        assert_eq!(create_from_code(9999).unwrap_err(), ProtocolError::UnknownMessageType(9999));
        assert_eq!(create_from_code(0).unwrap_err(), ProtocolError::UnknownMessageType(0));
    }

    #[test]
    fn untyped_envelope_with_an_error_is_a_generic_reply() {
        let mut envelope = ProxyMessage::new(MessageType::Unspecified);
        envelope.properties.set_long(keys::REQUEST_ID, 12);
        envelope
            .properties
            .set_json(keys::ERROR, Some(&crate::CadenceError::malformed("bad frame")));

        let message = from_envelope(envelope).unwrap();
        assert!(message.is::<ProxyReply>());
        assert_eq!(message.request_id(), 12);
        assert_eq!(message.as_error().unwrap().error().unwrap().message, "bad frame");
    }

    #[test]
    fn wrong_envelope_type_is_malformed() {
        let envelope = ProxyMessage::new(MessageType::PingReply);
        assert!(matches!(
            PingRequest::from_envelope(envelope),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn reply_for_copies_request_and_context_ids() {
        let mut request = WorkflowSignalRequest::new();
        request.set_request_id(41);
        request.set_context_id(7);
        request.set_signal_name(Some("go"));

        let reply = reply_for(&request).unwrap();
        let reply = reply.downcast::<WorkflowSignalReply>().unwrap();
        assert_eq!(reply.request_id(), 41);
        assert_eq!(reply.context_id(), 7);
        // business properties stay behind
        assert!(!reply.envelope().properties.contains("SignalName"));
    }

    #[test]
    fn replies_are_not_requests() {
        assert!(reply_for(&InitializeReply::new()).is_err());
    }
}
