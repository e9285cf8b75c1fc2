use ::proxy_message::messages::activity::ActivityLogRequest;
use ::proxy_message::messages::global::{InitializeRequest, PingReply};
use ::proxy_message::messages::workflow::{
    WorkflowExecuteReply, WorkflowExecuteRequest, WorkflowInvokeReply,
};
use ::proxy_message::types::{WorkflowExecution, WorkflowOptions};
use ::proxy_message::{
    CadenceError, ErrorKind, HasActivityContextId, HasContextId, HasError, HasRequestId, Message,
    MessageType, ProtocolError, ProxyReply, deserialize, proxy_message, registry, serialize,
};
use strum::IntoEnumIterator;

#[test]
fn every_type_round_trips_with_properties_and_attachments() {
    for ty in MessageType::iter().filter(|t| *t != MessageType::Unspecified) {
        let mut message = registry::create(ty).unwrap();
        if let Some(m) = message.as_request_id_mut() {
            m.set_request_id(i64::from(ty.code()) * 1000);
        }
        if let Some(m) = message.as_context_id_mut() {
            m.set_context_id(3);
        }
        let envelope = message.envelope_mut();
        envelope.properties.set_raw("Present", Some("value".into()));
        envelope.properties.set_raw("Empty", Some(String::new()));
        envelope.properties.set_raw("Null", None);
        envelope.attachments.push(vec![1, 2, 3]);
        envelope.attachments.push(Vec::new());

        let decoded = deserialize(&serialize(message.as_ref()).unwrap()).unwrap();
        assert_eq!(decoded.message_type(), ty);
        assert_eq!(decoded.envelope(), message.envelope(), "{ty}");
        assert_eq!(decoded.request_id(), i64::from(ty.code()) * 1000);
    }
}

#[test]
fn unknown_type_code_is_reported() {
    let mut bytes = serialize(&PingReply::new()).unwrap();
    bytes[..4].copy_from_slice(&9999i32.to_le_bytes());
    assert_eq!(deserialize(&bytes).unwrap_err(), ProtocolError::UnknownMessageType(9999));
}

#[test]
fn typed_accessors_survive_the_wire() {
    let mut request = WorkflowExecuteRequest::new();
    request.set_request_id(5);
    request.set_domain(Some("samples"));
    request.set_workflow(Some("HelloWorkflow"));
    request.set_args(Some(&b"\x00\x01payload"[..]));
    request.set_options(Some(&WorkflowOptions {
        workflow_id: Some("hello-1".into()),
        task_list: Some("default".into()),
        ..Default::default()
    }));

    let decoded = deserialize(&serialize(&request).unwrap()).unwrap();
    let decoded = decoded.downcast::<WorkflowExecuteRequest>().unwrap();
    assert_eq!(decoded.request_id(), 5);
    assert_eq!(decoded.domain().as_deref(), Some("samples"));
    assert_eq!(decoded.args(), Some(b"\x00\x01payload".to_vec()));
    assert_eq!(decoded.options().unwrap().workflow_id.as_deref(), Some("hello-1"));
}

#[test]
fn clone_is_deep_and_keeps_the_concrete_type() {
    let mut original = WorkflowInvokeReply::new();
    original.set_result(Some(&b"done"[..]));
    let mut copy = original.clone_message();
    assert!(copy.is::<WorkflowInvokeReply>());

    copy.envelope_mut().properties.set_raw("Result", None);
    copy.envelope_mut().attachments.push(vec![9]);
    assert_eq!(original.result(), Some(b"done".to_vec()));
    assert!(original.envelope().attachments.is_empty());
}

#[test]
fn copy_to_skips_capabilities_the_target_lacks() {
    let mut reply = WorkflowExecuteReply::new();
    reply.set_request_id(10);
    reply.set_context_id(4);
    reply.set_error(Some(&CadenceError::new(ErrorKind::EngineError, "boom")));
    reply.set_execution(Some(&WorkflowExecution::new("wf", "run")));

    // a plain request has only a request id
    let mut target = InitializeRequest::new();
    reply.copy_to(&mut target);
    assert_eq!(target.request_id(), 10);
    assert!(!target.envelope().properties.contains("WorkflowContextId"));
    assert!(!target.envelope().properties.contains("Error"));
    assert!(!target.envelope().properties.contains("Execution"));

    // an activity message carries neither the workflow context id nor an error
    let mut activity = ActivityLogRequest::new();
    activity.set_activity_context_id(99);
    reply.copy_to(&mut activity);
    assert_eq!(activity.request_id(), 10);
    assert_eq!(activity.activity_context_id(), 99);
    assert!(activity.as_context_id().is_none());
}

#[test]
fn downcast_hands_the_message_back_on_mismatch() {
    let mut ping = PingReply::new();
    ping.set_request_id(12);
    let boxed: Box<dyn Message> = Box::new(ping);

    let boxed = boxed.downcast::<WorkflowInvokeReply>().unwrap_err();
    assert_eq!(boxed.message_type(), MessageType::PingReply);
    assert_eq!(boxed.request_id(), 12);
    let ping = boxed.downcast::<PingReply>().unwrap();
    assert_eq!(ping.request_id(), 12);
}

proxy_message! {
    /// Carries a workflow context id and nothing else.
    pub struct ContextOnly [ContextId];
}

#[test]
fn copy_to_a_target_without_a_request_id() {
    let mut reply = WorkflowExecuteReply::new();
    reply.set_request_id(10);
    reply.set_context_id(4);
    reply.set_error(Some(&CadenceError::new(ErrorKind::EngineError, "boom")));

    let mut target = ContextOnly::new(MessageType::WorkflowSignalRequest);
    reply.copy_to(&mut target);
    assert_eq!(target.context_id(), 4);
    assert!(target.as_request_id().is_none());
    assert!(!target.envelope().properties.contains("RequestId"));
    assert!(!target.envelope().properties.contains("Error"));

    // the other way round the target keeps its own request id
    let mut request = WorkflowExecuteRequest::new();
    request.set_request_id(77);
    target.copy_to(&mut request);
    assert_eq!(request.request_id(), 77);
    assert_eq!(request.context_id(), 4);
}

#[test]
fn untyped_error_frame_decodes_as_a_generic_reply() {
    let mut reply = ProxyReply::new(MessageType::Unspecified);
    reply.set_request_id(31);
    reply.set_error(Some(&CadenceError::malformed("cannot decode")));

    let decoded = deserialize(&serialize(&reply).unwrap()).unwrap();
    assert_eq!(decoded.message_type(), MessageType::Unspecified);
    assert_eq!(decoded.request_id(), 31);
    let decoded = decoded.downcast::<ProxyReply>().unwrap();
    assert_eq!(decoded.error().unwrap().kind, ErrorKind::MalformedMessage);

    // without an error the frame names no message at all
    let bare = ProxyReply::new(MessageType::Unspecified);
    assert_eq!(
        deserialize(&serialize(&bare).unwrap()).unwrap_err(),
        ProtocolError::UnknownMessageType(0)
    );
}

#[test]
fn for_request_builds_the_matching_reply() {
    let mut request = WorkflowExecuteRequest::new();
    request.set_request_id(8);
    let reply = ProxyReply::for_request(&request).unwrap();
    assert_eq!(reply.message_type(), MessageType::WorkflowExecuteReply);
    assert_eq!(reply.request_id(), 8);
    assert!(reply.as_error().unwrap().error().is_none());
}
