//! End-to-end scenarios driving the dispatcher the way the client library
//! would: encoded frames in, encoded frames out.

use std::sync::Arc;
use std::time::Duration;

use cadence_proxy::engine::{InMemoryEngine, WorkflowEngine};
use cadence_proxy::{ProxyDispatcher, ProxyError};
use proxy_message::messages::activity::*;
use proxy_message::messages::global::*;
use proxy_message::messages::workflow::*;
use proxy_message::types::{DomainInfo, ExecutionStatus, WorkflowExecution, WorkflowOptions};
use proxy_message::{
    CadenceError, ErrorKind, HasActivityContextId, HasContextId, HasError, HasRequestId, Message,
    MessageType, ProxyReply, codec,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const DOMAIN: &str = "samples";

/// Plays the client library against a dispatcher.
struct Library {
    proxy: ProxyDispatcher,
    engine: InMemoryEngine,
    inbox: mpsc::UnboundedReceiver<Vec<u8>>,
    next_request_id: i64,
}

impl Library {
    async fn connect() -> Self {
        Self::connect_with(Duration::from_secs(5)).await
    }

    async fn connect_with(request_timeout: Duration) -> Self {
        let engine = InMemoryEngine::new();
        let (proxy, inbox) = ProxyDispatcher::new(Arc::new(engine.clone()), request_timeout);
        engine
            .register_domain(DomainInfo {
                name: DOMAIN.into(),
                ..Default::default()
            })
            .await
            .unwrap();
        Self {
            proxy,
            engine,
            inbox,
            next_request_id: 0,
        }
    }

    /// Sends a request with a fresh request id and decodes the reply.
    async fn send<Rep: Message>(&mut self, mut request: impl Message + HasRequestId) -> Box<Rep> {
        self.next_request_id += 1;
        request.set_request_id(self.next_request_id);
        let frame = codec::serialize(&request).unwrap();
        let frame = timeout(Duration::from_secs(2), self.proxy.dispatch(&frame))
            .await
            .expect("proxy did not answer in time")
            .expect("proxy produced no reply");
        let reply = codec::deserialize(&frame).unwrap();
        assert_eq!(reply.request_id(), self.next_request_id, "request id must be echoed");
        reply.downcast::<Rep>().unwrap()
    }

    /// Next request the proxy sent to the library.
    async fn receive<Req: Message>(&mut self) -> Box<Req> {
        let frame = timeout(Duration::from_secs(2), self.inbox.recv())
            .await
            .expect("proxy sent nothing")
            .unwrap();
        codec::deserialize(&frame).unwrap().downcast::<Req>().unwrap()
    }

    /// Answers a proxy request; replies never produce a frame in return.
    async fn answer(&self, reply: &dyn Message) {
        let frame = codec::serialize(reply).unwrap();
        assert!(self.proxy.dispatch(&frame).await.is_none());
    }

    async fn execute(&mut self, workflow: &str) -> Box<WorkflowExecuteReply> {
        self.execute_with(workflow, None).await
    }

    async fn execute_with(
        &mut self,
        workflow: &str,
        execution_timeout_ms: Option<u64>,
    ) -> Box<WorkflowExecuteReply> {
        let mut request = WorkflowExecuteRequest::new();
        request.set_domain(Some(DOMAIN));
        request.set_workflow(Some(workflow));
        request.set_args(Some(&b"args"[..]));
        request.set_options(Some(&WorkflowOptions {
            task_list: Some("main".into()),
            execution_timeout_ms,
            ..Default::default()
        }));
        self.send(request).await
    }

    async fn status(&mut self, execution: &WorkflowExecution) -> ExecutionStatus {
        let mut describe = WorkflowDescribeExecutionRequest::new();
        describe.set_domain(Some(DOMAIN));
        describe.set_workflow_id(Some(&execution.workflow_id));
        describe.set_run_id(Some(&execution.run_id));
        let described: Box<WorkflowDescribeExecutionReply> = self.send(describe).await;
        described.details().unwrap().info.status
    }

    async fn new_worker(&mut self, is_workflow: bool) {
        let mut request = NewWorkerRequest::new();
        request.set_domain(Some(DOMAIN));
        request.set_task_list(Some("main"));
        request.set_is_workflow(is_workflow);
        let reply: Box<NewWorkerReply> = self.send(request).await;
        assert!(reply.error().is_none());
        assert!(reply.worker_id() > 0);
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn execute_allocates_the_first_context() {
    let mut library = Library::connect().await;
    let reply = library.execute("Greeter").await;

    assert!(reply.error().is_none());
    assert_eq!(reply.context_id(), 1);
    let execution = reply.execution().unwrap();
    assert!(!execution.workflow_id.is_empty());
    let context = library.proxy.workflows().get(1).unwrap();
    assert_eq!(context.execution, execution);
    assert_eq!(context.domain, DOMAIN);

    // addressing the run through its context id
    let mut signal = WorkflowSignalRequest::new();
    signal.set_context_id(1);
    signal.set_signal_name(Some("wake"));
    let reply: Box<WorkflowSignalReply> = library.send(signal).await;
    assert!(reply.error().is_none());
    assert_eq!(reply.context_id(), 1);
}

#[tokio::test]
async fn signal_to_unknown_context_is_entity_not_exists() {
    let mut library = Library::connect().await;
    let mut signal = WorkflowSignalRequest::new();
    signal.set_context_id(99);
    signal.set_signal_name(Some("wake"));
    let reply: Box<WorkflowSignalReply> = library.send(signal).await;

    let error = reply.error().unwrap();
    assert_eq!(error.kind, ErrorKind::EntityNotExists);
    assert_eq!(reply.context_id(), 99);
}

#[tokio::test]
async fn signal_by_workflow_id_without_context() {
    let mut library = Library::connect().await;
    let execution = library.execute("Greeter").await.execution().unwrap();

    let mut signal = WorkflowSignalRequest::new();
    signal.set_domain(Some(DOMAIN));
    signal.set_workflow_id(Some(&execution.workflow_id));
    signal.set_signal_name(Some("wake"));
    let reply: Box<WorkflowSignalReply> = library.send(signal).await;
    assert!(reply.error().is_none());

    let mut missing = WorkflowSignalRequest::new();
    missing.set_domain(Some(DOMAIN));
    missing.set_workflow_id(Some("no-such-workflow"));
    let reply: Box<WorkflowSignalReply> = library.send(missing).await;
    let error = reply.error().unwrap();
    assert_eq!(error.kind, ErrorKind::EntityNotExists);
    assert_eq!(error.engine_kind.as_deref(), Some("EntityNotExistsError"));
}

#[tokio::test]
async fn workflow_runs_on_the_library_and_duplicate_replies_are_dropped() {
    let mut library = Library::connect().await;
    library.new_worker(true).await;
    let executed = library.execute("Greeter").await;
    let client_context = executed.context_id();
    let execution = executed.execution().unwrap();

    let invoke: Box<WorkflowInvokeRequest> = library.receive().await;
    assert_eq!(invoke.name().as_deref(), Some("Greeter"));
    assert_eq!(invoke.args(), Some(b"args".to_vec()));
    assert_eq!(invoke.workflow_id(), Some(execution.workflow_id.clone()));
    assert_ne!(invoke.context_id(), client_context);

    let mut reply = WorkflowInvokeReply::new();
    reply.set_request_id(invoke.request_id());
    reply.set_context_id(invoke.context_id());
    reply.set_result(Some(&b"hello"[..]));
    library.answer(&reply).await;
    // the same reply again has nobody waiting for it
    library.answer(&reply).await;
    assert_eq!(library.proxy.correlator().pending_count(), 0);

    let proxy = library.proxy.clone();
    eventually(|| proxy.workflows().get(client_context).is_none()).await;

    let mut describe = WorkflowDescribeExecutionRequest::new();
    describe.set_domain(Some(DOMAIN));
    describe.set_workflow_id(Some(&execution.workflow_id));
    describe.set_run_id(Some(&execution.run_id));
    let described: Box<WorkflowDescribeExecutionReply> = library.send(describe).await;
    assert_eq!(described.details().unwrap().info.status, ExecutionStatus::Completed);

    let mut history = WorkflowGetHistoryRequest::new();
    history.set_domain(Some(DOMAIN));
    history.set_workflow_id(Some(&execution.workflow_id));
    let history: Box<WorkflowGetHistoryReply> = library.send(history).await;
    assert!(history.history().unwrap().len() >= 2);
}

#[tokio::test]
async fn subscribed_signals_reach_the_running_invocation() {
    let mut library = Library::connect().await;
    library.new_worker(true).await;
    let executed = library.execute("Waiter").await;
    let invoke: Box<WorkflowInvokeRequest> = library.receive().await;
    let invocation_context = invoke.context_id();

    // signal first, subscribe afterwards: the signal is buffered
    let mut signal = WorkflowSignalRequest::new();
    signal.set_context_id(executed.context_id());
    signal.set_signal_name(Some("approve"));
    signal.set_signal_args(Some(&b"yes"[..]));
    let reply: Box<WorkflowSignalReply> = library.send(signal).await;
    assert!(reply.error().is_none());

    let mut subscribe = WorkflowSignalSubscribeRequest::new();
    subscribe.set_context_id(invocation_context);
    subscribe.set_signal_name(Some("approve"));
    let reply: Box<WorkflowSignalSubscribeReply> = library.send(subscribe).await;
    assert!(reply.error().is_none());

    let received: Box<WorkflowSignalReceivedRequest> = library.receive().await;
    assert_eq!(received.context_id(), invocation_context);
    assert_eq!(received.signal_name().as_deref(), Some("approve"));
    assert_eq!(received.signal_args(), Some(b"yes".to_vec()));
    let mut ack = WorkflowSignalReceivedReply::new();
    ack.set_request_id(received.request_id());
    library.answer(&ack).await;

    // side effects are recorded once per id
    let mut mutable = WorkflowMutableRequest::new();
    mutable.set_context_id(invocation_context);
    mutable.set_mutable_id(Some("coin"));
    mutable.set_result(Some(&b"heads"[..]));
    let first: Box<WorkflowMutableReply> = library.send(mutable.clone()).await;
    mutable.set_result(Some(&b"tails"[..]));
    let second: Box<WorkflowMutableReply> = library.send(mutable).await;
    assert_eq!(first.result(), Some(b"heads".to_vec()));
    assert_eq!(second.result(), Some(b"heads".to_vec()));

    let mut done = WorkflowInvokeReply::new();
    done.set_request_id(invoke.request_id());
    library.answer(&done).await;
}

#[tokio::test]
async fn unknown_message_type_gets_an_error_reply() {
    let library = Library::connect().await;
    let mut ping = PingRequest::new();
    ping.set_request_id(31);
    let mut frame = codec::serialize(&ping).unwrap();
    frame[..4].copy_from_slice(&999i32.to_le_bytes());

    let reply = library.proxy.dispatch(&frame).await.unwrap();
    let reply = codec::deserialize(&reply).unwrap();
    assert_eq!(reply.message_type(), MessageType::Unspecified);
    let reply = reply.downcast::<ProxyReply>().unwrap();
    assert_eq!(reply.request_id(), 31);
    assert_eq!(reply.error().unwrap().kind, ErrorKind::UnknownMessageType);
}

#[tokio::test]
async fn generic_error_reply_from_the_library_fails_the_pending_call() {
    let mut library = Library::connect().await;
    library.new_worker(true).await;
    let executed = library.execute("Greeter").await;
    let execution = executed.execution().unwrap();
    let invoke: Box<WorkflowInvokeRequest> = library.receive().await;

    // the library could not make sense of the invoke and answers untyped
    let mut reply = ProxyReply::new(MessageType::Unspecified);
    reply.set_request_id(invoke.request_id());
    reply.set_error(Some(&CadenceError::new(ErrorKind::UnknownMessageType, "what is this")));
    library.answer(&reply).await;
    assert_eq!(library.proxy.correlator().pending_count(), 0);

    timeout(Duration::from_secs(2), async {
        while library.status(&execution).await != ExecutionStatus::Failed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("run never failed");
}

#[tokio::test]
async fn workflow_invocation_may_outlive_the_request_timeout() {
    let mut library = Library::connect_with(Duration::from_millis(100)).await;
    library.new_worker(true).await;
    let executed = library.execute_with("Slow", Some(3_600_000)).await;
    let execution = executed.execution().unwrap();
    let invoke: Box<WorkflowInvokeRequest> = library.receive().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(library.proxy.correlator().pending_count(), 1);
    let mut done = WorkflowInvokeReply::new();
    done.set_request_id(invoke.request_id());
    done.set_result(Some(&b"late but fine"[..]));
    library.answer(&done).await;

    timeout(Duration::from_secs(2), async {
        while library.status(&execution).await != ExecutionStatus::Completed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("run never completed");
}

#[tokio::test]
async fn unanswered_invocation_times_out_with_the_execution_timeout() {
    let mut library = Library::connect_with(Duration::from_secs(30)).await;
    library.new_worker(true).await;
    let executed = library.execute_with("Stuck", Some(100)).await;
    let execution = executed.execution().unwrap();
    let _invoke: Box<WorkflowInvokeRequest> = library.receive().await;

    timeout(Duration::from_secs(2), async {
        while library.status(&execution).await != ExecutionStatus::TimedOut {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("run never timed out");
    assert_eq!(library.proxy.correlator().pending_count(), 0);
}

#[tokio::test]
async fn heartbeat_is_answered_inline() {
    let mut library = Library::connect().await;
    let sent_at = chrono::Utc::now();
    let mut heartbeat = HeartbeatRequest::new();
    heartbeat.set_sent_at(Some(sent_at));
    let reply: Box<HeartbeatReply> = library.send(heartbeat).await;
    assert_eq!(reply.sent_at(), Some(sent_at));
    assert!(reply.replied_at().unwrap() >= sent_at);
}

#[tokio::test]
async fn library_can_cancel_a_proxy_request() {
    let mut library = Library::connect().await;
    let proxy = library.proxy.clone();
    let call = tokio::spawn(async move { proxy.ping_library().await });
    let ping: Box<PingRequest> = library.receive().await;

    let mut cancel = CancelRequest::new();
    cancel.set_target_request_id(ping.request_id());
    let reply: Box<CancelReply> = library.send(cancel.clone()).await;
    assert!(reply.was_cancelled());
    assert!(matches!(call.await.unwrap(), Err(ProxyError::Cancelled(_))));

    let again: Box<CancelReply> = library.send(cancel).await;
    assert!(!again.was_cancelled());
}

#[tokio::test]
async fn proxy_only_messages_are_refused() {
    let mut library = Library::connect().await;
    let reply: Box<WorkflowInvokeReply> = library.send(WorkflowInvokeRequest::new()).await;
    assert_eq!(reply.error().unwrap().kind, ErrorKind::MalformedMessage);

    let reply: Box<ActivityInvokeReply> = library.send(ActivityInvokeRequest::new()).await;
    assert_eq!(reply.error().unwrap().kind, ErrorKind::MalformedMessage);
}

#[tokio::test]
async fn describe_task_list_is_reserved() {
    let mut library = Library::connect().await;
    let reply: Box<WorkflowDescribeTaskListReply> =
        library.send(WorkflowDescribeTaskListRequest::new()).await;
    let error = reply.error().unwrap();
    assert_eq!(error.kind, ErrorKind::MalformedMessage);
    assert!(error.message.contains("reserved"));
}

#[tokio::test]
async fn activity_runs_on_the_library() {
    let mut library = Library::connect().await;
    library.new_worker(false).await;
    let execution = library.execute("Orders").await.execution().unwrap();

    let engine = library.engine.clone();
    let target = execution.clone();
    let activity = tokio::spawn(async move {
        engine
            .execute_activity(&target, "main", "Charge", Some(b"$5".to_vec()))
            .await
    });

    let invoke: Box<ActivityInvokeRequest> = library.receive().await;
    let context_id = invoke.activity_context_id();
    assert_eq!(invoke.activity().as_deref(), Some("Charge"));
    assert_eq!(invoke.args(), Some(b"$5".to_vec()));
    assert_eq!(invoke.workflow_id(), Some(execution.workflow_id.clone()));

    let mut has_details = ActivityHasHeartbeatDetailsRequest::new();
    has_details.set_activity_context_id(context_id);
    let reply: Box<ActivityHasHeartbeatDetailsReply> = library.send(has_details).await;
    assert!(!reply.has_details());

    let mut heartbeat = ActivityRecordHeartbeatRequest::new();
    heartbeat.set_activity_context_id(context_id);
    heartbeat.set_details(Some(&b"half"[..]));
    let reply: Box<ActivityRecordHeartbeatReply> = library.send(heartbeat).await;
    assert!(reply.error().is_none());

    let mut log = ActivityLogRequest::new();
    log.set_activity_context_id(context_id);
    log.set_log_level(Some("info"));
    log.set_log_message(Some("charging"));
    let reply: Box<ActivityLogReply> = library.send(log).await;
    assert!(reply.error().is_none());

    let mut done = ActivityInvokeReply::new();
    done.set_request_id(invoke.request_id());
    done.set_activity_context_id(context_id);
    done.set_result(Some(&b"charged"[..]));
    library.answer(&done).await;
    let result = timeout(Duration::from_secs(2), activity).await.unwrap().unwrap();
    assert_eq!(result.unwrap(), Some(b"charged".to_vec()));

    // the context went away with the invocation
    let mut details = ActivityGetHeartbeatDetailsRequest::new();
    details.set_activity_context_id(context_id);
    let reply: Box<ActivityGetHeartbeatDetailsReply> = library.send(details).await;
    assert_eq!(reply.error().unwrap().kind, ErrorKind::EntityNotExists);
}

#[tokio::test]
async fn pending_activity_is_completed_by_id() {
    let mut library = Library::connect().await;
    library.new_worker(false).await;
    let execution = library.execute("Orders").await.execution().unwrap();

    let engine = library.engine.clone();
    let target = execution.clone();
    let activity =
        tokio::spawn(async move { engine.execute_activity(&target, "main", "Ship", None).await });

    let invoke: Box<ActivityInvokeRequest> = library.receive().await;
    let mut pending = ActivityInvokeReply::new();
    pending.set_request_id(invoke.request_id());
    pending.set_pending(true);
    library.answer(&pending).await;

    let mut complete = WorkflowCompleteActivityByIdRequest::new();
    complete.set_domain(Some(DOMAIN));
    complete.set_workflow_id(invoke.workflow_id().as_deref());
    complete.set_run_id(invoke.run_id().as_deref());
    complete.set_activity_id(invoke.activity_id().as_deref());
    complete.set_result(Some(&b"shipped"[..]));
    let reply: Box<WorkflowCompleteActivityByIdReply> = library.send(complete).await;
    assert!(reply.error().is_none());

    let result = timeout(Duration::from_secs(2), activity).await.unwrap().unwrap();
    assert_eq!(result.unwrap(), Some(b"shipped".to_vec()));
}

#[tokio::test]
async fn domains_and_listing() {
    let mut library = Library::connect().await;

    let mut register = DomainRegisterRequest::new();
    register.set_name(Some("billing"));
    register.set_retention_days(7);
    let reply: Box<DomainRegisterReply> = library.send(register.clone()).await;
    assert!(reply.error().is_none());
    let duplicate: Box<DomainRegisterReply> = library.send(register).await;
    assert_eq!(
        duplicate.error().unwrap().engine_kind.as_deref(),
        Some("DomainAlreadyExistsError")
    );

    let mut describe = DomainDescribeRequest::new();
    describe.set_name(Some("billing"));
    let described: Box<DomainDescribeReply> = library.send(describe).await;
    assert_eq!(described.domain_info().unwrap().retention_days, 7);

    let first = library.execute("Greeter").await.execution().unwrap();
    let second = library.execute("Greeter").await.execution().unwrap();
    let mut terminate = WorkflowTerminateRequest::new();
    terminate.set_domain(Some(DOMAIN));
    terminate.set_workflow_id(Some(&second.workflow_id));
    terminate.set_reason(Some("test"));
    let reply: Box<WorkflowTerminateReply> = library.send(terminate).await;
    assert!(reply.error().is_none());

    let mut open = WorkflowListOpenExecutionsRequest::new();
    open.set_domain(Some(DOMAIN));
    let open: Box<WorkflowListOpenExecutionsReply> = library.send(open).await;
    let open: Vec<WorkflowExecution> =
        open.executions().unwrap().into_iter().map(|i| i.execution).collect();
    assert_eq!(open, vec![first]);

    let mut count = WorkflowCountRequest::new();
    count.set_domain(Some(DOMAIN));
    count.set_query(Some("ExecutionStatus = 'Terminated'"));
    let count: Box<WorkflowCountReply> = library.send(count).await;
    assert_eq!(count.count(), 1);
}

#[tokio::test]
async fn terminate_request_triggers_shutdown() {
    let mut library = Library::connect().await;
    let mut shutdown = library.proxy.subscribe_shutdown();
    assert!(!*shutdown.borrow());

    let reply: Box<TerminateReply> = library.send(TerminateRequest::new()).await;
    assert!(reply.error().is_none());
    timeout(Duration::from_secs(1), shutdown.wait_for(|stop| *stop))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(MessageType::TerminateReply, reply.message_type());
}
