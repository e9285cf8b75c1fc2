//! Routes decoded messages to their handlers and runs the proxy to library
//! legs of workflow and activity execution.

mod activity;
mod global;
mod workflow;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use proxy_message::messages::activity::*;
use proxy_message::messages::global::*;
use proxy_message::messages::workflow::*;
use proxy_message::types::WorkflowExecution;
use proxy_message::{
    CadenceError, Direction, HasActivityContextId, HasContextId, HasError, HasRequestId, Message,
    MessageType, ProtocolError, ProxyReply, codec,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::contexts::{
    ActivityContext, ActivityContexts, CompletionHandle, WorkflowContexts, WorkflowExecutionContext,
};
use crate::correlator::Correlator;
use crate::engine::{
    ActivityInvocation, ActivityOutcome, EngineResult, WorkerHost, WorkflowEngine,
    WorkflowInvocation, WorkflowOutcome,
};
use crate::error::{EngineError, ProxyError, ProxyResult};
use crate::logger::ProxyMetrics;

/// Routes `$message` to the handler registered for its type. Request types
/// and handler results share the concrete message names.
macro_rules! routes {
    ($self:ident, $message:ident; $($ty:ident => $handler:ident),* $(,)?) => {
        match $message.message_type() {
            $(
                MessageType::$ty => {
                    let request = downcast::<$ty>($message)?;
                    let reply: Box<dyn Message> = Box::new($self.$handler(&request).await?);
                    Ok(reply)
                }
            )*
            other => Err(ProxyError::Reserved(other)),
        }
    };
}

struct Inner {
    engine: Arc<dyn WorkflowEngine>,
    workflows: WorkflowContexts,
    /// run id → context of the invocation running it on the library
    invocations: DashMap<String, i64>,
    activities: ActivityContexts,
    correlator: Correlator,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    request_timeout: Duration,
    metrics: ProxyMetrics,
    /// `host:port` the library announced in its initialize request.
    library: watch::Sender<Option<String>>,
    shutdown: watch::Sender<bool>,
}

/// The proxy's single entry point for inbound frames.
///
/// Cheap to clone; every clone shares the same contexts and correlator.
#[derive(Clone)]
pub struct ProxyDispatcher {
    inner: Arc<Inner>,
}

impl ProxyDispatcher {
    /// Creates a dispatcher and the queue of frames it wants written to the
    /// library.
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        request_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            inner: Arc::new(Inner {
                engine,
                workflows: WorkflowContexts::new(),
                invocations: DashMap::new(),
                activities: ActivityContexts::new(),
                correlator: Correlator::new(),
                outbound,
                request_timeout,
                metrics: ProxyMetrics::new(),
                library: watch::Sender::new(None),
                shutdown: watch::Sender::new(false),
            }),
        };
        (dispatcher, outbound_rx)
    }

    pub fn workflows(&self) -> &WorkflowContexts {
        &self.inner.workflows
    }

    pub fn activities(&self) -> &ActivityContexts {
        &self.inner.activities
    }

    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    pub fn engine(&self) -> &Arc<dyn WorkflowEngine> {
        &self.inner.engine
    }

    /// Queue used to push frames to the library.
    pub fn outbound(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.inner.outbound.clone()
    }

    pub fn library_address(&self) -> Option<String> {
        self.inner.library.borrow().clone()
    }

    /// Flips to `true` once the library asks the proxy to terminate.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Handles one inbound frame.
    ///
    /// Returns the encoded reply for a request. Replies to proxy requests are
    /// handed to the correlator and produce nothing, as do frames that cannot
    /// be decoded far enough to find a request id.
    pub async fn dispatch(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let message = match codec::deserialize(frame) {
            Ok(message) => message,
            Err(err) => return undecodable_reply(frame, err),
        };

        let message_type = message.message_type();
        // a generic error reply answers a request whose type did not decode
        if message_type.is_reply() || message_type == MessageType::Unspecified {
            let request_id = message.request_id();
            if let Err(err) = self.inner.correlator.resolve(request_id, message) {
                warn!(%message_type, request_id, %err, "dropping reply");
            }
            return None;
        }

        let request_id = message.request_id();
        let mut reply = match ProxyReply::for_request(message.as_ref()) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%message_type, request_id, %err, "cannot build a reply");
                return None;
            }
        };

        let metrics = self.inner.metrics.clone();
        let outcome = metrics
            .instrument(message_type.as_ref(), || self.handle(message))
            .await;
        match outcome {
            Ok(handled) => reply = handled,
            Err(err) => {
                debug!(%message_type, request_id, %err, "replying with error");
                reply.set_error(&err.to_cadence_error());
            }
        }
        match codec::serialize(reply.as_ref()) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(%message_type, request_id, %err, "reply does not fit on the wire");
                let mut fallback = ProxyReply::new(reply.message_type());
                fallback.set_request_id(request_id);
                fallback.set_error(Some(&CadenceError::from(err)));
                codec::serialize(&fallback).ok()
            }
        }
    }

    async fn handle(&self, message: Box<dyn Message>) -> ProxyResult<Box<dyn Message>> {
        let message_type = message.message_type();
        if message_type.direction() == Some(Direction::ProxyToLibrary) {
            return Err(ProxyError::WrongDirection(message_type));
        }

        routes!(self, message;
            InitializeRequest => initialize,
            ConnectRequest => connect,
            TerminateRequest => terminate,
            DomainRegisterRequest => domain_register,
            DomainDescribeRequest => domain_describe,
            DomainUpdateRequest => domain_update,
            HeartbeatRequest => heartbeat,
            CancelRequest => cancel,
            NewWorkerRequest => new_worker,
            StopWorkerRequest => stop_worker,
            PingRequest => ping,
            WorkflowSetCacheSizeRequest => set_cache_size,

            WorkflowRegisterRequest => workflow_register,
            WorkflowExecuteRequest => workflow_execute,
            WorkflowSignalRequest => workflow_signal,
            WorkflowSignalWithStartRequest => workflow_signal_with_start,
            WorkflowCancelRequest => workflow_cancel,
            WorkflowTerminateRequest => workflow_terminate,
            WorkflowGetHistoryRequest => workflow_get_history,
            WorkflowCompleteActivityRequest => workflow_complete_activity,
            WorkflowCompleteActivityByIdRequest => workflow_complete_activity_by_id,
            WorkflowRecordActivityHeartbeatRequest => workflow_record_activity_heartbeat,
            WorkflowRecordActivityHeartbeatByIdRequest => workflow_record_activity_heartbeat_by_id,
            WorkflowListClosedExecutionsRequest => workflow_list_closed,
            WorkflowListOpenExecutionsRequest => workflow_list_open,
            WorkflowQueryRequest => workflow_query,
            WorkflowDescribeExecutionRequest => workflow_describe_execution,
            WorkflowDescribeTaskListRequest => workflow_describe_task_list,
            WorkflowExecuteChildRequest => workflow_execute_child,
            WorkflowSignalSubscribeRequest => workflow_signal_subscribe,
            WorkflowMutableRequest => workflow_mutable,
            WorkflowCountRequest => workflow_count,

            ActivityGetHeartbeatDetailsRequest => activity_get_heartbeat_details,
            ActivityHasHeartbeatDetailsRequest => activity_has_heartbeat_details,
            ActivityRecordHeartbeatRequest => activity_record_heartbeat,
            ActivityLogRequest => activity_log,
            ActivityStopRequest => activity_stop,
        )
    }

    /// Sends a request to the library and waits for its reply, giving up
    /// after the configured request timeout.
    ///
    /// The request id is allocated here. An `Error` on the reply comes back as
    /// [`ProxyError::Library`].
    pub async fn call<Req, Rep>(&self, request: Req) -> ProxyResult<Box<Rep>>
    where
        Req: Message + HasRequestId,
        Rep: Message,
    {
        let deadline = Instant::now() + self.inner.request_timeout;
        self.call_with_deadline(request, Some(deadline)).await
    }

    /// Like [`call`](Self::call), but waits until `deadline`, or for as long
    /// as it takes when there is none.
    pub async fn call_with_deadline<Req, Rep>(
        &self,
        mut request: Req,
        deadline: Option<Instant>,
    ) -> ProxyResult<Box<Rep>>
    where
        Req: Message + HasRequestId,
        Rep: Message,
    {
        let correlator = &self.inner.correlator;
        let request_id = correlator.next_request_id();
        request.set_request_id(request_id);
        let frame = codec::serialize(&request)?;
        let waiter = correlator.register(request_id, deadline);
        self.inner
            .outbound
            .send(frame)
            .map_err(|_| ProxyError::TransportClosed)?;

        let reply = waiter.wait().await?;
        if let Some(err) = reply.as_error().and_then(|r| r.error()) {
            return Err(ProxyError::Library(err));
        }
        reply.downcast::<Rep>().map_err(|other| {
            ProtocolError::malformed(format!(
                "request {request_id} was answered with {}",
                other.message_type()
            ))
            .into()
        })
    }

    /// Checks that the library is alive.
    pub async fn ping_library(&self) -> ProxyResult<()> {
        self.call::<_, PingReply>(PingRequest::new()).await.map(|_| ())
    }

    /// Looks up a workflow context, failing with `ContextNotFound`.
    fn workflow_context(&self, context_id: i64) -> ProxyResult<Arc<WorkflowExecutionContext>> {
        self.inner
            .workflows
            .get(context_id)
            .ok_or(ProxyError::ContextNotFound(context_id))
    }

    fn activity_context(&self, context_id: i64) -> ProxyResult<Arc<ActivityContext>> {
        self.inner
            .activities
            .get(context_id)
            .ok_or(ProxyError::ActivityContextNotFound(context_id))
    }

    /// Resolves the execution a workflow request targets.
    ///
    /// A non-zero context id wins. Otherwise the request's `WorkflowId` and
    /// `RunId` name the execution; the domain comes from the context when
    /// there is one and from `domain` otherwise.
    fn target_execution(
        &self,
        context_id: i64,
        workflow_id: Option<String>,
        run_id: Option<String>,
        domain: Option<String>,
    ) -> ProxyResult<(WorkflowExecution, String)> {
        if context_id != 0 {
            let context = self.workflow_context(context_id)?;
            return Ok((context.execution.clone(), context.domain.clone()));
        }
        match workflow_id.filter(|id| !id.is_empty()) {
            Some(workflow_id) => Ok((
                WorkflowExecution::new(workflow_id, run_id.unwrap_or_default()),
                domain.unwrap_or_default(),
            )),
            None => Err(ProxyError::ContextNotFound(context_id)),
        }
    }

    /// Stores a freshly started execution under a new context id. The
    /// context is forgotten once the execution closes.
    fn track_execution(
        &self,
        execution: WorkflowExecution,
        domain: String,
        completion: CompletionHandle,
    ) -> i64 {
        let context_id = self.inner.workflows.allocate();
        self.inner
            .workflows
            .put(context_id, WorkflowExecutionContext::new(execution, domain, completion.clone()));

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = completion.await;
            debug!(context_id, ok = outcome.is_ok(), "workflow closed, dropping its context");
            inner.workflows.remove(context_id);
        });
        context_id
    }

    fn request_shutdown(&self) {
        info!("library requested termination");
        self.inner.shutdown.send_replace(true);
    }
}

fn downcast<T: Message>(message: Box<dyn Message>) -> ProxyResult<Box<T>> {
    message
        .downcast::<T>()
        .map_err(|other| {
            ProtocolError::malformed(format!("unexpected {}", other.message_type())).into()
        })
}

/// An empty reply of the type answering `request`, with its capability fields.
fn reply_to<R: Message + Default>(request: &dyn Message) -> R {
    let mut reply = R::default();
    request.copy_to(&mut reply);
    reply
}

/// Error reply for a frame that failed to decode, when it can be addressed.
fn undecodable_reply(frame: &[u8], err: ProtocolError) -> Option<Vec<u8>> {
    let Some(request_id) = codec::peek_request_id(frame) else {
        warn!(%err, len = frame.len(), "dropping undecodable frame");
        return None;
    };
    warn!(%err, request_id, "replying to undecodable frame");
    let mut reply = ProxyReply::new(MessageType::Unspecified);
    reply.set_request_id(request_id);
    reply.set_error(Some(&CadenceError::from(err)));
    codec::serialize(&reply).ok()
}

#[async_trait]
impl WorkerHost for ProxyDispatcher {
    async fn invoke_workflow(
        &self,
        invocation: WorkflowInvocation,
    ) -> EngineResult<WorkflowOutcome> {
        let (done, finished) = oneshot::channel::<Result<Option<Vec<u8>>, EngineError>>();
        let completion: CompletionHandle = async move {
            finished.await.unwrap_or_else(|_| {
                Err(EngineError::new("WorkflowAbandonedError", "invocation was dropped"))
            })
        }
        .boxed()
        .shared();
        let context_id = self.inner.workflows.allocate();
        self.inner.workflows.put(
            context_id,
            WorkflowExecutionContext::new(
                invocation.execution.clone(),
                invocation.domain.clone(),
                completion,
            ),
        );
        self.inner
            .invocations
            .insert(invocation.execution.run_id.clone(), context_id);

        let mut request = WorkflowInvokeRequest::new();
        request.set_context_id(context_id);
        request.set_name(Some(&invocation.workflow_type));
        request.set_args(invocation.args.as_deref());
        request.set_domain(Some(&invocation.domain));
        request.set_workflow_id(Some(&invocation.execution.workflow_id));
        request.set_run_id(Some(&invocation.execution.run_id));
        request.set_task_list(Some(&invocation.task_list));
        debug!(context_id, execution = %invocation.execution, "invoking workflow on the library");

        // a run may legitimately outlive the request timeout
        let deadline = invocation.execution_timeout.map(|limit| Instant::now() + limit);
        let outcome = self
            .call_with_deadline::<_, WorkflowInvokeReply>(request, deadline)
            .await
            .map_err(EngineError::from)
            .map(|reply| WorkflowOutcome {
                result: reply.result(),
                continue_as_new: reply.continue_as_new().then(|| reply.continue_as_new_args()),
            });

        self.inner.invocations.remove(&invocation.execution.run_id);
        self.inner.workflows.remove(context_id);
        let _ = done.send(match &outcome {
            Ok(outcome) => Ok(outcome.result.clone()),
            Err(err) => Err(err.clone()),
        });
        outcome
    }

    async fn signal_received(
        &self,
        execution: &WorkflowExecution,
        signal_name: &str,
        args: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        // signals go to the invocation running the workflow, not to a context
        // a client holds for the same execution
        let context_id = self
            .inner
            .invocations
            .get(&execution.run_id)
            .map(|id| *id)
            .or_else(|| {
                self.inner
                    .workflows
                    .find(|ctx| ctx.execution.matches(&execution.workflow_id, &execution.run_id))
                    .map(|(id, _)| id)
            })
            .ok_or_else(|| EngineError::not_found(format!("no workflow context for {execution}")))?;

        let mut request = WorkflowSignalReceivedRequest::new();
        request.set_context_id(context_id);
        request.set_signal_name(Some(signal_name));
        request.set_signal_args(args.as_deref());
        self.call::<_, WorkflowSignalReceivedReply>(request)
            .await
            .map(|_| ())
            .map_err(EngineError::from)
    }

    async fn invoke_activity(
        &self,
        invocation: ActivityInvocation,
    ) -> EngineResult<ActivityOutcome> {
        let context_id = self.inner.activities.allocate();
        self.inner.activities.put(
            context_id,
            ActivityContext {
                task_token: invocation.task_token.clone(),
                heartbeat_details: invocation.heartbeat_details.clone(),
            },
        );

        let mut request = ActivityInvokeRequest::new();
        request.set_activity_context_id(context_id);
        request.set_activity(Some(&invocation.activity));
        request.set_args(invocation.args.as_deref());
        request.set_activity_id(Some(&invocation.activity_id));
        request.set_domain(Some(&invocation.domain));
        request.set_workflow_id(Some(&invocation.execution.workflow_id));
        request.set_run_id(Some(&invocation.execution.run_id));

        // activities report liveness through heartbeats, not a reply deadline
        let outcome = self
            .call_with_deadline::<_, ActivityInvokeReply>(request, None)
            .await;
        self.inner.activities.remove(context_id);
        let reply = outcome.map_err(EngineError::from)?;
        if reply.pending() {
            Ok(ActivityOutcome::Pending)
        } else {
            Ok(ActivityOutcome::Completed(reply.result()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryEngine;

    fn dispatcher() -> (ProxyDispatcher, mpsc::UnboundedReceiver<Vec<u8>>) {
        ProxyDispatcher::new(Arc::new(InMemoryEngine::new()), Duration::from_secs(5))
    }

    async fn roundtrip<Rep: Message>(
        dispatcher: &ProxyDispatcher,
        request: &dyn Message,
    ) -> Box<Rep> {
        let frame = dispatcher.dispatch(&codec::serialize(request).unwrap()).await.unwrap();
        codec::deserialize(&frame).unwrap().downcast::<Rep>().unwrap()
    }

    #[tokio::test]
    async fn ping_is_answered_with_the_request_id() {
        let (dispatcher, _outbound) = dispatcher();
        let mut ping = PingRequest::new();
        ping.set_request_id(42);
        let reply: Box<PingReply> = roundtrip(&dispatcher, &ping).await;
        assert_eq!(reply.request_id(), 42);
        assert!(reply.error().is_none());
    }

    #[tokio::test]
    async fn garbage_without_request_id_is_dropped() {
        let (dispatcher, _outbound) = dispatcher();
        assert!(dispatcher.dispatch(&[1, 2, 3]).await.is_none());
    }

    #[tokio::test]
    async fn replies_go_to_the_correlator() {
        let (dispatcher, mut outbound) = dispatcher();
        let pinger = dispatcher.clone();
        let call = tokio::spawn(async move { pinger.ping_library().await });

        let frame = outbound.recv().await.unwrap();
        let request = codec::deserialize(&frame).unwrap();
        assert_eq!(request.message_type(), MessageType::PingRequest);
        let mut reply = PingReply::new();
        reply.set_request_id(request.request_id());
        assert!(dispatcher.dispatch(&codec::serialize(&reply).unwrap()).await.is_none());
        call.await.unwrap().unwrap();

        // a second copy has nobody waiting for it
        assert!(dispatcher.dispatch(&codec::serialize(&reply).unwrap()).await.is_none());
        assert_eq!(dispatcher.correlator().pending_count(), 0);
    }

    #[tokio::test]
    async fn library_errors_surface_from_call() {
        let (dispatcher, mut outbound) = dispatcher();
        let caller = dispatcher.clone();
        let call = tokio::spawn(async move { caller.ping_library().await });

        let request = codec::deserialize(&outbound.recv().await.unwrap()).unwrap();
        let mut reply = PingReply::new();
        reply.set_request_id(request.request_id());
        reply.set_error(Some(&CadenceError::malformed("nope")));
        dispatcher.dispatch(&codec::serialize(&reply).unwrap()).await;
        assert!(matches!(call.await.unwrap(), Err(ProxyError::Library(_))));
    }

    #[tokio::test]
    async fn only_calls_with_a_deadline_time_out() {
        let (dispatcher, mut outbound) =
            ProxyDispatcher::new(Arc::new(InMemoryEngine::new()), Duration::from_millis(50));
        let err = dispatcher.ping_library().await.unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(_)));
        outbound.recv().await.unwrap();

        let caller = dispatcher.clone();
        let call = tokio::spawn(async move {
            caller
                .call_with_deadline::<_, PingReply>(PingRequest::new(), None)
                .await
        });
        let request = codec::deserialize(&outbound.recv().await.unwrap()).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dispatcher.correlator().pending_count(), 1);

        let mut reply = PingReply::new();
        reply.set_request_id(request.request_id());
        dispatcher.dispatch(&codec::serialize(&reply).unwrap()).await;
        assert_eq!(call.await.unwrap().unwrap().request_id(), request.request_id());
    }

    #[tokio::test]
    async fn zero_context_without_ids_is_not_found() {
        let (dispatcher, _outbound) = dispatcher();
        let err = dispatcher.target_execution(0, None, None, None).unwrap_err();
        assert!(matches!(err, ProxyError::ContextNotFound(0)));
        let (execution, domain) = dispatcher
            .target_execution(0, Some("wf".into()), None, Some("d".into()))
            .unwrap();
        assert_eq!(execution, WorkflowExecution::new("wf", ""));
        assert_eq!(domain, "d");
    }
}
