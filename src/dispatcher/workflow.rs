//! Workflow handlers. Requests addressed by context id resolve the context
//! first; a zero id falls back to the `WorkflowId`/`RunId` properties.

use proxy_message::messages::workflow::*;
use proxy_message::types::WorkflowOptions;
use proxy_message::{HasContextId, Message};
use tracing::{debug, info};

use super::{ProxyDispatcher, reply_to};
use crate::engine::StartWorkflow;
use crate::error::{EngineError, ProxyError, ProxyResult};

impl ProxyDispatcher {
    pub(super) async fn workflow_register(
        &self,
        request: &WorkflowRegisterRequest,
    ) -> ProxyResult<WorkflowRegisterReply> {
        let name = request
            .name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EngineError::bad_request("workflow name is required"))?;
        self.inner
            .engine
            .register_workflow(&request.domain().unwrap_or_default(), &name)
            .await?;
        Ok(reply_to(request))
    }

    /// Starts a workflow and hands back a fresh context id for it.
    pub(super) async fn workflow_execute(
        &self,
        request: &WorkflowExecuteRequest,
    ) -> ProxyResult<WorkflowExecuteReply> {
        let options = request.options().unwrap_or_default();
        let domain = request.domain().or_else(|| options.domain.clone()).unwrap_or_default();
        let (execution, completion) = self
            .inner
            .engine
            .start_workflow(StartWorkflow {
                domain: domain.clone(),
                workflow_type: request.workflow().unwrap_or_default(),
                args: request.args(),
                options,
            })
            .await?;

        let context_id = self.track_execution(execution.clone(), domain, completion);
        info!(context_id, %execution, "workflow execution tracked");
        let mut reply: WorkflowExecuteReply = reply_to(request);
        reply.set_context_id(context_id);
        reply.set_execution(Some(&execution));
        Ok(reply)
    }

    pub(super) async fn workflow_signal(
        &self,
        request: &WorkflowSignalRequest,
    ) -> ProxyResult<WorkflowSignalReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        let signal_name = request.signal_name().unwrap_or_default();
        self.inner
            .engine
            .signal_workflow(&domain, &execution, &signal_name, request.signal_args())
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_signal_with_start(
        &self,
        request: &WorkflowSignalWithStartRequest,
    ) -> ProxyResult<WorkflowSignalWithStartReply> {
        let mut options = request.options().unwrap_or_default();
        if let Some(workflow_id) = request.workflow_id().filter(|id| !id.is_empty()) {
            options.workflow_id = Some(workflow_id);
        }
        let domain = request.domain().or_else(|| options.domain.clone()).unwrap_or_default();
        let start = StartWorkflow {
            domain: domain.clone(),
            workflow_type: request.workflow().unwrap_or_default(),
            args: request.workflow_args(),
            options,
        };
        let (execution, completion) = self
            .inner
            .engine
            .signal_with_start(
                start,
                &request.signal_name().unwrap_or_default(),
                request.signal_args(),
            )
            .await?;

        // the signal may have landed on a run this proxy already tracks
        let context_id = match self
            .inner
            .workflows
            .find(|ctx| ctx.execution == execution)
        {
            Some((context_id, _)) => context_id,
            None => self.track_execution(execution.clone(), domain, completion),
        };
        let mut reply: WorkflowSignalWithStartReply = reply_to(request);
        reply.set_context_id(context_id);
        reply.set_execution(Some(&execution));
        Ok(reply)
    }

    pub(super) async fn workflow_cancel(
        &self,
        request: &WorkflowCancelRequest,
    ) -> ProxyResult<WorkflowCancelReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        self.inner.engine.cancel_workflow(&domain, &execution).await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_terminate(
        &self,
        request: &WorkflowTerminateRequest,
    ) -> ProxyResult<WorkflowTerminateReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        self.inner
            .engine
            .terminate_workflow(&domain, &execution, request.reason(), request.details())
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_get_history(
        &self,
        request: &WorkflowGetHistoryRequest,
    ) -> ProxyResult<WorkflowGetHistoryReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        let history = self.inner.engine.workflow_history(&domain, &execution).await?;
        let mut reply: WorkflowGetHistoryReply = reply_to(request);
        reply.set_history(Some(&history));
        Ok(reply)
    }

    pub(super) async fn workflow_complete_activity(
        &self,
        request: &WorkflowCompleteActivityRequest,
    ) -> ProxyResult<WorkflowCompleteActivityReply> {
        let task_token = request
            .task_token()
            .ok_or_else(|| EngineError::bad_request("task token is required"))?;
        let completion = match request.failure() {
            Some(failure) => Err(failure),
            None => Ok(request.result()),
        };
        self.inner.engine.complete_activity(&task_token, completion).await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_complete_activity_by_id(
        &self,
        request: &WorkflowCompleteActivityByIdRequest,
    ) -> ProxyResult<WorkflowCompleteActivityByIdReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        let completion = match request.failure() {
            Some(failure) => Err(failure),
            None => Ok(request.result()),
        };
        self.inner
            .engine
            .complete_activity_by_id(
                &domain,
                &execution,
                &request.activity_id().unwrap_or_default(),
                completion,
            )
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_record_activity_heartbeat(
        &self,
        request: &WorkflowRecordActivityHeartbeatRequest,
    ) -> ProxyResult<WorkflowRecordActivityHeartbeatReply> {
        let task_token = request
            .task_token()
            .ok_or_else(|| EngineError::bad_request("task token is required"))?;
        self.inner
            .engine
            .record_activity_heartbeat(&task_token, request.details())
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_record_activity_heartbeat_by_id(
        &self,
        request: &WorkflowRecordActivityHeartbeatByIdRequest,
    ) -> ProxyResult<WorkflowRecordActivityHeartbeatByIdReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        self.inner
            .engine
            .record_activity_heartbeat_by_id(
                &domain,
                &execution,
                &request.activity_id().unwrap_or_default(),
                request.details(),
            )
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn workflow_list_closed(
        &self,
        request: &WorkflowListClosedExecutionsRequest,
    ) -> ProxyResult<WorkflowListClosedExecutionsReply> {
        let executions = self
            .inner
            .engine
            .list_workflows(
                &request.domain().unwrap_or_default(),
                false,
                page_size(request.maximum_page_size()),
            )
            .await?;
        let mut reply: WorkflowListClosedExecutionsReply = reply_to(request);
        reply.set_executions(Some(&executions));
        Ok(reply)
    }

    pub(super) async fn workflow_list_open(
        &self,
        request: &WorkflowListOpenExecutionsRequest,
    ) -> ProxyResult<WorkflowListOpenExecutionsReply> {
        let executions = self
            .inner
            .engine
            .list_workflows(
                &request.domain().unwrap_or_default(),
                true,
                page_size(request.maximum_page_size()),
            )
            .await?;
        let mut reply: WorkflowListOpenExecutionsReply = reply_to(request);
        reply.set_executions(Some(&executions));
        Ok(reply)
    }

    pub(super) async fn workflow_query(
        &self,
        request: &WorkflowQueryRequest,
    ) -> ProxyResult<WorkflowQueryReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        let result = self
            .inner
            .engine
            .query_workflow(
                &domain,
                &execution,
                &request.query_name().unwrap_or_default(),
                request.query_args(),
            )
            .await?;
        let mut reply: WorkflowQueryReply = reply_to(request);
        reply.set_result(result.as_deref());
        Ok(reply)
    }

    pub(super) async fn workflow_describe_execution(
        &self,
        request: &WorkflowDescribeExecutionRequest,
    ) -> ProxyResult<WorkflowDescribeExecutionReply> {
        let (execution, domain) = self.target_execution(
            request.context_id(),
            request.workflow_id(),
            request.run_id(),
            request.domain(),
        )?;
        let description = self.inner.engine.describe_workflow(&domain, &execution).await?;
        let mut reply: WorkflowDescribeExecutionReply = reply_to(request);
        reply.set_details(Some(&description));
        Ok(reply)
    }

    /// Reserved on the wire, never implemented.
    pub(super) async fn workflow_describe_task_list(
        &self,
        request: &WorkflowDescribeTaskListRequest,
    ) -> ProxyResult<WorkflowDescribeTaskListReply> {
        Err(ProxyError::Reserved(request.message_type()))
    }

    /// Starts a child of the workflow owning the request's context. The child
    /// gets its own context id.
    pub(super) async fn workflow_execute_child(
        &self,
        request: &WorkflowExecuteChildRequest,
    ) -> ProxyResult<WorkflowExecuteChildReply> {
        let parent = self.workflow_context(request.context_id())?;
        let options: WorkflowOptions = request.options().unwrap_or_default();
        let domain = options.domain.clone().unwrap_or_else(|| parent.domain.clone());
        let (execution, completion) = self
            .inner
            .engine
            .start_child_workflow(
                &parent.execution,
                StartWorkflow {
                    domain: domain.clone(),
                    workflow_type: request.workflow().unwrap_or_default(),
                    args: request.args(),
                    options,
                },
            )
            .await?;

        let child_id = self.track_execution(execution.clone(), domain, completion);
        debug!(parent = %parent.execution, child_id, %execution, "child workflow started");
        let mut reply: WorkflowExecuteChildReply = reply_to(request);
        reply.set_child_id(child_id);
        reply.set_execution(Some(&execution));
        Ok(reply)
    }

    pub(super) async fn workflow_signal_subscribe(
        &self,
        request: &WorkflowSignalSubscribeRequest,
    ) -> ProxyResult<WorkflowSignalSubscribeReply> {
        let context = self.workflow_context(request.context_id())?;
        let signal_name = request
            .signal_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EngineError::bad_request("signal name is required"))?;
        self.inner
            .engine
            .subscribe_signal(&context.execution, &signal_name)
            .await?;
        Ok(reply_to(request))
    }

    /// Records a side effect; the first recorded value wins.
    pub(super) async fn workflow_mutable(
        &self,
        request: &WorkflowMutableRequest,
    ) -> ProxyResult<WorkflowMutableReply> {
        let context = self.workflow_context(request.context_id())?;
        let recorded = self
            .inner
            .engine
            .side_effect(
                &context.execution,
                &request.mutable_id().unwrap_or_default(),
                request.result(),
            )
            .await?;
        let mut reply: WorkflowMutableReply = reply_to(request);
        reply.set_result(recorded.as_deref());
        Ok(reply)
    }

    pub(super) async fn workflow_count(
        &self,
        request: &WorkflowCountRequest,
    ) -> ProxyResult<WorkflowCountReply> {
        let count = self
            .inner
            .engine
            .count_workflows(&request.domain().unwrap_or_default(), request.query().as_deref())
            .await?;
        let mut reply: WorkflowCountReply = reply_to(request);
        reply.set_count(count);
        Ok(reply)
    }
}

/// Zero or negative means "no limit".
fn page_size(maximum: i32) -> usize {
    usize::try_from(maximum).unwrap_or(0)
}
