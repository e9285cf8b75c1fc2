//! The orchestration engine as seen by the proxy.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proxy_message::CadenceError;
use proxy_message::types::{
    DomainInfo, HistoryEvent, WorkerOptions, WorkflowDescription, WorkflowExecution,
    WorkflowExecutionInfo, WorkflowOptions,
};

use crate::contexts::CompletionHandle;
use crate::error::EngineError;

pub use memory::InMemoryEngine;

pub type EngineResult<T> = Result<T, EngineError>;

/// How an externally completed activity finished.
pub type ActivityCompletion = Result<Option<Vec<u8>>, CadenceError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub endpoints: Vec<String>,
    pub identity: Option<String>,
    pub domain: Option<String>,
    pub create_domain: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartWorkflow {
    pub domain: String,
    pub workflow_type: String,
    pub args: Option<Vec<u8>>,
    pub options: WorkflowOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSpec {
    pub domain: String,
    pub task_list: String,
    /// Registered name the worker is limited to, `None` for all.
    pub name: Option<String>,
    pub is_workflow: bool,
    pub options: WorkerOptions,
}

/// A workflow run handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInvocation {
    pub execution: WorkflowExecution,
    pub domain: String,
    pub workflow_type: String,
    pub task_list: String,
    pub args: Option<Vec<u8>>,
    /// How long the library may take to finish the run, `None` for no limit.
    pub execution_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowOutcome {
    pub result: Option<Vec<u8>>,
    /// Arguments for the next run when the workflow continued as new.
    pub continue_as_new: Option<Option<Vec<u8>>>,
}

/// An activity attempt handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInvocation {
    pub activity: String,
    pub args: Option<Vec<u8>>,
    pub activity_id: String,
    pub task_token: Vec<u8>,
    pub execution: WorkflowExecution,
    pub domain: String,
    /// Details recorded by the previous attempt.
    pub heartbeat_details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Completed(Option<Vec<u8>>),
    /// The library will complete the activity later by token or id.
    Pending,
}

/// The proxy's face toward the engine for calls that run on the library.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    async fn invoke_workflow(
        &self,
        invocation: WorkflowInvocation,
    ) -> EngineResult<WorkflowOutcome>;

    async fn signal_received(
        &self,
        execution: &WorkflowExecution,
        signal_name: &str,
        args: Option<Vec<u8>>,
    ) -> EngineResult<()>;

    async fn invoke_activity(
        &self,
        invocation: ActivityInvocation,
    ) -> EngineResult<ActivityOutcome>;
}

/// Operations the proxy forwards to the orchestration engine.
///
/// Operations with a default body are optional; the default reports them as
/// unsupported.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn connect(&self, options: ConnectOptions) -> EngineResult<()>;

    async fn register_domain(&self, info: DomainInfo) -> EngineResult<()>;
    async fn describe_domain(&self, name: &str) -> EngineResult<DomainInfo>;
    async fn update_domain(&self, info: DomainInfo) -> EngineResult<()>;

    async fn new_worker(&self, spec: WorkerSpec, host: Arc<dyn WorkerHost>) -> EngineResult<i64>;
    async fn stop_worker(&self, worker_id: i64) -> EngineResult<()>;

    async fn set_cache_size(&self, _size: usize) -> EngineResult<()> {
        Ok(())
    }

    async fn register_workflow(&self, domain: &str, name: &str) -> EngineResult<()>;

    async fn start_workflow(
        &self,
        start: StartWorkflow,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)>;

    async fn start_child_workflow(
        &self,
        _parent: &WorkflowExecution,
        _start: StartWorkflow,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)> {
        Err(EngineError::unsupported("start_child_workflow"))
    }

    async fn signal_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        signal_name: &str,
        args: Option<Vec<u8>>,
    ) -> EngineResult<()>;

    async fn signal_with_start(
        &self,
        _start: StartWorkflow,
        _signal_name: &str,
        _signal_args: Option<Vec<u8>>,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)> {
        Err(EngineError::unsupported("signal_with_start"))
    }

    async fn subscribe_signal(
        &self,
        _execution: &WorkflowExecution,
        _signal_name: &str,
    ) -> EngineResult<()> {
        Err(EngineError::unsupported("subscribe_signal"))
    }

    async fn cancel_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
    ) -> EngineResult<()>;

    async fn terminate_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        reason: Option<String>,
        details: Option<Vec<u8>>,
    ) -> EngineResult<()>;

    async fn query_workflow(
        &self,
        _domain: &str,
        _execution: &WorkflowExecution,
        _query_name: &str,
        _args: Option<Vec<u8>>,
    ) -> EngineResult<Option<Vec<u8>>> {
        Err(EngineError::unsupported("query_workflow"))
    }

    async fn describe_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
    ) -> EngineResult<WorkflowDescription>;

    async fn workflow_history(
        &self,
        _domain: &str,
        _execution: &WorkflowExecution,
    ) -> EngineResult<Vec<HistoryEvent>> {
        Err(EngineError::unsupported("workflow_history"))
    }

    async fn list_workflows(
        &self,
        _domain: &str,
        _open: bool,
        _page_size: usize,
    ) -> EngineResult<Vec<WorkflowExecutionInfo>> {
        Err(EngineError::unsupported("list_workflows"))
    }

    async fn count_workflows(&self, _domain: &str, _query: Option<&str>) -> EngineResult<i64> {
        Err(EngineError::unsupported("count_workflows"))
    }

    /// Records `value` under `mutable_id` unless a value is already there, and
    /// returns whatever is recorded.
    async fn side_effect(
        &self,
        _execution: &WorkflowExecution,
        _mutable_id: &str,
        _value: Option<Vec<u8>>,
    ) -> EngineResult<Option<Vec<u8>>> {
        Err(EngineError::unsupported("side_effect"))
    }

    async fn record_activity_heartbeat(
        &self,
        task_token: &[u8],
        details: Option<Vec<u8>>,
    ) -> EngineResult<()>;

    async fn record_activity_heartbeat_by_id(
        &self,
        _domain: &str,
        _execution: &WorkflowExecution,
        _activity_id: &str,
        _details: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        Err(EngineError::unsupported("record_activity_heartbeat_by_id"))
    }

    async fn complete_activity(
        &self,
        task_token: &[u8],
        completion: ActivityCompletion,
    ) -> EngineResult<()>;

    async fn complete_activity_by_id(
        &self,
        _domain: &str,
        _execution: &WorkflowExecution,
        _activity_id: &str,
        _completion: ActivityCompletion,
    ) -> EngineResult<()> {
        Err(EngineError::unsupported("complete_activity_by_id"))
    }
}
