//! Process-local engine for development and tests.
//!
//! Keeps every execution in memory, runs workflows and activities through
//! the registered worker hosts and never persists anything.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures::FutureExt;
use futures::future::BoxFuture;
use proxy_message::types::{
    DomainInfo, ExecutionStatus, HistoryEvent, HistoryEventType, WorkflowDescription,
    WorkflowExecution, WorkflowExecutionInfo, WorkflowOptions,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ActivityCompletion, ActivityInvocation, ActivityOutcome, ConnectOptions, EngineResult,
    StartWorkflow, WorkerHost, WorkerSpec, WorkflowEngine, WorkflowInvocation, WorkflowOutcome,
};
use crate::contexts::CompletionHandle;
use crate::error::EngineError;

/// Built-in query answered by the engine itself.
pub const STACK_TRACE_QUERY: &str = "__stack_trace";

/// Attempts per activity when the library reports a transient failure.
const ACTIVITY_ATTEMPTS: u32 = 3;

type Done = oneshot::Sender<Result<Option<Vec<u8>>, EngineError>>;

struct Worker {
    spec: WorkerSpec,
    host: Arc<dyn WorkerHost>,
    /// Caps the tasks running on this worker at once.
    slots: Option<Arc<Semaphore>>,
}

/// The worker picked for a task.
#[derive(Clone)]
struct Assignment {
    host: Arc<dyn WorkerHost>,
    slots: Option<Arc<Semaphore>>,
}

impl Assignment {
    /// Waits for a free slot when the worker limits its concurrency.
    async fn slot(&self) -> Option<OwnedSemaphorePermit> {
        match &self.slots {
            Some(slots) => slots.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}

struct ExecutionRecord {
    domain: String,
    info: WorkflowExecutionInfo,
    args: Option<Vec<u8>>,
    execution_timeout_ms: Option<u64>,
    history: Vec<HistoryEvent>,
    completion: CompletionHandle,
    done: Option<Done>,
    host: Option<Arc<dyn WorkerHost>>,
    subscriptions: HashSet<String>,
    buffered_signals: Vec<(String, Option<Vec<u8>>)>,
    side_effects: HashMap<String, Option<Vec<u8>>>,
}

impl ExecutionRecord {
    fn push_event(&mut self, event_type: HistoryEventType, details: Option<String>) {
        self.history.push(HistoryEvent {
            event_id: self.history.len() as i64 + 1,
            event_type,
            timestamp: Utc::now(),
            details,
        });
        self.info.history_length = self.history.len() as i64;
    }

    /// Closes an open execution. Returns `false` when it was already closed.
    fn close(
        &mut self,
        status: ExecutionStatus,
        event_type: HistoryEventType,
        details: Option<String>,
        outcome: Result<Option<Vec<u8>>, EngineError>,
    ) -> bool {
        if !self.info.status.is_open() {
            return false;
        }
        self.info.status = status;
        self.info.close_time = Some(Utc::now());
        self.push_event(event_type, details);
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
        true
    }
}

struct ActivityRecord {
    execution: WorkflowExecution,
    activity_id: String,
    details: Option<Vec<u8>>,
    done: Option<oneshot::Sender<ActivityCompletion>>,
}

#[derive(Default)]
struct EngineState {
    domains: DashMap<String, DomainInfo>,
    workflows: DashSet<(String, String)>,
    workers: DashMap<i64, Worker>,
    last_worker_id: AtomicI64,
    /// run id → execution
    executions: DashMap<String, ExecutionRecord>,
    /// workflow id → latest run id
    latest_runs: DashMap<String, String>,
    /// task token → activity
    activities: DashMap<Vec<u8>, ActivityRecord>,
    /// (run id, activity id) → task token
    activity_ids: DashMap<(String, String), Vec<u8>>,
    last_activity_id: AtomicI64,
}

impl EngineState {
    fn ensure_domain(&self, domain: &str) -> EngineResult<()> {
        if self.domains.contains_key(domain) {
            Ok(())
        } else {
            Err(EngineError::not_found(format!("domain '{domain}' does not exist")))
        }
    }

    /// Maps an execution (run id optional) onto a known run id.
    fn resolve_run(&self, domain: &str, execution: &WorkflowExecution) -> EngineResult<String> {
        let run_id = if execution.run_id.is_empty() {
            self.latest_runs
                .get(&execution.workflow_id)
                .map(|run| run.value().clone())
        } else {
            Some(execution.run_id.clone())
        };
        let not_found = || execution_not_found(&execution);
        let run_id = run_id.ok_or_else(not_found)?;
        let record = self.executions.get(&run_id).ok_or_else(not_found)?;
        if record.info.execution.workflow_id != execution.workflow_id
            || (!domain.is_empty() && record.domain != domain)
        {
            return Err(not_found());
        }
        Ok(run_id)
    }

    fn find_worker(
        &self,
        domain: &str,
        task_list: &str,
        is_workflow: bool,
        name: &str,
    ) -> Option<Assignment> {
        self.workers
            .iter()
            .find(|w| {
                let spec = &w.spec;
                spec.is_workflow == is_workflow
                    && spec.domain == domain
                    && (task_list.is_empty() || spec.task_list == task_list)
                    && spec.name.as_deref().is_none_or(|n| n.is_empty() || n == name)
            })
            .map(|w| Assignment {
                host: w.host.clone(),
                slots: w.slots.clone(),
            })
    }

    fn new_run(
        self: &Arc<Self>,
        start: &StartWorkflow,
        workflow_id: String,
        done: Option<Done>,
        completion: CompletionHandle,
    ) -> WorkflowExecution {
        let execution = WorkflowExecution::new(workflow_id.clone(), Uuid::new_v4().to_string());
        let mut record = ExecutionRecord {
            domain: start.domain.clone(),
            info: WorkflowExecutionInfo {
                execution: execution.clone(),
                workflow_type: start.workflow_type.clone(),
                task_list: start.options.task_list.clone().unwrap_or_default(),
                start_time: Utc::now(),
                close_time: None,
                status: ExecutionStatus::Running,
                history_length: 0,
            },
            args: start.args.clone(),
            execution_timeout_ms: start.options.execution_timeout_ms,
            history: Vec::new(),
            completion,
            done,
            host: None,
            subscriptions: HashSet::new(),
            buffered_signals: Vec::new(),
            side_effects: HashMap::new(),
        };
        record.push_event(
            HistoryEventType::WorkflowExecutionStarted,
            Some(start.workflow_type.clone()),
        );
        self.executions.insert(execution.run_id.clone(), record);
        self.latest_runs.insert(workflow_id, execution.run_id.clone());
        info!(%execution, workflow = %start.workflow_type, "workflow started");
        self.dispatch_run(&execution.run_id);
        execution
    }

    /// Hands an open, unassigned run to a matching workflow worker, if any.
    fn dispatch_run(self: &Arc<Self>, run_id: &str) {
        let (assignment, invocation) = {
            let Some(mut record) = self.executions.get_mut(run_id) else {
                return;
            };
            if record.host.is_some() || !record.info.status.is_open() {
                return;
            }
            let Some(assignment) = self.find_worker(
                &record.domain,
                &record.info.task_list,
                true,
                &record.info.workflow_type,
            ) else {
                debug!(run_id, "no workflow worker yet, run stays queued");
                return;
            };
            record.host = Some(assignment.host.clone());
            let invocation = WorkflowInvocation {
                execution: record.info.execution.clone(),
                domain: record.domain.clone(),
                workflow_type: record.info.workflow_type.clone(),
                task_list: record.info.task_list.clone(),
                args: record.args.clone(),
                execution_timeout: record.execution_timeout_ms.map(Duration::from_millis),
            };
            (assignment, invocation)
        };
        tokio::spawn(self.clone().run_workflow(assignment, invocation));
    }

    fn run_workflow(
        self: Arc<Self>,
        assignment: Assignment,
        invocation: WorkflowInvocation,
    ) -> BoxFuture<'static, ()> {
        async move {
            let _slot = assignment.slot().await;
            let run_id = invocation.execution.run_id.clone();
            match assignment.host.invoke_workflow(invocation).await {
                Ok(WorkflowOutcome { continue_as_new: Some(args), .. }) => {
                    let next = {
                        let Some(mut record) = self.executions.get_mut(&run_id) else {
                            return;
                        };
                        // the completion handle follows the chain to the next run
                        let done = record.done.take();
                        if !record.close(
                            ExecutionStatus::ContinuedAsNew,
                            HistoryEventType::WorkflowExecutionContinuedAsNew,
                            None,
                            Ok(None),
                        ) {
                            return;
                        }
                        let start = StartWorkflow {
                            domain: record.domain.clone(),
                            workflow_type: record.info.workflow_type.clone(),
                            args,
                            options: WorkflowOptions {
                                task_list: Some(record.info.task_list.clone()),
                                execution_timeout_ms: record.execution_timeout_ms,
                                ..Default::default()
                            },
                        };
                        let workflow_id = record.info.execution.workflow_id.clone();
                        (start, workflow_id, done, record.completion.clone())
                    };
                    let (start, workflow_id, done, completion) = next;
                    self.new_run(&start, workflow_id, done, completion);
                }
                Ok(outcome) => {
                    self.close(
                        &run_id,
                        ExecutionStatus::Completed,
                        HistoryEventType::WorkflowExecutionCompleted,
                        None,
                        Ok(outcome.result),
                    );
                }
                Err(err) if err.is_timeout() => {
                    warn!(run_id, %err, "workflow timed out");
                    self.close(
                        &run_id,
                        ExecutionStatus::TimedOut,
                        HistoryEventType::WorkflowExecutionTimedOut,
                        Some(err.to_string()),
                        Err(err),
                    );
                }
                Err(err) => {
                    warn!(run_id, %err, "workflow failed");
                    self.close(
                        &run_id,
                        ExecutionStatus::Failed,
                        HistoryEventType::WorkflowExecutionFailed,
                        Some(err.to_string()),
                        Err(err),
                    );
                }
            }
        }
        .boxed()
    }

    fn close(
        &self,
        run_id: &str,
        status: ExecutionStatus,
        event_type: HistoryEventType,
        details: Option<String>,
        outcome: Result<Option<Vec<u8>>, EngineError>,
    ) -> bool {
        match self.executions.get_mut(run_id) {
            Some(mut record) => record.close(status, event_type, details, outcome),
            None => false,
        }
    }

    fn spawn_signal_delivery(
        &self,
        host: Arc<dyn WorkerHost>,
        execution: WorkflowExecution,
        signals: Vec<(String, Option<Vec<u8>>)>,
    ) {
        if signals.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for (name, args) in signals {
                if let Err(err) = host.signal_received(&execution, &name, args).await {
                    warn!(%execution, signal = %name, %err, "signal delivery failed");
                }
            }
        });
    }
}

/// An engine that lives entirely in this process.
#[derive(Clone, Default)]
pub struct InMemoryEngine {
    state: Arc<EngineState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an activity for `execution` on a matching activity worker and
    /// waits for its result.
    ///
    /// Transient failures are retried; each retry sees the heartbeat details
    /// recorded by the attempt before it.
    pub async fn execute_activity(
        &self,
        execution: &WorkflowExecution,
        task_list: &str,
        activity: &str,
        args: Option<Vec<u8>>,
    ) -> EngineResult<Option<Vec<u8>>> {
        let run_id = self.state.resolve_run("", execution)?;
        let (domain, execution) = {
            let record = self
                .state
                .executions
                .get(&run_id)
                .ok_or_else(|| execution_not_found(&execution))?;
            (record.domain.clone(), record.info.execution.clone())
        };
        let assignment = self
            .state
            .find_worker(&domain, task_list, false, activity)
            .ok_or_else(|| {
                EngineError::not_found(format!("no activity worker polls task list '{task_list}'"))
            })?;

        let activity_id = self.state.last_activity_id.fetch_add(1, Ordering::SeqCst) + 1;
        let activity_id = activity_id.to_string();
        let task_token = Uuid::new_v4().as_bytes().to_vec();
        self.state.activities.insert(
            task_token.clone(),
            ActivityRecord {
                execution: execution.clone(),
                activity_id: activity_id.clone(),
                details: None,
                done: None,
            },
        );
        self.state
            .activity_ids
            .insert((run_id.clone(), activity_id.clone()), task_token.clone());

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            let (tx, rx) = oneshot::channel();
            let heartbeat_details = match self.state.activities.get_mut(&task_token) {
                Some(mut record) => {
                    record.done = Some(tx);
                    record.details.clone()
                }
                None => None,
            };
            let invocation = ActivityInvocation {
                activity: activity.to_string(),
                args: args.clone(),
                activity_id: activity_id.clone(),
                task_token: task_token.clone(),
                execution: execution.clone(),
                domain: domain.clone(),
                heartbeat_details,
            };
            let outcome = {
                let _slot = assignment.slot().await;
                assignment.host.invoke_activity(invocation).await
            };
            match outcome {
                Ok(ActivityOutcome::Completed(result)) => break Ok(result),
                Ok(ActivityOutcome::Pending) => {
                    debug!(activity_id, "activity will complete externally");
                    break match rx.await {
                        Ok(Ok(result)) => Ok(result),
                        Ok(Err(err)) => Err(EngineError::from(err)),
                        Err(_) => Err(EngineError::new(
                            "ActivityAbandonedError",
                            "activity was never completed",
                        )),
                    };
                }
                Err(err) if err.transient && attempt < ACTIVITY_ATTEMPTS => {
                    warn!(activity_id, attempt, %err, "activity attempt failed, retrying");
                }
                Err(err) => break Err(err),
            }
        };

        self.state.activities.remove(&task_token);
        self.state.activity_ids.remove(&(run_id.clone(), activity_id.clone()));
        if let Some(mut record) = self.state.executions.get_mut(&run_id) {
            match &result {
                Ok(_) => record.push_event(
                    HistoryEventType::ActivityTaskCompleted,
                    Some(activity.to_string()),
                ),
                Err(err) => {
                    record.push_event(HistoryEventType::ActivityTaskFailed, Some(err.to_string()))
                }
            }
        }
        result
    }
}

fn parse_count_query(query: &str) -> EngineResult<Option<(String, String)>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }
    let (key, value) = query
        .split_once('=')
        .ok_or_else(|| EngineError::bad_request(format!("unsupported query '{query}'")))?;
    let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
    Ok(Some((key.trim().to_string(), value.to_string())))
}

#[async_trait]
impl WorkflowEngine for InMemoryEngine {
    async fn connect(&self, options: ConnectOptions) -> EngineResult<()> {
        info!(
            endpoints = ?options.endpoints,
            identity = options.identity.as_deref().unwrap_or_default(),
            "connected to in-memory engine"
        );
        if let Some(domain) = options.domain.filter(|_| options.create_domain) {
            if !self.state.domains.contains_key(&domain) {
                self.state.domains.insert(
                    domain.clone(),
                    DomainInfo {
                        name: domain,
                        ..Default::default()
                    },
                );
            }
        }
        Ok(())
    }

    async fn register_domain(&self, info: DomainInfo) -> EngineResult<()> {
        if info.name.is_empty() {
            return Err(EngineError::bad_request("domain name is required"));
        }
        match self.state.domains.entry(info.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::new(
                "DomainAlreadyExistsError",
                format!("domain '{}' already exists", info.name),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!(domain = %info.name, "domain registered");
                slot.insert(info);
                Ok(())
            }
        }
    }

    async fn describe_domain(&self, name: &str) -> EngineResult<DomainInfo> {
        self.state
            .domains
            .get(name)
            .map(|d| d.value().clone())
            .ok_or_else(|| EngineError::not_found(format!("domain '{name}' does not exist")))
    }

    async fn update_domain(&self, info: DomainInfo) -> EngineResult<()> {
        let mut domain = self
            .state
            .domains
            .get_mut(&info.name)
            .ok_or_else(|| {
                EngineError::not_found(format!("domain '{}' does not exist", info.name))
            })?;
        let status = domain.status;
        *domain = DomainInfo { status, ..info };
        Ok(())
    }

    async fn new_worker(&self, spec: WorkerSpec, host: Arc<dyn WorkerHost>) -> EngineResult<i64> {
        self.state.ensure_domain(&spec.domain)?;
        let worker_id = self.state.last_worker_id.fetch_add(1, Ordering::SeqCst) + 1;
        let is_workflow = spec.is_workflow;
        let domain = spec.domain.clone();
        let limit = if is_workflow {
            spec.options.max_concurrent_workflows
        } else {
            spec.options.max_concurrent_activities
        };
        let slots = limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n as usize)));
        info!(
            worker_id,
            domain = %spec.domain,
            task_list = %spec.task_list,
            identity = spec.options.identity.as_deref().unwrap_or_default(),
            ?limit,
            is_workflow,
            "worker started"
        );
        self.state.workers.insert(worker_id, Worker { spec, host, slots });

        if is_workflow {
            let queued: Vec<String> = self
                .state
                .executions
                .iter()
                .filter(|r| r.domain == domain && r.host.is_none() && r.info.status.is_open())
                .map(|r| r.key().clone())
                .collect();
            for run_id in queued {
                self.state.dispatch_run(&run_id);
            }
        }
        Ok(worker_id)
    }

    async fn stop_worker(&self, worker_id: i64) -> EngineResult<()> {
        self.state
            .workers
            .remove(&worker_id)
            .map(|_| info!(worker_id, "worker stopped"))
            .ok_or_else(|| EngineError::not_found(format!("worker {worker_id} does not exist")))
    }

    async fn register_workflow(&self, domain: &str, name: &str) -> EngineResult<()> {
        self.state.ensure_domain(domain)?;
        self.state.workflows.insert((domain.to_string(), name.to_string()));
        Ok(())
    }

    async fn start_workflow(
        &self,
        start: StartWorkflow,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)> {
        self.state.ensure_domain(&start.domain)?;
        if start.workflow_type.is_empty() {
            return Err(EngineError::bad_request("workflow type is required"));
        }
        let workflow_id = start
            .options
            .workflow_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let already_running = self
            .state
            .latest_runs
            .get(&workflow_id)
            .and_then(|run| self.state.executions.get(run.value()).map(|r| r.info.status.is_open()))
            .unwrap_or(false);
        if already_running {
            return Err(EngineError::new(
                "WorkflowExecutionAlreadyStartedError",
                format!("workflow '{workflow_id}' is already running"),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let completion: CompletionHandle = async move {
            rx.await.unwrap_or_else(|_| {
                Err(EngineError::new("WorkflowAbandonedError", "execution was dropped"))
            })
        }
        .boxed()
        .shared();
        let execution = self.state.new_run(&start, workflow_id, Some(tx), completion.clone());
        Ok((execution, completion))
    }

    async fn start_child_workflow(
        &self,
        parent: &WorkflowExecution,
        mut start: StartWorkflow,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)> {
        let run_id = self.state.resolve_run("", parent)?;
        if start.domain.is_empty() {
            if let Some(record) = self.state.executions.get(&run_id) {
                start.domain = record.domain.clone();
            }
        }
        self.start_workflow(start).await
    }

    async fn signal_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        signal_name: &str,
        args: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        let run_id = self.state.resolve_run(domain, execution)?;
        let delivery = {
            let mut record = self
                .state
                .executions
                .get_mut(&run_id)
                .ok_or_else(|| execution_not_found(&execution))?;
            if !record.info.status.is_open() {
                return Err(EngineError::not_found("workflow execution already completed"));
            }
            record.push_event(
                HistoryEventType::WorkflowExecutionSignaled,
                Some(signal_name.to_string()),
            );
            match (&record.host, record.subscriptions.contains(signal_name)) {
                (Some(host), true) => Some((host.clone(), record.info.execution.clone())),
                _ => {
                    record.buffered_signals.push((signal_name.to_string(), args.clone()));
                    None
                }
            }
        };
        if let Some((host, execution)) = delivery {
            self.state
                .spawn_signal_delivery(host, execution, vec![(signal_name.to_string(), args)]);
        }
        Ok(())
    }

    async fn signal_with_start(
        &self,
        start: StartWorkflow,
        signal_name: &str,
        signal_args: Option<Vec<u8>>,
    ) -> EngineResult<(WorkflowExecution, CompletionHandle)> {
        let running = start.options.workflow_id.as_ref().and_then(|workflow_id| {
            let run = self.state.latest_runs.get(workflow_id)?;
            let record = self.state.executions.get(run.value())?;
            record
                .info
                .status
                .is_open()
                .then(|| (record.info.execution.clone(), record.completion.clone()))
        });
        let (execution, completion) = match running {
            Some(found) => found,
            None => self.start_workflow(start.clone()).await?,
        };
        self.signal_workflow(&start.domain, &execution, signal_name, signal_args)
            .await?;
        Ok((execution, completion))
    }

    async fn subscribe_signal(
        &self,
        execution: &WorkflowExecution,
        signal_name: &str,
    ) -> EngineResult<()> {
        let run_id = self.state.resolve_run("", execution)?;
        let delivery = {
            let Some(mut record) = self.state.executions.get_mut(&run_id) else {
                return Err(execution_not_found(&execution));
            };
            record.subscriptions.insert(signal_name.to_string());
            let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut record.buffered_signals)
                .into_iter()
                .partition(|(name, _)| name == signal_name);
            record.buffered_signals = rest;
            record
                .host
                .clone()
                .map(|host| (host, record.info.execution.clone(), matching))
        };
        if let Some((host, execution, signals)) = delivery {
            self.state.spawn_signal_delivery(host, execution, signals);
        }
        Ok(())
    }

    async fn cancel_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
    ) -> EngineResult<()> {
        let run_id = self.state.resolve_run(domain, execution)?;
        let mut record = self
            .state
            .executions
            .get_mut(&run_id)
            .ok_or_else(|| execution_not_found(&execution))?;
        if !record.info.status.is_open() {
            return Err(EngineError::not_found("workflow execution already completed"));
        }
        record.push_event(HistoryEventType::WorkflowExecutionCancelRequested, None);
        record.close(
            ExecutionStatus::Canceled,
            HistoryEventType::WorkflowExecutionCanceled,
            None,
            Err(EngineError::new("CanceledError", "workflow was canceled")),
        );
        Ok(())
    }

    async fn terminate_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        reason: Option<String>,
        _details: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        let run_id = self.state.resolve_run(domain, execution)?;
        let reason = reason.unwrap_or_else(|| "terminated".to_string());
        let closed = self.state.close(
            &run_id,
            ExecutionStatus::Terminated,
            HistoryEventType::WorkflowExecutionTerminated,
            Some(reason.clone()),
            Err(EngineError::new("TerminatedError", reason)),
        );
        if closed {
            Ok(())
        } else {
            Err(EngineError::not_found("workflow execution already completed"))
        }
    }

    async fn query_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        query_name: &str,
        _args: Option<Vec<u8>>,
    ) -> EngineResult<Option<Vec<u8>>> {
        let run_id = self.state.resolve_run(domain, execution)?;
        if query_name != STACK_TRACE_QUERY {
            return Err(EngineError::new(
                "QueryFailedError",
                format!("unknown query type '{query_name}'"),
            ));
        }
        let record = self
            .state
            .executions
            .get(&run_id)
            .ok_or_else(|| execution_not_found(&execution))?;
        let trace = format!(
            "{} {} [{}] after {} events",
            record.info.workflow_type,
            record.info.execution,
            record.info.status,
            record.info.history_length
        );
        Ok(Some(trace.into_bytes()))
    }

    async fn describe_workflow(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
    ) -> EngineResult<WorkflowDescription> {
        let run_id = self.state.resolve_run(domain, execution)?;
        let info = self
            .state
            .executions
            .get(&run_id)
            .map(|r| r.info.clone())
            .ok_or_else(|| execution_not_found(&execution))?;
        let mut pending_activities: Vec<String> = self
            .state
            .activities
            .iter()
            .filter(|a| a.execution.run_id == run_id)
            .map(|a| a.activity_id.clone())
            .collect();
        pending_activities.sort();
        Ok(WorkflowDescription { info, pending_activities })
    }

    async fn workflow_history(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
    ) -> EngineResult<Vec<HistoryEvent>> {
        let run_id = self.state.resolve_run(domain, execution)?;
        self.state
            .executions
            .get(&run_id)
            .map(|r| r.history.clone())
            .ok_or_else(|| execution_not_found(&execution))
    }

    async fn list_workflows(
        &self,
        domain: &str,
        open: bool,
        page_size: usize,
    ) -> EngineResult<Vec<WorkflowExecutionInfo>> {
        self.state.ensure_domain(domain)?;
        let mut infos: Vec<WorkflowExecutionInfo> = self
            .state
            .executions
            .iter()
            .filter(|r| r.domain == domain && r.info.status.is_open() == open)
            .map(|r| r.info.clone())
            .collect();
        infos.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if page_size > 0 {
            infos.truncate(page_size);
        }
        Ok(infos)
    }

    async fn count_workflows(&self, domain: &str, query: Option<&str>) -> EngineResult<i64> {
        self.state.ensure_domain(domain)?;
        let filter = parse_count_query(query.unwrap_or_default())?;
        let count = self
            .state
            .executions
            .iter()
            .filter(|r| r.domain == domain)
            .filter(|r| match &filter {
                None => true,
                Some((key, value)) => match key.as_str() {
                    "WorkflowType" => r.info.workflow_type == *value,
                    "WorkflowID" | "WorkflowId" => r.info.execution.workflow_id == *value,
                    "ExecutionStatus" | "CloseStatus" => r.info.status.as_ref() == value,
                    _ => false,
                },
            })
            .count();
        Ok(count as i64)
    }

    async fn side_effect(
        &self,
        execution: &WorkflowExecution,
        mutable_id: &str,
        value: Option<Vec<u8>>,
    ) -> EngineResult<Option<Vec<u8>>> {
        let run_id = self.state.resolve_run("", execution)?;
        let mut record = self
            .state
            .executions
            .get_mut(&run_id)
            .ok_or_else(|| execution_not_found(&execution))?;
        if let Some(recorded) = record.side_effects.get(mutable_id) {
            return Ok(recorded.clone());
        }
        record.side_effects.insert(mutable_id.to_string(), value.clone());
        record.push_event(HistoryEventType::MarkerRecorded, Some(mutable_id.to_string()));
        Ok(value)
    }

    async fn record_activity_heartbeat(
        &self,
        task_token: &[u8],
        details: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        let mut activity = self
            .state
            .activities
            .get_mut(task_token)
            .ok_or_else(|| EngineError::not_found("activity does not exist"))?;
        activity.details = details;
        Ok(())
    }

    async fn record_activity_heartbeat_by_id(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        activity_id: &str,
        details: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        let task_token = self.task_token(domain, execution, activity_id)?;
        self.record_activity_heartbeat(&task_token, details).await
    }

    async fn complete_activity(
        &self,
        task_token: &[u8],
        completion: ActivityCompletion,
    ) -> EngineResult<()> {
        let done = self
            .state
            .activities
            .get_mut(task_token)
            .ok_or_else(|| EngineError::not_found("activity does not exist"))?
            .done
            .take()
            .ok_or_else(|| EngineError::not_found("activity already completed"))?;
        done.send(completion)
            .map_err(|_| EngineError::not_found("activity already completed"))
    }

    async fn complete_activity_by_id(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        activity_id: &str,
        completion: ActivityCompletion,
    ) -> EngineResult<()> {
        let task_token = self.task_token(domain, execution, activity_id)?;
        self.complete_activity(&task_token, completion).await
    }
}

impl InMemoryEngine {
    fn task_token(
        &self,
        domain: &str,
        execution: &WorkflowExecution,
        activity_id: &str,
    ) -> EngineResult<Vec<u8>> {
        let run_id = self.state.resolve_run(domain, execution)?;
        self.state
            .activity_ids
            .get(&(run_id, activity_id.to_string()))
            .map(|token| token.value().clone())
            .ok_or_else(|| {
                EngineError::not_found(format!("activity '{activity_id}' does not exist"))
            })
    }
}

fn execution_not_found(execution: impl std::fmt::Display) -> EngineError {
    EngineError::not_found(format!("workflow execution '{execution}' does not exist"))
}
