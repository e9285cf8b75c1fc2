//! Connection, lifecycle and domain handlers.

use std::sync::Arc;

use chrono::Utc;
use proxy_message::messages::global::*;
use proxy_message::types::DomainInfo;
use tracing::info;

use super::{ProxyDispatcher, reply_to};
use crate::engine::{ConnectOptions, WorkerSpec};
use crate::error::{EngineError, ProxyResult};

impl ProxyDispatcher {
    pub(super) async fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> ProxyResult<InitializeReply> {
        let address = format!(
            "{}:{}",
            request.library_address().unwrap_or_default(),
            request.library_port()
        );
        let log_level = request.log_level().unwrap_or_default();
        info!(library = %address, %log_level, "library initialized");
        self.inner.library.send_replace(Some(address));
        Ok(reply_to(request))
    }

    pub(super) async fn connect(&self, request: &ConnectRequest) -> ProxyResult<ConnectReply> {
        let endpoints = request
            .endpoints()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();
        self.inner
            .engine
            .connect(ConnectOptions {
                endpoints,
                identity: request.identity(),
                domain: request.domain(),
                create_domain: request.create_domain(),
            })
            .await?;
        Ok(reply_to(request))
    }

    /// Replies and then asks the process to stop.
    pub(super) async fn terminate(
        &self,
        request: &TerminateRequest,
    ) -> ProxyResult<TerminateReply> {
        self.request_shutdown();
        Ok(reply_to(request))
    }

    pub(super) async fn domain_register(
        &self,
        request: &DomainRegisterRequest,
    ) -> ProxyResult<DomainRegisterReply> {
        self.inner
            .engine
            .register_domain(DomainInfo {
                name: request.name().unwrap_or_default(),
                description: request.description().unwrap_or_default(),
                owner_email: request.owner_email().unwrap_or_default(),
                emit_metrics: request.emit_metrics(),
                retention_days: request.retention_days(),
                ..Default::default()
            })
            .await?;
        Ok(reply_to(request))
    }

    pub(super) async fn domain_describe(
        &self,
        request: &DomainDescribeRequest,
    ) -> ProxyResult<DomainDescribeReply> {
        let info = self
            .inner
            .engine
            .describe_domain(&request.name().unwrap_or_default())
            .await?;
        let mut reply: DomainDescribeReply = reply_to(request);
        reply.set_domain_info(Some(&info));
        Ok(reply)
    }

    pub(super) async fn domain_update(
        &self,
        request: &DomainUpdateRequest,
    ) -> ProxyResult<DomainUpdateReply> {
        self.inner
            .engine
            .update_domain(DomainInfo {
                name: request.name().unwrap_or_default(),
                description: request.description().unwrap_or_default(),
                owner_email: request.owner_email().unwrap_or_default(),
                emit_metrics: request.emit_metrics(),
                retention_days: request.retention_days(),
                ..Default::default()
            })
            .await?;
        Ok(reply_to(request))
    }

    /// Answered inline; never touches the engine.
    pub(super) async fn heartbeat(
        &self,
        request: &HeartbeatRequest,
    ) -> ProxyResult<HeartbeatReply> {
        let mut reply: HeartbeatReply = reply_to(request);
        reply.set_sent_at(request.sent_at());
        reply.set_replied_at(Some(Utc::now()));
        Ok(reply)
    }

    pub(super) async fn cancel(&self, request: &CancelRequest) -> ProxyResult<CancelReply> {
        let target = request.target_request_id();
        let was_cancelled = self.inner.correlator.cancel(target);
        info!(target, was_cancelled, "cancel requested");
        let mut reply: CancelReply = reply_to(request);
        reply.set_was_cancelled(was_cancelled);
        Ok(reply)
    }

    pub(super) async fn new_worker(
        &self,
        request: &NewWorkerRequest,
    ) -> ProxyResult<NewWorkerReply> {
        let spec = WorkerSpec {
            domain: request.domain().unwrap_or_default(),
            task_list: request.task_list().unwrap_or_default(),
            name: request.name().filter(|n| !n.is_empty()),
            is_workflow: request.is_workflow(),
            options: request.options().unwrap_or_default(),
        };
        let worker_id = self
            .inner
            .engine
            .new_worker(spec, Arc::new(self.clone()))
            .await?;
        let mut reply: NewWorkerReply = reply_to(request);
        reply.set_worker_id(worker_id);
        Ok(reply)
    }

    pub(super) async fn stop_worker(
        &self,
        request: &StopWorkerRequest,
    ) -> ProxyResult<StopWorkerReply> {
        self.inner.engine.stop_worker(request.worker_id()).await?;
        Ok(reply_to(request))
    }

    pub(super) async fn ping(&self, request: &PingRequest) -> ProxyResult<PingReply> {
        Ok(reply_to(request))
    }

    pub(super) async fn set_cache_size(
        &self,
        request: &WorkflowSetCacheSizeRequest,
    ) -> ProxyResult<WorkflowSetCacheSizeReply> {
        let size = usize::try_from(request.size()).map_err(|_| {
            EngineError::bad_request(format!("invalid cache size {}", request.size()))
        })?;
        self.inner.engine.set_cache_size(size).await?;
        Ok(reply_to(request))
    }
}
