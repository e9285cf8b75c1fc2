//! Requests the library sends while an activity runs on its side.

use proxy_message::HasActivityContextId;
use proxy_message::messages::activity::*;
use tracing::{debug, error, info, trace, warn};

use super::{ProxyDispatcher, reply_to};
use crate::error::ProxyResult;

impl ProxyDispatcher {
    pub(super) async fn activity_get_heartbeat_details(
        &self,
        request: &ActivityGetHeartbeatDetailsRequest,
    ) -> ProxyResult<ActivityGetHeartbeatDetailsReply> {
        let context = self.activity_context(request.activity_context_id())?;
        let mut reply: ActivityGetHeartbeatDetailsReply = reply_to(request);
        reply.set_details(context.heartbeat_details.as_deref());
        Ok(reply)
    }

    pub(super) async fn activity_has_heartbeat_details(
        &self,
        request: &ActivityHasHeartbeatDetailsRequest,
    ) -> ProxyResult<ActivityHasHeartbeatDetailsReply> {
        let context = self.activity_context(request.activity_context_id())?;
        let mut reply: ActivityHasHeartbeatDetailsReply = reply_to(request);
        reply.set_has_details(context.heartbeat_details.is_some());
        Ok(reply)
    }

    pub(super) async fn activity_record_heartbeat(
        &self,
        request: &ActivityRecordHeartbeatRequest,
    ) -> ProxyResult<ActivityRecordHeartbeatReply> {
        let context = self.activity_context(request.activity_context_id())?;
        self.inner
            .engine
            .record_activity_heartbeat(&context.task_token, request.details())
            .await?;
        Ok(reply_to(request))
    }

    /// Re-emits a library log line through the proxy's subscriber.
    pub(super) async fn activity_log(
        &self,
        request: &ActivityLogRequest,
    ) -> ProxyResult<ActivityLogReply> {
        let context_id = request.activity_context_id();
        let message = request.log_message().unwrap_or_default();
        match request
            .log_level()
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "trace" => trace!(target: "activity", context_id, "{message}"),
            "debug" => debug!(target: "activity", context_id, "{message}"),
            "warn" | "warning" => warn!(target: "activity", context_id, "{message}"),
            "error" | "critical" => error!(target: "activity", context_id, "{message}"),
            _ => info!(target: "activity", context_id, "{message}"),
        }
        Ok(reply_to(request))
    }

    /// Forgets the activity context.
    pub(super) async fn activity_stop(
        &self,
        request: &ActivityStopRequest,
    ) -> ProxyResult<ActivityStopReply> {
        let context_id = request.activity_context_id();
        self.activity_context(context_id)?;
        self.inner.activities.remove(context_id);
        Ok(reply_to(request))
    }
}
