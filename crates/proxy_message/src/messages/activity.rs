//! Messages exchanged while an activity runs on the library side.

proxy_message! {
    /// Runs an activity on the library.
    pub struct ActivityInvokeRequest [RequestId, ActivityContextId] = ActivityInvokeRequest {
        activity / set_activity: string = "Activity",
        args / set_args: bytes = "Args",
        activity_id / set_activity_id: string = "ActivityId",
        domain / set_domain: string = "Domain",
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
    }
}

proxy_message! {
    pub struct ActivityInvokeReply [RequestId, Error, ActivityContextId] = ActivityInvokeReply {
        result / set_result: bytes = "Result",
        /// Completion will arrive later through `WorkflowCompleteActivity*`.
        pending / set_pending: bool = "Pending",
    }
}

proxy_message! {
    pub struct ActivityGetHeartbeatDetailsRequest [RequestId, ActivityContextId]
        = ActivityGetHeartbeatDetailsRequest {}
}

proxy_message! {
    pub struct ActivityGetHeartbeatDetailsReply [RequestId, Error, ActivityContextId]
        = ActivityGetHeartbeatDetailsReply {
        details / set_details: bytes = "Details",
    }
}

proxy_message! {
    pub struct ActivityLogRequest [RequestId, ActivityContextId] = ActivityLogRequest {
        log_level / set_log_level: string = "LogLevel",
        log_message / set_log_message: string = "LogMessage",
    }
}

proxy_message! {
    pub struct ActivityLogReply [RequestId, Error, ActivityContextId] = ActivityLogReply {}
}

proxy_message! {
    pub struct ActivityRecordHeartbeatRequest [RequestId, ActivityContextId]
        = ActivityRecordHeartbeatRequest {
        details / set_details: bytes = "Details",
    }
}

proxy_message! {
    pub struct ActivityRecordHeartbeatReply [RequestId, Error, ActivityContextId]
        = ActivityRecordHeartbeatReply {}
}

proxy_message! {
    pub struct ActivityHasHeartbeatDetailsRequest [RequestId, ActivityContextId]
        = ActivityHasHeartbeatDetailsRequest {}
}

proxy_message! {
    pub struct ActivityHasHeartbeatDetailsReply [RequestId, Error, ActivityContextId]
        = ActivityHasHeartbeatDetailsReply {
        has_details / set_has_details: bool = "HasDetails",
    }
}

proxy_message! {
    pub struct ActivityStopRequest [RequestId, ActivityContextId] = ActivityStopRequest {}
}

proxy_message! {
    pub struct ActivityStopReply [RequestId, Error, ActivityContextId] = ActivityStopReply {}
}
