//! Connection, lifecycle and domain messages.

use crate::types::{DomainInfo, WorkerOptions};

proxy_message! {
    /// Sent once by the library so the proxy knows where to call back.
    pub struct InitializeRequest [RequestId] = InitializeRequest {
        library_address / set_library_address: string = "LibraryAddress",
        library_port / set_library_port: int = "LibraryPort",
        log_level / set_log_level: string = "LogLevel",
    }
}

proxy_message! {
    pub struct InitializeReply [RequestId, Error] = InitializeReply {}
}

proxy_message! {
    pub struct ConnectRequest [RequestId] = ConnectRequest {
        /// Comma separated `host:port` list.
        endpoints / set_endpoints: string = "Endpoints",
        identity / set_identity: string = "Identity",
        client_timeout / set_client_timeout: duration = "ClientTimeout",
        domain / set_domain: string = "Domain",
        create_domain / set_create_domain: bool = "CreateDomain",
        retries / set_retries: int = "Retries",
        retry_delay / set_retry_delay: duration = "RetryDelay",
    }
}

proxy_message! {
    pub struct ConnectReply [RequestId, Error] = ConnectReply {}
}

proxy_message! {
    /// Asks the proxy to shut down.
    pub struct TerminateRequest [RequestId] = TerminateRequest {}
}

proxy_message! {
    pub struct TerminateReply [RequestId, Error] = TerminateReply {}
}

proxy_message! {
    pub struct DomainRegisterRequest [RequestId] = DomainRegisterRequest {
        name / set_name: string = "Name",
        description / set_description: string = "Description",
        owner_email / set_owner_email: string = "OwnerEmail",
        emit_metrics / set_emit_metrics: bool = "EmitMetrics",
        retention_days / set_retention_days: int = "RetentionDays",
    }
}

proxy_message! {
    pub struct DomainRegisterReply [RequestId, Error] = DomainRegisterReply {}
}

proxy_message! {
    pub struct DomainDescribeRequest [RequestId] = DomainDescribeRequest {
        name / set_name: string = "Name",
    }
}

proxy_message! {
    pub struct DomainDescribeReply [RequestId, Error] = DomainDescribeReply {
        domain_info / set_domain_info: json(DomainInfo) = "DomainInfo",
    }
}

proxy_message! {
    pub struct DomainUpdateRequest [RequestId] = DomainUpdateRequest {
        name / set_name: string = "Name",
        description / set_description: string = "Description",
        owner_email / set_owner_email: string = "OwnerEmail",
        emit_metrics / set_emit_metrics: bool = "EmitMetrics",
        retention_days / set_retention_days: int = "RetentionDays",
    }
}

proxy_message! {
    pub struct DomainUpdateReply [RequestId, Error] = DomainUpdateReply {}
}

proxy_message! {
    /// Liveness check, answered inline.
    pub struct HeartbeatRequest [RequestId] = HeartbeatRequest {
        sent_at / set_sent_at: timestamp = "SentAt",
    }
}

proxy_message! {
    pub struct HeartbeatReply [RequestId, Error] = HeartbeatReply {
        sent_at / set_sent_at: timestamp = "SentAt",
        replied_at / set_replied_at: timestamp = "RepliedAt",
    }
}

proxy_message! {
    /// Cancels a pending proxy to library request.
    pub struct CancelRequest [RequestId] = CancelRequest {
        target_request_id / set_target_request_id: long = "TargetRequestId",
    }
}

proxy_message! {
    pub struct CancelReply [RequestId, Error] = CancelReply {
        was_cancelled / set_was_cancelled: bool = "WasCancelled",
    }
}

proxy_message! {
    pub struct NewWorkerRequest [RequestId] = NewWorkerRequest {
        /// Registered workflow or activity name, empty for all.
        name / set_name: string = "Name",
        is_workflow / set_is_workflow: bool = "IsWorkflow",
        domain / set_domain: string = "Domain",
        task_list / set_task_list: string = "TaskList",
        options / set_options: json(WorkerOptions) = "Options",
    }
}

proxy_message! {
    pub struct NewWorkerReply [RequestId, Error] = NewWorkerReply {
        worker_id / set_worker_id: long = "WorkerId",
    }
}

proxy_message! {
    pub struct StopWorkerRequest [RequestId] = StopWorkerRequest {
        worker_id / set_worker_id: long = "WorkerId",
    }
}

proxy_message! {
    pub struct StopWorkerReply [RequestId, Error] = StopWorkerReply {}
}

proxy_message! {
    pub struct PingRequest [RequestId] = PingRequest {}
}

proxy_message! {
    pub struct PingReply [RequestId, Error] = PingReply {}
}

proxy_message! {
    pub struct WorkflowSetCacheSizeRequest [RequestId] = WorkflowSetCacheSizeRequest {
        size / set_size: int = "Size",
    }
}

proxy_message! {
    pub struct WorkflowSetCacheSizeReply [RequestId, Error] = WorkflowSetCacheSizeReply {}
}
