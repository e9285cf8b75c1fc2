//! Workflow messages. Every one of them carries `WorkflowContextId`.

use crate::error::CadenceError;
use crate::types::{
    HistoryEvent, WorkflowDescription, WorkflowExecution, WorkflowExecutionInfo, WorkflowOptions,
};

proxy_message! {
    pub struct WorkflowRegisterRequest [RequestId, ContextId] = WorkflowRegisterRequest {
        name / set_name: string = "Name",
        domain / set_domain: string = "Domain",
    }
}

proxy_message! {
    pub struct WorkflowRegisterReply [RequestId, Error, ContextId] = WorkflowRegisterReply {}
}

proxy_message! {
    /// Starts a workflow. The reply's context id names the new execution context.
    pub struct WorkflowExecuteRequest [RequestId, ContextId] = WorkflowExecuteRequest {
        domain / set_domain: string = "Domain",
        workflow / set_workflow: string = "Workflow",
        args / set_args: bytes = "Args",
        options / set_options: json(WorkflowOptions) = "Options",
    }
}

proxy_message! {
    pub struct WorkflowExecuteReply [RequestId, Error, ContextId] = WorkflowExecuteReply {
        execution / set_execution: json(WorkflowExecution) = "Execution",
    }
}

proxy_message! {
    pub struct WorkflowSignalRequest [RequestId, ContextId] = WorkflowSignalRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
        signal_name / set_signal_name: string = "SignalName",
        signal_args / set_signal_args: bytes = "SignalArgs",
    }
}

proxy_message! {
    pub struct WorkflowSignalReply [RequestId, Error, ContextId] = WorkflowSignalReply {}
}

proxy_message! {
    pub struct WorkflowSignalWithStartRequest [RequestId, ContextId]
        = WorkflowSignalWithStartRequest {
        workflow / set_workflow: string = "Workflow",
        workflow_id / set_workflow_id: string = "WorkflowId",
        domain / set_domain: string = "Domain",
        signal_name / set_signal_name: string = "SignalName",
        signal_args / set_signal_args: bytes = "SignalArgs",
        workflow_args / set_workflow_args: bytes = "WorkflowArgs",
        options / set_options: json(WorkflowOptions) = "Options",
    }
}

proxy_message! {
    pub struct WorkflowSignalWithStartReply [RequestId, Error, ContextId]
        = WorkflowSignalWithStartReply {
        execution / set_execution: json(WorkflowExecution) = "Execution",
    }
}

proxy_message! {
    pub struct WorkflowCancelRequest [RequestId, ContextId] = WorkflowCancelRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
    }
}

proxy_message! {
    pub struct WorkflowCancelReply [RequestId, Error, ContextId] = WorkflowCancelReply {}
}

proxy_message! {
    pub struct WorkflowTerminateRequest [RequestId, ContextId] = WorkflowTerminateRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
        reason / set_reason: string = "Reason",
        details / set_details: bytes = "Details",
    }
}

proxy_message! {
    pub struct WorkflowTerminateReply [RequestId, Error, ContextId] = WorkflowTerminateReply {}
}

proxy_message! {
    pub struct WorkflowGetHistoryRequest [RequestId, ContextId] = WorkflowGetHistoryRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
    }
}

proxy_message! {
    pub struct WorkflowGetHistoryReply [RequestId, Error, ContextId] = WorkflowGetHistoryReply {
        history / set_history: json(Vec<HistoryEvent>) = "History",
    }
}

proxy_message! {
    /// Completes an externally completed activity by task token.
    pub struct WorkflowCompleteActivityRequest [RequestId, ContextId]
        = WorkflowCompleteActivityRequest {
        task_token / set_task_token: bytes = "TaskToken",
        domain / set_domain: string = "Domain",
        result / set_result: bytes = "Result",
        /// Set when the activity failed.
        failure / set_failure: json(CadenceError) = "Error",
    }
}

proxy_message! {
    pub struct WorkflowCompleteActivityReply [RequestId, Error, ContextId]
        = WorkflowCompleteActivityReply {}
}

proxy_message! {
    pub struct WorkflowCompleteActivityByIdRequest [RequestId, ContextId]
        = WorkflowCompleteActivityByIdRequest {
        domain / set_domain: string = "Domain",
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        activity_id / set_activity_id: string = "ActivityId",
        result / set_result: bytes = "Result",
        failure / set_failure: json(CadenceError) = "Error",
    }
}

proxy_message! {
    pub struct WorkflowCompleteActivityByIdReply [RequestId, Error, ContextId]
        = WorkflowCompleteActivityByIdReply {}
}

proxy_message! {
    pub struct WorkflowRecordActivityHeartbeatRequest [RequestId, ContextId]
        = WorkflowRecordActivityHeartbeatRequest {
        task_token / set_task_token: bytes = "TaskToken",
        domain / set_domain: string = "Domain",
        details / set_details: bytes = "Details",
    }
}

proxy_message! {
    pub struct WorkflowRecordActivityHeartbeatReply [RequestId, Error, ContextId]
        = WorkflowRecordActivityHeartbeatReply {}
}

proxy_message! {
    pub struct WorkflowRecordActivityHeartbeatByIdRequest [RequestId, ContextId]
        = WorkflowRecordActivityHeartbeatByIdRequest {
        domain / set_domain: string = "Domain",
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        activity_id / set_activity_id: string = "ActivityId",
        details / set_details: bytes = "Details",
    }
}

proxy_message! {
    pub struct WorkflowRecordActivityHeartbeatByIdReply [RequestId, Error, ContextId]
        = WorkflowRecordActivityHeartbeatByIdReply {}
}

proxy_message! {
    pub struct WorkflowListClosedExecutionsRequest [RequestId, ContextId]
        = WorkflowListClosedExecutionsRequest {
        domain / set_domain: string = "Domain",
        maximum_page_size / set_maximum_page_size: int = "MaximumPageSize",
    }
}

proxy_message! {
    pub struct WorkflowListClosedExecutionsReply [RequestId, Error, ContextId]
        = WorkflowListClosedExecutionsReply {
        executions / set_executions: json(Vec<WorkflowExecutionInfo>) = "Executions",
    }
}

proxy_message! {
    pub struct WorkflowListOpenExecutionsRequest [RequestId, ContextId]
        = WorkflowListOpenExecutionsRequest {
        domain / set_domain: string = "Domain",
        maximum_page_size / set_maximum_page_size: int = "MaximumPageSize",
    }
}

proxy_message! {
    pub struct WorkflowListOpenExecutionsReply [RequestId, Error, ContextId]
        = WorkflowListOpenExecutionsReply {
        executions / set_executions: json(Vec<WorkflowExecutionInfo>) = "Executions",
    }
}

proxy_message! {
    pub struct WorkflowQueryRequest [RequestId, ContextId] = WorkflowQueryRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
        query_name / set_query_name: string = "QueryName",
        query_args / set_query_args: bytes = "QueryArgs",
    }
}

proxy_message! {
    pub struct WorkflowQueryReply [RequestId, Error, ContextId] = WorkflowQueryReply {
        result / set_result: bytes = "Result",
    }
}

proxy_message! {
    pub struct WorkflowDescribeExecutionRequest [RequestId, ContextId]
        = WorkflowDescribeExecutionRequest {
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        domain / set_domain: string = "Domain",
    }
}

proxy_message! {
    pub struct WorkflowDescribeExecutionReply [RequestId, Error, ContextId]
        = WorkflowDescribeExecutionReply {
        details / set_details: json(WorkflowDescription) = "Details",
    }
}

proxy_message! {
    /// Reserved. The proxy answers it with an error.
    pub struct WorkflowDescribeTaskListRequest [RequestId, ContextId]
        = WorkflowDescribeTaskListRequest {
        task_list / set_task_list: string = "TaskList",
        task_list_type / set_task_list_type: int = "TaskListType",
    }
}

proxy_message! {
    pub struct WorkflowDescribeTaskListReply [RequestId, Error, ContextId]
        = WorkflowDescribeTaskListReply {}
}

proxy_message! {
    /// Runs workflow code on the library.
    pub struct WorkflowInvokeRequest [RequestId, ContextId] = WorkflowInvokeRequest {
        name / set_name: string = "Name",
        args / set_args: bytes = "Args",
        domain / set_domain: string = "Domain",
        workflow_id / set_workflow_id: string = "WorkflowId",
        run_id / set_run_id: string = "RunId",
        task_list / set_task_list: string = "TaskList",
    }
}

proxy_message! {
    pub struct WorkflowInvokeReply [RequestId, Error, ContextId] = WorkflowInvokeReply {
        result / set_result: bytes = "Result",
        continue_as_new / set_continue_as_new: bool = "ContinueAsNew",
        continue_as_new_args / set_continue_as_new_args: bytes = "ContinueAsNewArgs",
    }
}

proxy_message! {
    pub struct WorkflowExecuteChildRequest [RequestId, ContextId] = WorkflowExecuteChildRequest {
        workflow / set_workflow: string = "Workflow",
        args / set_args: bytes = "Args",
        options / set_options: json(WorkflowOptions) = "Options",
    }
}

proxy_message! {
    pub struct WorkflowExecuteChildReply [RequestId, Error, ContextId] = WorkflowExecuteChildReply {
        /// Context id allocated for the child execution.
        child_id / set_child_id: long = "ChildId",
        execution / set_execution: json(WorkflowExecution) = "Execution",
    }
}

proxy_message! {
    pub struct WorkflowSignalSubscribeRequest [RequestId, ContextId]
        = WorkflowSignalSubscribeRequest {
        signal_name / set_signal_name: string = "SignalName",
    }
}

proxy_message! {
    pub struct WorkflowSignalSubscribeReply [RequestId, Error, ContextId]
        = WorkflowSignalSubscribeReply {}
}

proxy_message! {
    /// Delivers a subscribed signal to the library.
    pub struct WorkflowSignalReceivedRequest [RequestId, ContextId]
        = WorkflowSignalReceivedRequest {
        signal_name / set_signal_name: string = "SignalName",
        signal_args / set_signal_args: bytes = "SignalArgs",
    }
}

proxy_message! {
    pub struct WorkflowSignalReceivedReply [RequestId, Error, ContextId]
        = WorkflowSignalReceivedReply {}
}

proxy_message! {
    /// Records a side effect value; the first value recorded for an id wins.
    pub struct WorkflowMutableRequest [RequestId, ContextId] = WorkflowMutableRequest {
        mutable_id / set_mutable_id: string = "MutableId",
        result / set_result: bytes = "Result",
    }
}

proxy_message! {
    pub struct WorkflowMutableReply [RequestId, Error, ContextId] = WorkflowMutableReply {
        result / set_result: bytes = "Result",
    }
}

proxy_message! {
    pub struct WorkflowMutableInvokeRequest [RequestId, ContextId] = WorkflowMutableInvokeRequest {
        mutable_id / set_mutable_id: string = "MutableId",
    }
}

proxy_message! {
    pub struct WorkflowMutableInvokeReply [RequestId, Error, ContextId]
        = WorkflowMutableInvokeReply {
        result / set_result: bytes = "Result",
    }
}

proxy_message! {
    pub struct WorkflowCountRequest [RequestId, ContextId] = WorkflowCountRequest {
        domain / set_domain: string = "Domain",
        query / set_query: string = "Query",
    }
}

proxy_message! {
    pub struct WorkflowCountReply [RequestId, Error, ContextId] = WorkflowCountReply {
        count / set_count: long = "Count",
    }
}
