use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Every message kind that may cross the proxy boundary.
///
/// The numeric codes are part of the wire contract and must never change.
/// Note that `WorkflowSetCacheSizeRequest/Reply` live at 23/24 even though
/// they are workflow messages; treat the codes as an explicit table rather
/// than as contiguous ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, EnumString, AsRefStr, Display)]
#[repr(i32)]
pub enum MessageType {
    /// Unspecified type. Never valid on the wire.
    #[default]
    Unspecified = 0,

    // ---------------------------------------------------------------------
    // Global messages

    InitializeRequest = 1,
    InitializeReply = 2,
    ConnectRequest = 3,
    ConnectReply = 4,
    TerminateRequest = 5,
    TerminateReply = 6,
    DomainRegisterRequest = 7,
    DomainRegisterReply = 8,
    DomainDescribeRequest = 9,
    DomainDescribeReply = 10,
    DomainUpdateRequest = 11,
    DomainUpdateReply = 12,
    HeartbeatRequest = 13,
    HeartbeatReply = 14,
    CancelRequest = 15,
    CancelReply = 16,
    NewWorkerRequest = 17,
    NewWorkerReply = 18,
    StopWorkerRequest = 19,
    StopWorkerReply = 20,
    PingRequest = 21,
    PingReply = 22,
    WorkflowSetCacheSizeRequest = 23,
    WorkflowSetCacheSizeReply = 24,

    // ---------------------------------------------------------------------
    // Workflow messages

    WorkflowRegisterRequest = 100,
    WorkflowRegisterReply = 101,
    WorkflowExecuteRequest = 102,
    WorkflowExecuteReply = 103,
    WorkflowSignalRequest = 104,
    WorkflowSignalReply = 105,
    WorkflowSignalWithStartRequest = 106,
    WorkflowSignalWithStartReply = 107,
    WorkflowCancelRequest = 108,
    WorkflowCancelReply = 109,
    WorkflowTerminateRequest = 110,
    WorkflowTerminateReply = 111,
    WorkflowGetHistoryRequest = 112,
    WorkflowGetHistoryReply = 113,
    WorkflowCompleteActivityRequest = 114,
    WorkflowCompleteActivityReply = 115,
    WorkflowCompleteActivityByIdRequest = 116,
    WorkflowCompleteActivityByIdReply = 117,
    WorkflowRecordActivityHeartbeatRequest = 118,
    WorkflowRecordActivityHeartbeatReply = 119,
    WorkflowRecordActivityHeartbeatByIdRequest = 120,
    WorkflowRecordActivityHeartbeatByIdReply = 121,
    WorkflowListClosedExecutionsRequest = 122,
    WorkflowListClosedExecutionsReply = 123,
    WorkflowListOpenExecutionsRequest = 124,
    WorkflowListOpenExecutionsReply = 125,
    WorkflowQueryRequest = 126,
    WorkflowQueryReply = 127,
    WorkflowDescribeExecutionRequest = 128,
    WorkflowDescribeExecutionReply = 129,
    /// Reserved, not implemented by the proxy.
    WorkflowDescribeTaskListRequest = 130,
    /// Reserved, not implemented by the proxy.
    WorkflowDescribeTaskListReply = 131,
    WorkflowInvokeRequest = 132,
    WorkflowInvokeReply = 133,
    WorkflowExecuteChildRequest = 134,
    WorkflowExecuteChildReply = 135,
    WorkflowSignalSubscribeRequest = 136,
    WorkflowSignalSubscribeReply = 137,
    WorkflowSignalReceivedRequest = 138,
    WorkflowSignalReceivedReply = 139,
    WorkflowMutableRequest = 140,
    WorkflowMutableReply = 141,
    WorkflowMutableInvokeRequest = 142,
    WorkflowMutableInvokeReply = 143,
    WorkflowCountRequest = 144,
    WorkflowCountReply = 145,

    // ---------------------------------------------------------------------
    // Activity messages

    ActivityInvokeRequest = 200,
    ActivityInvokeReply = 201,
    ActivityGetHeartbeatDetailsRequest = 202,
    ActivityGetHeartbeatDetailsReply = 203,
    ActivityLogRequest = 204,
    ActivityLogReply = 205,
    ActivityRecordHeartbeatRequest = 206,
    ActivityRecordHeartbeatReply = 207,
    ActivityHasHeartbeatDetailsRequest = 208,
    ActivityHasHeartbeatDetailsReply = 209,
    ActivityStopRequest = 210,
    ActivityStopReply = 211,
}

/// Which side originates a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// library --> proxy
    LibraryToProxy,
    /// proxy --> library
    ProxyToLibrary,
    /// Sent by either side.
    Either,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::LibraryToProxy => Direction::ProxyToLibrary,
            Direction::ProxyToLibrary => Direction::LibraryToProxy,
            Direction::Either => Direction::Either,
        }
    }
}

use Direction::*;
use MessageType as M;

/// request, reply, direction of the request.
const PAIRS: &[(MessageType, MessageType, Direction)] = &[
    (M::InitializeRequest, M::InitializeReply, LibraryToProxy),
    (M::ConnectRequest, M::ConnectReply, LibraryToProxy),
    (M::TerminateRequest, M::TerminateReply, LibraryToProxy),
    (M::DomainRegisterRequest, M::DomainRegisterReply, LibraryToProxy),
    (M::DomainDescribeRequest, M::DomainDescribeReply, LibraryToProxy),
    (M::DomainUpdateRequest, M::DomainUpdateReply, LibraryToProxy),
    (M::HeartbeatRequest, M::HeartbeatReply, LibraryToProxy),
    (M::CancelRequest, M::CancelReply, LibraryToProxy),
    (M::NewWorkerRequest, M::NewWorkerReply, LibraryToProxy),
    (M::StopWorkerRequest, M::StopWorkerReply, LibraryToProxy),
    (M::PingRequest, M::PingReply, Either),
    (M::WorkflowSetCacheSizeRequest, M::WorkflowSetCacheSizeReply, LibraryToProxy),
    (M::WorkflowRegisterRequest, M::WorkflowRegisterReply, LibraryToProxy),
    (M::WorkflowExecuteRequest, M::WorkflowExecuteReply, LibraryToProxy),
    (M::WorkflowSignalRequest, M::WorkflowSignalReply, LibraryToProxy),
    (M::WorkflowSignalWithStartRequest, M::WorkflowSignalWithStartReply, LibraryToProxy),
    (M::WorkflowCancelRequest, M::WorkflowCancelReply, LibraryToProxy),
    (M::WorkflowTerminateRequest, M::WorkflowTerminateReply, LibraryToProxy),
    (M::WorkflowGetHistoryRequest, M::WorkflowGetHistoryReply, LibraryToProxy),
    (M::WorkflowCompleteActivityRequest, M::WorkflowCompleteActivityReply, LibraryToProxy),
    (M::WorkflowCompleteActivityByIdRequest, M::WorkflowCompleteActivityByIdReply, LibraryToProxy),
    (
        M::WorkflowRecordActivityHeartbeatRequest,
        M::WorkflowRecordActivityHeartbeatReply,
        LibraryToProxy,
    ),
    (
        M::WorkflowRecordActivityHeartbeatByIdRequest,
        M::WorkflowRecordActivityHeartbeatByIdReply,
        LibraryToProxy,
    ),
    (M::WorkflowListClosedExecutionsRequest, M::WorkflowListClosedExecutionsReply, LibraryToProxy),
    (M::WorkflowListOpenExecutionsRequest, M::WorkflowListOpenExecutionsReply, LibraryToProxy),
    (M::WorkflowQueryRequest, M::WorkflowQueryReply, LibraryToProxy),
    (M::WorkflowDescribeExecutionRequest, M::WorkflowDescribeExecutionReply, LibraryToProxy),
    (M::WorkflowDescribeTaskListRequest, M::WorkflowDescribeTaskListReply, LibraryToProxy),
    (M::WorkflowInvokeRequest, M::WorkflowInvokeReply, ProxyToLibrary),
    (M::WorkflowExecuteChildRequest, M::WorkflowExecuteChildReply, LibraryToProxy),
    (M::WorkflowSignalSubscribeRequest, M::WorkflowSignalSubscribeReply, LibraryToProxy),
    (M::WorkflowSignalReceivedRequest, M::WorkflowSignalReceivedReply, ProxyToLibrary),
    (M::WorkflowMutableRequest, M::WorkflowMutableReply, LibraryToProxy),
    (M::WorkflowMutableInvokeRequest, M::WorkflowMutableInvokeReply, ProxyToLibrary),
    (M::WorkflowCountRequest, M::WorkflowCountReply, LibraryToProxy),
    (M::ActivityInvokeRequest, M::ActivityInvokeReply, ProxyToLibrary),
    (M::ActivityGetHeartbeatDetailsRequest, M::ActivityGetHeartbeatDetailsReply, LibraryToProxy),
    (M::ActivityLogRequest, M::ActivityLogReply, LibraryToProxy),
    (M::ActivityRecordHeartbeatRequest, M::ActivityRecordHeartbeatReply, LibraryToProxy),
    (M::ActivityHasHeartbeatDetailsRequest, M::ActivityHasHeartbeatDetailsReply, LibraryToProxy),
    (M::ActivityStopRequest, M::ActivityStopReply, LibraryToProxy),
];

impl MessageType {
    /// The wire code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a wire code back to its type. `None` for codes outside the table.
    pub fn from_code(code: i32) -> Option<MessageType> {
        let ty = match code {
            0 => M::Unspecified,
            1 => M::InitializeRequest,
            2 => M::InitializeReply,
            3 => M::ConnectRequest,
            4 => M::ConnectReply,
            5 => M::TerminateRequest,
            6 => M::TerminateReply,
            7 => M::DomainRegisterRequest,
            8 => M::DomainRegisterReply,
            9 => M::DomainDescribeRequest,
            10 => M::DomainDescribeReply,
            11 => M::DomainUpdateRequest,
            12 => M::DomainUpdateReply,
            13 => M::HeartbeatRequest,
            14 => M::HeartbeatReply,
            15 => M::CancelRequest,
            16 => M::CancelReply,
            17 => M::NewWorkerRequest,
            18 => M::NewWorkerReply,
            19 => M::StopWorkerRequest,
            20 => M::StopWorkerReply,
            21 => M::PingRequest,
            22 => M::PingReply,
            23 => M::WorkflowSetCacheSizeRequest,
            24 => M::WorkflowSetCacheSizeReply,
            100 => M::WorkflowRegisterRequest,
            101 => M::WorkflowRegisterReply,
            102 => M::WorkflowExecuteRequest,
            103 => M::WorkflowExecuteReply,
            104 => M::WorkflowSignalRequest,
            105 => M::WorkflowSignalReply,
            106 => M::WorkflowSignalWithStartRequest,
            107 => M::WorkflowSignalWithStartReply,
            108 => M::WorkflowCancelRequest,
            109 => M::WorkflowCancelReply,
            110 => M::WorkflowTerminateRequest,
            111 => M::WorkflowTerminateReply,
            112 => M::WorkflowGetHistoryRequest,
            113 => M::WorkflowGetHistoryReply,
            114 => M::WorkflowCompleteActivityRequest,
            115 => M::WorkflowCompleteActivityReply,
            116 => M::WorkflowCompleteActivityByIdRequest,
            117 => M::WorkflowCompleteActivityByIdReply,
            118 => M::WorkflowRecordActivityHeartbeatRequest,
            119 => M::WorkflowRecordActivityHeartbeatReply,
            120 => M::WorkflowRecordActivityHeartbeatByIdRequest,
            121 => M::WorkflowRecordActivityHeartbeatByIdReply,
            122 => M::WorkflowListClosedExecutionsRequest,
            123 => M::WorkflowListClosedExecutionsReply,
            124 => M::WorkflowListOpenExecutionsRequest,
            125 => M::WorkflowListOpenExecutionsReply,
            126 => M::WorkflowQueryRequest,
            127 => M::WorkflowQueryReply,
            128 => M::WorkflowDescribeExecutionRequest,
            129 => M::WorkflowDescribeExecutionReply,
            130 => M::WorkflowDescribeTaskListRequest,
            131 => M::WorkflowDescribeTaskListReply,
            132 => M::WorkflowInvokeRequest,
            133 => M::WorkflowInvokeReply,
            134 => M::WorkflowExecuteChildRequest,
            135 => M::WorkflowExecuteChildReply,
            136 => M::WorkflowSignalSubscribeRequest,
            137 => M::WorkflowSignalSubscribeReply,
            138 => M::WorkflowSignalReceivedRequest,
            139 => M::WorkflowSignalReceivedReply,
            140 => M::WorkflowMutableRequest,
            141 => M::WorkflowMutableReply,
            142 => M::WorkflowMutableInvokeRequest,
            143 => M::WorkflowMutableInvokeReply,
            144 => M::WorkflowCountRequest,
            145 => M::WorkflowCountReply,
            200 => M::ActivityInvokeRequest,
            201 => M::ActivityInvokeReply,
            202 => M::ActivityGetHeartbeatDetailsRequest,
            203 => M::ActivityGetHeartbeatDetailsReply,
            204 => M::ActivityLogRequest,
            205 => M::ActivityLogReply,
            206 => M::ActivityRecordHeartbeatRequest,
            207 => M::ActivityRecordHeartbeatReply,
            208 => M::ActivityHasHeartbeatDetailsRequest,
            209 => M::ActivityHasHeartbeatDetailsReply,
            210 => M::ActivityStopRequest,
            211 => M::ActivityStopReply,
            _ => return None,
        };
        Some(ty)
    }

    /// The reply answering this request, `None` when `self` is not a request.
    pub fn reply_type(self) -> Option<MessageType> {
        PAIRS
            .iter()
            .find(|(request, _, _)| *request == self)
            .map(|(_, reply, _)| *reply)
    }

    /// The request this reply answers, `None` when `self` is not a reply.
    pub fn request_type(self) -> Option<MessageType> {
        PAIRS
            .iter()
            .find(|(_, reply, _)| *reply == self)
            .map(|(request, _, _)| *request)
    }

    pub fn is_request(self) -> bool {
        self.reply_type().is_some()
    }

    pub fn is_reply(self) -> bool {
        self.request_type().is_some()
    }

    /// Who sends this message. `None` for `Unspecified`.
    pub fn direction(self) -> Option<Direction> {
        PAIRS.iter().find_map(|(request, reply, direction)| {
            if *request == self {
                Some(*direction)
            } else if *reply == self {
                Some(direction.reverse())
            } else {
                None
            }
        })
    }
}
