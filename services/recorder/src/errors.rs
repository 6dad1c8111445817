//! Task error taxonomy.
//!
//! Mirrors the recoverable/unrecoverable split the supervisor loop (see
//! [`crate::task`]) dispatches on: recoverable errors restart the smallest
//! enclosing loop, unrecoverable ones stop the task outright.

use std::fmt;

/// Exhaustive set of ways a recording task can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    GetRoomInfo,
    GetLiveInfo,
    GetDanmakuServerInfo,
    StreamCopy,
    LiveEnded,
    DanmakuServerConnection,
    Heartbeat,
    DanmakuExchangeRead,
    InitialLiveStatus,
    RecoverLiveStatusChecker,
    FileCreation,
    InvalidLiveInfo,
    InvalidAuthProtocol,
    MessageDecompression,
    JsonDecode,
    LiveStatusWatch,
    Unknown,
}

impl TaskErrorKind {
    /// Whether the supervisor should restart on this kind, vs. stop the task.
    pub fn is_recoverable(self) -> bool {
        use TaskErrorKind::*;
        matches!(
            self,
            GetRoomInfo
                | GetLiveInfo
                | GetDanmakuServerInfo
                | StreamCopy
                | LiveEnded
                | DanmakuServerConnection
                | Heartbeat
                | DanmakuExchangeRead
                | InitialLiveStatus
                | RecoverLiveStatusChecker
        )
    }
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskErrorKind::GetRoomInfo => "GetRoomInfo",
            TaskErrorKind::GetLiveInfo => "GetLiveInfo",
            TaskErrorKind::GetDanmakuServerInfo => "GetDanmakuServerInfo",
            TaskErrorKind::StreamCopy => "StreamCopy",
            TaskErrorKind::LiveEnded => "LiveEnded",
            TaskErrorKind::DanmakuServerConnection => "DanmakuServerConnection",
            TaskErrorKind::Heartbeat => "Heartbeat",
            TaskErrorKind::DanmakuExchangeRead => "DanmakuExchangeRead",
            TaskErrorKind::InitialLiveStatus => "InitialLiveStatus",
            TaskErrorKind::RecoverLiveStatusChecker => "RecoverLiveStatusChecker",
            TaskErrorKind::FileCreation => "FileCreation",
            TaskErrorKind::InvalidLiveInfo => "InvalidLiveInfo",
            TaskErrorKind::InvalidAuthProtocol => "InvalidAuthProtocol",
            TaskErrorKind::MessageDecompression => "MessageDecompression",
            TaskErrorKind::JsonDecode => "JsonDecode",
            TaskErrorKind::LiveStatusWatch => "LiveStatusWatch",
            TaskErrorKind::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// A classified task failure, with an optional underlying cause.
#[derive(Debug)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind) -> Self {
        TaskError { kind, cause: None }
    }

    pub fn with_cause(
        kind: TaskErrorKind,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TaskError {
            kind,
            cause: Some(cause.into()),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.kind, cause),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Outcome of one suspension point: either the operation completed (possibly
/// with an error) or the enclosing scope was cancelled first. Kept distinct
/// from `TaskError` so cancellation always takes precedence over
/// classification.
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_ended_is_recoverable_and_drives_restart() {
        assert!(TaskErrorKind::LiveEnded.is_recoverable());
    }

    #[test]
    fn invalid_auth_protocol_is_unrecoverable() {
        assert!(!TaskErrorKind::InvalidAuthProtocol.is_recoverable());
    }

    #[test]
    fn unknown_defaults_to_unrecoverable() {
        assert!(!TaskErrorKind::Unknown.is_recoverable());
    }

    #[test]
    fn display_includes_cause_when_present() {
        let err = TaskError::with_cause(TaskErrorKind::FileCreation, std::io::Error::other("disk full"));
        let s = err.to_string();
        assert!(s.contains("FileCreation"));
        assert!(s.contains("disk full"));
    }
}
