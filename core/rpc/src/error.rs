// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::Status;

/// Failures of the transport and framing layers.
///
/// Per-call outcomes are reported as [`Status`]; these errors are converted
/// at the call boundary.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame encoding error: {0}")]
    FrameEncode(#[from] bincode::error::EncodeError),

    #[error("frame decoding error: {0}")]
    FrameDecode(#[from] bincode::error::DecodeError),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("send direction already closed")]
    SendClosed,

    #[error("terminal status already sent")]
    StatusAlreadySent,

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    #[error("server is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, RpcError>;

impl From<RpcError> for Status {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::Io(e) => Status::unavailable(format!("transport error: {}", e)),
            RpcError::Tls(e) => Status::unavailable(format!("tls error: {}", e)),
            RpcError::SendClosed => Status::failed_precondition("send direction already closed"),
            other => Status::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;

    #[test]
    fn test_error_to_status() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(Status::from(RpcError::Io(io)).code(), Code::Unavailable);
        assert_eq!(
            Status::from(RpcError::Config("x".to_string())).code(),
            Code::Internal
        );
        assert_eq!(
            Status::from(RpcError::SendClosed).code(),
            Code::FailedPrecondition
        );
    }
}
