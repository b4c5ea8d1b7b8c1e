// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Status codes attached to call termination
//!
//! The code set mirrors gRPC so that callers can reuse familiar semantics.

use std::fmt;
use std::sync::OnceLock;

/// gRPC status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Code {
    /// Success
    #[default]
    Ok = 0,
    /// The operation was cancelled
    Cancelled = 1,
    /// Unknown error
    Unknown = 2,
    /// Client specified an invalid argument
    InvalidArgument = 3,
    /// Deadline expired before operation could complete
    DeadlineExceeded = 4,
    /// Some requested entity was not found
    NotFound = 5,
    /// Some entity that we attempted to create already exists
    AlreadyExists = 6,
    /// The caller does not have permission to execute the specified operation
    PermissionDenied = 7,
    /// Some resource has been exhausted
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation's execution
    FailedPrecondition = 9,
    /// The operation was aborted
    Aborted = 10,
    /// Operation was attempted past the valid range
    OutOfRange = 11,
    /// Operation is not implemented or not supported
    Unimplemented = 12,
    /// Internal errors
    Internal = 13,
    /// The service is currently unavailable
    Unavailable = 14,
    /// Unrecoverable data loss or corruption
    DataLoss = 15,
    /// The request does not have valid authentication credentials
    Unauthenticated = 16,
}

impl Code {
    /// Returns true if this is a success code
    pub fn is_ok(&self) -> bool {
        matches!(self, Code::Ok)
    }

    /// Returns true if this is an error code
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Convert from i32
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Code::Ok),
            1 => Some(Code::Cancelled),
            2 => Some(Code::Unknown),
            3 => Some(Code::InvalidArgument),
            4 => Some(Code::DeadlineExceeded),
            5 => Some(Code::NotFound),
            6 => Some(Code::AlreadyExists),
            7 => Some(Code::PermissionDenied),
            8 => Some(Code::ResourceExhausted),
            9 => Some(Code::FailedPrecondition),
            10 => Some(Code::Aborted),
            11 => Some(Code::OutOfRange),
            12 => Some(Code::Unimplemented),
            13 => Some(Code::Internal),
            14 => Some(Code::Unavailable),
            15 => Some(Code::DataLoss),
            16 => Some(Code::Unauthenticated),
            _ => None,
        }
    }

    /// Convert to i32
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Get the string representation of this code
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> i32 {
        code.as_i32()
    }
}

/// Outcome of a call: a code plus an optional human readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: Option<String>,
}

impl Status {
    /// Create a new status
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Create a status with just a code
    pub fn with_code(code: Code) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Rebuild a status received on the wire. Unknown codes collapse to
    /// `Unknown` so that a newer peer never crashes an older one.
    pub fn from_wire(code: i32, message: Option<String>) -> Self {
        Self {
            code: Code::from_i32(code).unwrap_or(Code::Unknown),
            message,
        }
    }

    /// Create a success status
    pub fn ok() -> Self {
        Self::with_code(Code::Ok)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Get the status code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Get the status message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if this is a success status
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// Returns true if this is an error status
    pub fn is_err(&self) -> bool {
        self.code.is_err()
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status {{ code: {}", self.code)?;
        if let Some(msg) = &self.message {
            write!(f, ", message: \"{}\"", msg)?;
        }
        write!(f, " }}")
    }
}

impl std::error::Error for Status {}

impl From<Code> for Status {
    fn from(code: Code) -> Self {
        Self::with_code(code)
    }
}

/// Terminal status slot of a single call.
///
/// A call ends with exactly one status: the first `set` wins and any later
/// attempt hands the rejected status back to the caller.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: OnceLock<Status>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: Status) -> Result<(), Status> {
        self.inner.set(status)
    }

    pub fn get(&self) -> Option<&Status> {
        self.inner.get()
    }

    pub fn is_set(&self) -> bool {
        self.inner.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_conversions() {
        assert_eq!(Code::Ok.as_i32(), 0);
        assert_eq!(Code::Internal.as_i32(), 13);
        assert_eq!(Code::from_i32(0), Some(Code::Ok));
        assert_eq!(Code::from_i32(13), Some(Code::Internal));
        assert_eq!(Code::from_i32(999), None);
        for value in 0..=16 {
            assert_eq!(Code::from_i32(value).map(i32::from), Some(value));
        }
    }

    #[test]
    fn test_code_display() {
        assert_eq!(Code::Ok.to_string(), "OK");
        assert_eq!(Code::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(Code::DeadlineExceeded.to_string(), "DEADLINE_EXCEEDED");
    }

    #[test]
    fn test_status_creation() {
        let status = Status::ok();
        assert_eq!(status.code(), Code::Ok);
        assert!(status.is_ok());
        assert_eq!(status.message(), None);

        let status = Status::internal("test error");
        assert_eq!(status.code(), Code::Internal);
        assert!(status.is_err());
        assert_eq!(status.message(), Some("test error"));
    }

    #[test]
    fn test_status_from_wire_unknown_code() {
        let status = Status::from_wire(42, Some("future".to_string()));
        assert_eq!(status.code(), Code::Unknown);
        assert_eq!(status.message(), Some("future"));

        let status = Status::from_wire(5, None);
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::ok().to_string(), "Status { code: OK }");
        assert_eq!(
            Status::invalid_argument("bad").to_string(),
            "Status { code: INVALID_ARGUMENT, message: \"bad\" }"
        );
    }

    #[test]
    fn test_status_cell_set_once() {
        let cell = StatusCell::new();
        assert!(!cell.is_set());

        cell.set(Status::not_found("missing")).unwrap();
        let rejected = cell.set(Status::ok()).unwrap_err();

        assert_eq!(rejected, Status::ok());
        assert_eq!(cell.get().map(Status::code), Some(Code::NotFound));
    }
}
