//! Error codes, transport error normalization, and call-site errors.

use core::fmt;

// ============================================================================
// Error codes
// ============================================================================

/// RPC status codes.
///
/// Aligned with gRPC numbering so transports can pass their codes through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Success.
    Ok = 0,
    /// Call was cancelled.
    Cancelled = 1,
    /// Deadline expired before the call completed.
    DeadlineExceeded = 2,
    /// Malformed or out-of-contract request.
    InvalidArgument = 3,
    /// The named entity was not found.
    NotFound = 4,
    /// The entity already exists.
    AlreadyExists = 5,
    /// Caller lacks permission.
    PermissionDenied = 6,
    /// A per-peer or per-call resource limit was hit.
    ResourceExhausted = 7,
    /// System not in a state required for the operation.
    FailedPrecondition = 8,
    /// Aborted, typically due to a concurrency conflict.
    Aborted = 9,
    /// Operation attempted past the valid range.
    OutOfRange = 10,
    /// Method not implemented by the peer.
    Unimplemented = 11,
    /// Internal invariant broken.
    Internal = 12,
    /// Service transiently unavailable.
    Unavailable = 13,
    /// Unrecoverable data loss or corruption.
    DataLoss = 14,
}

impl ErrorCode {
    /// Convert a raw `u32` into a known code. Returns `None` for codes this
    /// version does not know about.
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::DeadlineExceeded,
            3 => Self::InvalidArgument,
            4 => Self::NotFound,
            5 => Self::AlreadyExists,
            6 => Self::PermissionDenied,
            7 => Self::ResourceExhausted,
            8 => Self::FailedPrecondition,
            9 => Self::Aborted,
            10 => Self::OutOfRange,
            11 => Self::Unimplemented,
            12 => Self::Internal,
            13 => Self::Unavailable,
            14 => Self::DataLoss,
            _ => return None,
        })
    }

    /// Human-readable name, for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::ResourceExhausted => "resource exhausted",
            Self::FailedPrecondition => "failed precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out of range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal error",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data loss",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transport errors and their normalized form
// ============================================================================

/// An error as reported by a transport, before normalization.
///
/// Transports differ in what they populate: the code may be absent, and the
/// detail blob is free-form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCallError {
    /// Numeric status code, if the transport supplied one.
    pub code: Option<u32>,
    /// Human-readable message.
    pub message: String,
    /// Transport-specific detail, passed through untouched.
    pub details: Option<String>,
}

impl RawCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            details: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Normalized status delivered as the terminal error of a response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatus {
    pub code: ErrorCode,
    pub message: String,
    /// Preserved verbatim from the transport so consumer retry logic can
    /// inspect it.
    pub details: Option<String>,
}

impl CallStatus {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Map a transport error into the stable status shape.
    ///
    /// Total: an unknown or missing code maps to [`ErrorCode::Internal`];
    /// message and details ride along unchanged.
    pub fn normalize(raw: RawCallError) -> Self {
        let code = raw
            .code
            .and_then(ErrorCode::from_u32)
            .unwrap_or(ErrorCode::Internal);
        Self {
            code,
            message: raw.message,
            details: raw.details,
        }
    }

    /// True when this status denotes a cancelled call, by either the generic
    /// cancellation code or a cancellation message.
    pub fn is_cancellation(&self) -> bool {
        self.code == ErrorCode::Cancelled
            || self.message.eq_ignore_ascii_case("cancelled")
            || self.message.eq_ignore_ascii_case("canceled")
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CallStatus {}

// ============================================================================
// Synchronous call-site errors
// ============================================================================

/// Errors raised at the call site, before a call is opened.
#[derive(Debug)]
pub enum CallError {
    /// No client registered for this service.
    ServiceNotFound { service: String },
    /// The schema has no such method.
    MethodNotFound { method: String },
    /// The argument shape does not match the method's declared shape.
    InvalidRequest {
        method: String,
        reason: &'static str,
    },
    /// The operation is not meaningful for a call-oriented client.
    Unsupported { operation: &'static str },
    /// A normalized status, used when opening the call itself fails.
    Status(CallStatus),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceNotFound { service } => write!(f, "service not found: {service}"),
            Self::MethodNotFound { method } => write!(f, "method not found: {method}"),
            Self::InvalidRequest { method, reason } => {
                write!(f, "invalid request for {method}: {reason}")
            }
            Self::Unsupported { operation } => {
                write!(f, "{operation} is not supported by a call-oriented client")
            }
            Self::Status(status) => write!(f, "{status}"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<CallStatus> for CallError {
    fn from(status: CallStatus) -> Self {
        Self::Status(status)
    }
}

impl From<CallError> for CallStatus {
    fn from(error: CallError) -> Self {
        match error {
            CallError::Status(status) => status,
            other => {
                let code = match &other {
                    CallError::ServiceNotFound { .. } | CallError::MethodNotFound { .. } => {
                        ErrorCode::NotFound
                    }
                    CallError::InvalidRequest { .. } => ErrorCode::InvalidArgument,
                    _ => ErrorCode::Unimplemented,
                };
                CallStatus::new(code, other.to_string())
            }
        }
    }
}
