//! # Error Types
//!
//! Status codes and error handling for the LIPC core.
//!
//! Every fallible operation returns [`Result<T>`], whose error side is a
//! [`LipcError`]. Each error maps onto exactly one [`LipcCode`], the numeric
//! status taxonomy shared with remote peers, so callers can branch on the
//! specific failure instead of a catch-all.
//!
//! ## Error Categories
//! - **Addressing**: unknown services, properties or parameters
//! - **Access**: access-mode violations, anonymous handles, closed handles
//! - **Protocol**: buffer renegotiation, timeouts, oversized payloads
//! - **Property callbacks**: the `0x100` sub-taxonomy reported by getters/setters
//! - **Persistence**: corrupt hash-array streams and I/O failures
//!
//! ## Example Usage
//! ```rust
//! use lipc::error::{LipcCode, LipcError};
//!
//! let err = LipcError::AccessNotAllowed;
//! assert_eq!(err.code(), LipcCode::AccessNotAllowed);
//! assert_eq!(LipcCode::Ok.as_str(), "lipcErrNone");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Lock-related error messages
    pub const ERR_REGISTRY_LOCK: &str = "Failed to acquire lock on property registry";
    pub const ERR_DISPATCHER_LOCK: &str = "Failed to acquire lock on subscription dispatcher";
    pub const ERR_HASHARRAY_LOCK: &str = "Failed to acquire lock on hash-array storage";
    pub const ERR_BUS_LOCK: &str = "Failed to acquire lock on bus routing table";

    /// Property protocol errors
    pub const ERR_RENEGOTIATION_EXHAUSTED: &str =
        "String getter requested more buffer space after renegotiation";
    pub const ERR_INT_GETTER_BUFFER: &str = "Integer getter reported a buffer size problem";

    /// Persistence errors
    pub const ERR_INVALID_MAGIC: &str = "Invalid hash-array magic bytes";
    pub const ERR_TRUNCATED: &str = "Unexpected end of hash-array stream";
    pub const ERR_TRAILING_BYTES: &str = "Trailing bytes after hash-array stream";
    pub const ERR_INVALID_UTF8: &str = "Text is not valid UTF-8";

    /// Transport errors
    pub const ERR_ENDPOINT_GONE: &str = "Endpoint disconnected from the bus";
    pub const ERR_REPLY_DROPPED: &str = "Reply slot dropped before a reply arrived";
}

/// Numeric status codes shared with remote peers.
///
/// The values match the LIPC status enumeration, including the property
/// callback sub-taxonomy starting at `0x100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LipcCode {
    Ok = 0,
    Unknown = 1,
    Internal = 2,
    NoSuchSource = 3,
    OperationNotSupported = 4,
    OutOfMemory = 5,
    SubscriptionFailed = 6,
    NoSuchParam = 7,
    NoSuchProperty = 8,
    AccessNotAllowed = 9,
    BufferTooSmall = 10,
    InvalidHandle = 11,
    InvalidArg = 12,
    OperationNotAllowed = 13,
    ParamsSizeExceeded = 14,
    Timeout = 15,
    ServiceNameTooLong = 16,
    DuplicateServiceName = 17,
    InitTransport = 18,
    PropInvalidState = 0x100,
    PropNotInitialized = 0x101,
    PropInternal = 0x102,
}

impl LipcCode {
    /// Decode a raw status value. Values outside the taxonomy become `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => LipcCode::Ok,
            1 => LipcCode::Unknown,
            2 => LipcCode::Internal,
            3 => LipcCode::NoSuchSource,
            4 => LipcCode::OperationNotSupported,
            5 => LipcCode::OutOfMemory,
            6 => LipcCode::SubscriptionFailed,
            7 => LipcCode::NoSuchParam,
            8 => LipcCode::NoSuchProperty,
            9 => LipcCode::AccessNotAllowed,
            10 => LipcCode::BufferTooSmall,
            11 => LipcCode::InvalidHandle,
            12 => LipcCode::InvalidArg,
            13 => LipcCode::OperationNotAllowed,
            14 => LipcCode::ParamsSizeExceeded,
            15 => LipcCode::Timeout,
            16 => LipcCode::ServiceNameTooLong,
            17 => LipcCode::DuplicateServiceName,
            18 => LipcCode::InitTransport,
            0x100 => LipcCode::PropInvalidState,
            0x101 => LipcCode::PropNotInitialized,
            0x102 => LipcCode::PropInternal,
            _ => LipcCode::Unknown,
        }
    }

    /// Raw numeric value of the code
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Error string as reported by the reference library
    pub fn as_str(self) -> &'static str {
        match self {
            LipcCode::Ok => "lipcErrNone",
            LipcCode::Unknown => "lipcErrUnknown",
            LipcCode::Internal => "lipcErrInternal",
            LipcCode::NoSuchSource => "lipcErrNoSuchSource",
            LipcCode::OperationNotSupported => "lipcErrOperationNotSupported",
            LipcCode::OutOfMemory => "lipcErrOutOfMemory",
            LipcCode::SubscriptionFailed => "lipcErrSubscriptionFailed",
            LipcCode::NoSuchParam => "lipcErrNoSuchParam",
            LipcCode::NoSuchProperty => "lipcErrNoSuchProperty",
            LipcCode::AccessNotAllowed => "lipcErrAccessNotAllowed",
            LipcCode::BufferTooSmall => "lipcErrBufferTooSmall",
            LipcCode::InvalidHandle => "lipcErrInvalidHandle",
            LipcCode::InvalidArg => "lipcErrInvalidArg",
            LipcCode::OperationNotAllowed => "lipcErrOperationNotAllowed",
            LipcCode::ParamsSizeExceeded => "lipcErrParamsSizeExceeded",
            LipcCode::Timeout => "lipcErrTimedOut",
            LipcCode::ServiceNameTooLong => "lipcErrServiceNameTooLong",
            LipcCode::DuplicateServiceName => "lipcErrDuplicateServiceName",
            LipcCode::InitTransport => "lipcErrInitDbus",
            LipcCode::PropInvalidState => "lipcPropErrInvalidState",
            LipcCode::PropNotInitialized => "lipcPropErrNotInitialized",
            LipcCode::PropInternal => "lipcPropErrInternal",
        }
    }
}

impl fmt::Display for LipcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// LipcError is the primary error type for all LIPC operations
#[derive(Error, Debug)]
pub enum LipcError {
    #[error("Unknown error")]
    Unknown,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("No such source")]
    NoSuchSource,

    #[error("Operation not supported")]
    OperationNotSupported,

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Subscription failed")]
    SubscriptionFailed,

    #[error("No such parameter")]
    NoSuchParam,

    #[error("No such property")]
    NoSuchProperty,

    #[error("Access not allowed")]
    AccessNotAllowed,

    #[error("Buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("Invalid handle")]
    InvalidHandle,

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Operation not allowed")]
    OperationNotAllowed,

    #[error("Parameters size exceeded: {0} bytes")]
    ParamsSizeExceeded(usize),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Service name too long: {0} bytes")]
    ServiceNameTooLong(usize),

    #[error("Duplicate service name: {0}")]
    DuplicateServiceName(String),

    #[error("Transport initialization failed: {0}")]
    InitTransport(String),

    #[error("Property callback in invalid state")]
    PropInvalidState,

    #[error("Property callback not initialized")]
    PropNotInitialized,

    #[error("Property callback internal error")]
    PropInternal,

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LipcError {
    /// Status code reported for this error
    pub fn code(&self) -> LipcCode {
        match self {
            LipcError::Unknown => LipcCode::Unknown,
            LipcError::Internal(_) => LipcCode::Internal,
            LipcError::NoSuchSource => LipcCode::NoSuchSource,
            LipcError::OperationNotSupported => LipcCode::OperationNotSupported,
            LipcError::OutOfMemory => LipcCode::OutOfMemory,
            LipcError::SubscriptionFailed => LipcCode::SubscriptionFailed,
            LipcError::NoSuchParam => LipcCode::NoSuchParam,
            LipcError::NoSuchProperty => LipcCode::NoSuchProperty,
            LipcError::AccessNotAllowed => LipcCode::AccessNotAllowed,
            LipcError::BufferTooSmall { .. } => LipcCode::BufferTooSmall,
            LipcError::InvalidHandle => LipcCode::InvalidHandle,
            LipcError::InvalidArg(_) => LipcCode::InvalidArg,
            LipcError::OperationNotAllowed => LipcCode::OperationNotAllowed,
            LipcError::ParamsSizeExceeded(_) => LipcCode::ParamsSizeExceeded,
            LipcError::Timeout => LipcCode::Timeout,
            LipcError::ServiceNameTooLong(_) => LipcCode::ServiceNameTooLong,
            LipcError::DuplicateServiceName(_) => LipcCode::DuplicateServiceName,
            LipcError::InitTransport(_) => LipcCode::InitTransport,
            LipcError::PropInvalidState => LipcCode::PropInvalidState,
            LipcError::PropNotInitialized => LipcCode::PropNotInitialized,
            LipcError::PropInternal => LipcCode::PropInternal,
            LipcError::CorruptData(_) | LipcError::Serialization(_) | LipcError::Io(_) => {
                LipcCode::Internal
            }
            LipcError::Config(_) => LipcCode::InvalidArg,
        }
    }

    /// Shorthand for an `InvalidArg` error
    pub(crate) fn invalid_arg(msg: impl Into<String>) -> Self {
        LipcError::InvalidArg(msg.into())
    }

    /// Shorthand for an `Internal` error
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        LipcError::Internal(msg.into())
    }
}

/// Rebuild an error from a status relayed by a remote peer.
///
/// `Ok` carries no error and is mapped to `Unknown`; callers never convert it.
impl From<LipcCode> for LipcError {
    fn from(code: LipcCode) -> Self {
        match code {
            LipcCode::Ok | LipcCode::Unknown => LipcError::Unknown,
            LipcCode::Internal => LipcError::Internal("remote internal error".to_string()),
            LipcCode::NoSuchSource => LipcError::NoSuchSource,
            LipcCode::OperationNotSupported => LipcError::OperationNotSupported,
            LipcCode::OutOfMemory => LipcError::OutOfMemory,
            LipcCode::SubscriptionFailed => LipcError::SubscriptionFailed,
            LipcCode::NoSuchParam => LipcError::NoSuchParam,
            LipcCode::NoSuchProperty => LipcError::NoSuchProperty,
            LipcCode::AccessNotAllowed => LipcError::AccessNotAllowed,
            LipcCode::BufferTooSmall => LipcError::BufferTooSmall { required: 0 },
            LipcCode::InvalidHandle => LipcError::InvalidHandle,
            LipcCode::InvalidArg => LipcError::InvalidArg("rejected by remote".to_string()),
            LipcCode::OperationNotAllowed => LipcError::OperationNotAllowed,
            LipcCode::ParamsSizeExceeded => LipcError::ParamsSizeExceeded(0),
            LipcCode::Timeout => LipcError::Timeout,
            LipcCode::ServiceNameTooLong => LipcError::ServiceNameTooLong(0),
            LipcCode::DuplicateServiceName => LipcError::DuplicateServiceName(String::new()),
            LipcCode::InitTransport => LipcError::InitTransport("remote".to_string()),
            LipcCode::PropInvalidState => LipcError::PropInvalidState,
            LipcCode::PropNotInitialized => LipcError::PropNotInitialized,
            LipcCode::PropInternal => LipcError::PropInternal,
        }
    }
}

impl From<bincode::Error> for LipcError {
    fn from(err: bincode::Error) -> Self {
        LipcError::Serialization(err.to_string())
    }
}

/// Type alias for Results using LipcError
pub type Result<T> = std::result::Result<T, LipcError>;
