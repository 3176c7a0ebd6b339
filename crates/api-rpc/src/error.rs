//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes. The stable error kind
//! travels in `data.kind` so clients never parse messages.

use contactsync_core::domain::ErrorKind;
use contactsync_core::SyncError;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Serialize;
use thiserror::Error;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const QUEUE_FULL: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const UPSTREAM_ERROR: i32 = 5003;
    pub const FILE_PROCESSING_ERROR: i32 = 5004;
}

#[derive(Debug, Serialize)]
struct ErrorData {
    kind: ErrorKind,
}

/// Server startup failures
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind JSON-RPC server on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Failed to register method {method}: {reason}")]
    Register { method: &'static str, reason: String },
}

fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => code::VALIDATION_ERROR,
        ErrorKind::NotFound => code::NOT_FOUND,
        ErrorKind::QueueFull => code::QUEUE_FULL,
        ErrorKind::Upstream | ErrorKind::RetryFailed => code::UPSTREAM_ERROR,
        ErrorKind::FileProcessing => code::FILE_PROCESSING_ERROR,
        ErrorKind::Timeout | ErrorKind::Abandoned | ErrorKind::Internal => code::INTERNAL_ERROR,
    }
}

/// Convert SyncError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: SyncError) -> ErrorObjectOwned {
    let kind = err.kind();
    ErrorObjectOwned::owned(code_for(kind), err.to_string(), Some(ErrorData { kind }))
}
