//! Error types for the provider registry.
//!
//! These cover data-level failures: malformed hashes, keys and payloads,
//! failed signature checks, missing history and storage faults. Consensus
//! rejections of special transactions carry their own reason codes in the
//! chain crate.

use std::io;
use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes.
///
/// - 1xxx: malformed input (client)
/// - 2xxx: missing history (client)
/// - 5xxx: storage faults (server)
/// - 6xxx: encoding faults (server)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    InvalidHash = 1001,
    InvalidKey = 1002,
    InvalidSignature = 1003,
    InvalidPayload = 1004,

    DiffNotFound = 2006,

    StorageRead = 5001,
    StorageWrite = 5002,
    StorageCorruption = 5003,

    Serialization = 6001,
}

impl ErrorCode {
    /// Get the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Check if the caller supplied bad input.
    pub fn is_client_error(self) -> bool {
        (1000..5000).contains(&self.code())
    }

    /// Check if the fault lies with the node.
    pub fn is_server_error(self) -> bool {
        self.code() >= 5000
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Errors raised by the registry crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Hash of the wrong length or not hex.
    #[error("[{code}] invalid hash: {message}")]
    InvalidHash {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bytes that are not a valid public key.
    #[error("[{code}] invalid key: {message}")]
    InvalidKey { code: ErrorCode, message: String },

    /// Missing signature, wrong signer or bad signature.
    #[error("[{code}] signature verification failed")]
    InvalidSignature { code: ErrorCode },

    /// Special-transaction payload that does not decode.
    #[error("[{code}] invalid payload: {message}")]
    InvalidPayload { code: ErrorCode, message: String },

    /// Stored history the registry expected but could not find.
    #[error("[{code}] not found: {message}")]
    NotFound { code: ErrorCode, message: String },

    /// Storage backend failure or inconsistent stored data.
    #[error("[{code}] storage error: {message}")]
    Storage {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Binary encoding failure.
    #[error("[{code}] serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidHash { code, .. }
            | Error::InvalidKey { code, .. }
            | Error::InvalidSignature { code }
            | Error::InvalidPayload { code, .. }
            | Error::NotFound { code, .. }
            | Error::Storage { code, .. }
            | Error::Serialization { code, .. } => *code,
        }
    }

    /// Check if the caller supplied bad input.
    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }

    /// Check if the fault lies with the node.
    pub fn is_server_error(&self) -> bool {
        self.code().is_server_error()
    }

    pub fn invalid_hash(message: impl Into<String>) -> Self {
        Error::InvalidHash {
            code: ErrorCode::InvalidHash,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Error::InvalidKey {
            code: ErrorCode::InvalidKey,
            message: message.into(),
        }
    }

    pub fn invalid_signature() -> Self {
        Error::InvalidSignature {
            code: ErrorCode::InvalidSignature,
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Error::InvalidPayload {
            code: ErrorCode::InvalidPayload,
            message: message.into(),
        }
    }

    /// A diff the block index points at is missing from storage.
    pub fn diff_not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            code: ErrorCode::DiffNotFound,
            message: message.into(),
        }
    }

    /// Read-side or open failure of the backend.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageRead,
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_write(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageWrite,
            message: message.into(),
            source: None,
        }
    }

    /// Stored bytes that decode but contradict each other.
    pub fn corruption(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageCorruption,
            message: message.into(),
            source: None,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization {
            code: ErrorCode::Serialization,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Storage {
            code: ErrorCode::StorageRead,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHash {
            code: ErrorCode::InvalidHash,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}
