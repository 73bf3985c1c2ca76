//! # Error Handling
//!
//! Error types for the bridge and their wire representation.
//!
//! ## Error Taxonomy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR TAXONOMY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (Rust)                      ErrorCode (wire)                     │
//! │  │                                                                      │
//! │  ├── BadArgumentType(name)   ──►   badArgumentType                      │
//! │  ├── MissingSetup            ──►   missingSetup                         │
//! │  ├── MissingApiKey           ──►   missingSetup                         │
//! │  ├── Internal(msg)           ──►   internalBridgeError                  │
//! │  ├── FetcherNotFound(id)     ──►   internalBridgeError                  │
//! │  ├── Serialization(msg)      ──►   internalBridgeError                  │
//! │  ├── Sdk(msg)                ──►   internalSDKError                     │
//! │  ├── Inbox(msg)              ──►   inboxError                           │
//! │  ├── Unknown(msg)            ──►   unknownBridgeError                   │
//! │  │                                                                      │
//! │  └── NotImplemented(action)  ──►   (no code: "not implemented" reply)   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ERROR HANDLING FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Handler (Rust)              Bridge boundary            Host runtime    │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │                                                                         │
//! │  Err(Error) / reject  ──►  BridgeError {code,  ──►  PlatformException   │
//! │                              description, details}                      │
//! │                                                                         │
//! │  Err(NotImplemented)  ──►  Reply::NotImplemented ──► notImplemented()   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::Parameters;
use crate::value::Value;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge
///
/// Errors are `Clone` because a settled promise hands the same error to
/// every failure callback registered on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ========================================================================
    // Caller errors
    // ========================================================================
    /// A required parameter is missing or has the wrong shape
    #[error("Required parameter '{0}' missing or of wrong type")]
    BadArgumentType(String),

    /// The bridge was used before setup succeeded
    #[error("The bridge has not been set up. Call setup() with a valid API key before using it.")]
    MissingSetup,

    /// Setup was attempted without a usable API key
    #[error("Could not set up the bridge: no API key configured, or the API key is blank.")]
    MissingApiKey,

    // ========================================================================
    // Bridge errors
    // ========================================================================
    /// An invariant inside the bridge was violated
    #[error("Internal bridge error: {0}")]
    Internal(String),

    /// A fetcher id did not match any live fetcher
    #[error("The native inbox fetcher '{0}' could not be found. Was it released and used afterwards?")]
    FetcherNotFound(String),

    /// A value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything that could not be categorized
    #[error("Unknown bridge error: {0}")]
    Unknown(String),

    // ========================================================================
    // SDK errors
    // ========================================================================
    /// The SDK reported a failure, or returned no data where data was expected
    #[error("Internal SDK error: {0}")]
    Sdk(String),

    /// An inbox fetch failed
    #[error("Inbox error: {0}")]
    Inbox(String),

    // ========================================================================
    // Not implemented
    // ========================================================================
    /// The action is unknown, or known but not built on this platform
    #[error("Bridge method '{0}' is not implemented")]
    NotImplemented(String),
}

impl Error {
    /// Shorthand for a bad argument error
    pub fn bad_argument(name: impl Into<String>) -> Self {
        Error::BadArgumentType(name.into())
    }

    /// Get the wire error code
    ///
    /// `NotImplemented` has no code: hosts surface it through their own
    /// "unsupported operation" signal.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::BadArgumentType(_) => Some(ErrorCode::BadArgumentType),
            Error::MissingSetup | Error::MissingApiKey => Some(ErrorCode::MissingSetup),
            Error::Internal(_) | Error::FetcherNotFound(_) | Error::Serialization(_) => {
                Some(ErrorCode::InternalBridgeError)
            }
            Error::Unknown(_) => Some(ErrorCode::UnknownBridgeError),
            Error::Sdk(_) => Some(ErrorCode::InternalSdkError),
            Error::Inbox(_) => Some(ErrorCode::InboxError),
            Error::NotImplemented(_) => None,
        }
    }

    /// Whether this is the "not implemented" outcome rather than a coded error
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::NotImplemented(_))
    }

    /// Structured details passed through to advanced callers
    pub fn details(&self) -> Option<Parameters> {
        match self {
            Error::BadArgumentType(name) => {
                Some(Parameters::from_iter([("argument", Value::from(name.as_str()))]))
            }
            Error::FetcherNotFound(id) => {
                Some(Parameters::from_iter([("fetcherID", Value::from(id.as_str()))]))
            }
            _ => None,
        }
    }

    /// Check if this error is recoverable by the caller
    ///
    /// Recoverable errors are caller mistakes that go away once the call is
    /// fixed or setup is completed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BadArgumentType(_) | Error::MissingSetup | Error::MissingApiKey
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// WIRE ERROR REPRESENTATION
// ============================================================================

/// Closed set of error codes the bridge emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Error that could not be categorized
    #[serde(rename = "unknownBridgeError")]
    UnknownBridgeError,
    /// Bug inside the bridge
    #[serde(rename = "internalBridgeError")]
    InternalBridgeError,
    /// The SDK failed
    #[serde(rename = "internalSDKError")]
    InternalSdkError,
    /// Caller sent a missing or mistyped argument
    #[serde(rename = "badArgumentType")]
    BadArgumentType,
    /// Setup was not completed
    #[serde(rename = "missingSetup")]
    MissingSetup,
    /// An inbox fetch failed
    #[serde(rename = "inboxError")]
    InboxError,
}

impl ErrorCode {
    /// Wire string of this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownBridgeError => "unknownBridgeError",
            ErrorCode::InternalBridgeError => "internalBridgeError",
            ErrorCode::InternalSdkError => "internalSDKError",
            ErrorCode::BadArgumentType => "badArgumentType",
            ErrorCode::MissingSetup => "missingSetup",
            ErrorCode::InboxError => "inboxError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error handed to the host runtime
///
/// This is what crosses the bridge boundary: a closed code, a human readable
/// description and optional opaque details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    /// Wire error code
    pub code: ErrorCode,
    /// Human-readable description
    pub description: String,
    /// Optional pass-through details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Parameters>,
}

impl From<Error> for BridgeError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code().unwrap_or(ErrorCode::UnknownBridgeError),
            details: err.details(),
            description: err.to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::bad_argument("x").code(), Some(ErrorCode::BadArgumentType));
        assert_eq!(Error::MissingSetup.code(), Some(ErrorCode::MissingSetup));
        assert_eq!(Error::MissingApiKey.code(), Some(ErrorCode::MissingSetup));
        assert_eq!(Error::Internal("x".into()).code(), Some(ErrorCode::InternalBridgeError));
        assert_eq!(Error::FetcherNotFound("x".into()).code(), Some(ErrorCode::InternalBridgeError));
        assert_eq!(Error::Sdk("x".into()).code(), Some(ErrorCode::InternalSdkError));
        assert_eq!(Error::Inbox("x".into()).code(), Some(ErrorCode::InboxError));
        assert_eq!(Error::Unknown("x".into()).code(), Some(ErrorCode::UnknownBridgeError));
        assert_eq!(Error::NotImplemented("x".into()).code(), None);
    }

    #[test]
    fn test_wire_code_strings() {
        assert_eq!(ErrorCode::InternalSdkError.as_str(), "internalSDKError");
        assert_eq!(
            serde_json::to_string(&ErrorCode::BadArgumentType).unwrap(),
            "\"badArgumentType\""
        );
        let parsed: ErrorCode = serde_json::from_str("\"inboxError\"").unwrap();
        assert_eq!(parsed, ErrorCode::InboxError);
    }

    #[test]
    fn test_bad_argument_names_the_argument() {
        let err = Error::bad_argument("longitude");
        assert!(err.to_string().contains("'longitude'"));

        let wire: BridgeError = err.into();
        assert_eq!(wire.code, ErrorCode::BadArgumentType);
        let details = wire.details.unwrap();
        assert_eq!(details.get_str("argument"), Some("longitude"));
    }

    #[test]
    fn test_bridge_error_serialization() {
        let wire: BridgeError = Error::Sdk("fetch failed".into()).into();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["code"], "internalSDKError");
        assert!(json["description"].as_str().unwrap().contains("fetch failed"));
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::MissingSetup.is_recoverable());
        assert!(Error::bad_argument("x").is_recoverable());
        assert!(!Error::Internal("x".into()).is_recoverable());
        assert!(Error::NotImplemented("x".into()).is_not_implemented());
    }
}
