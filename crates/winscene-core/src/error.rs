//! Error types for winscene-core
//!
//! Every session operation returns a [`SessionResult`]. Failures never panic;
//! the binding layer translates a [`SessionError`] into its own
//! representation through [`SessionError::code`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::WindowCategory;
use crate::property::PropertyAction;
use crate::state::SessionState;

/// Result type alias using the session error type
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Stable numeric result codes shared with the binding layer.
///
/// Values follow the window manager's historical numbering so existing
/// callers keep matching on the same integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    DoNothing = 1,
    NullPtr = 4,
    InvalidSession = 5,
    InvalidParam = 7,
    DestroyedObject = 8,
    InvalidPermission = 9,
    InvalidOperation = 12,
    InvalidParent = 13,
    InvalidState = 14,
    IdentityMismatch = 15,
    DeviceNotSupport = 801,
    NotSupportedForCategory = 802,
    SurfaceFailure = 1001,
    Internal = 1099,
}

impl ResultCode {
    /// Raw integer value for the wire.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::DoNothing)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_i32())
    }
}

/// Main error type for session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A required collaborator or argument was absent
    #[error("required argument missing: {0}")]
    NullArgument(&'static str),

    /// Operation is not legal from the current lifecycle state
    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Session already reached END or was never connected
    #[error("session {0} is not valid for this operation")]
    InvalidSession(u64),

    /// Value outside its domain
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Category or caller permission gate failed
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Client identity token did not match the token stored at connect
    #[error("client identity token mismatch")]
    IdentityMismatch,

    /// Action is valid in general but not for this window category
    #[error("{action:?} is not supported for {category} windows")]
    NotSupportedForCategory {
        action: PropertyAction,
        category: WindowCategory,
    },

    /// Operation is not supported for the window category outside property dispatch
    #[error("{operation} is not supported for {category} windows")]
    OperationNotSupported {
        operation: &'static str,
        category: WindowCategory,
    },

    /// Parent session required but missing
    #[error("parent session missing or unusable")]
    InvalidParent,

    /// Request rejected by a category rule
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Device class does not support the operation
    #[error("device does not support {0}")]
    DeviceNotSupported(&'static str),

    /// Session worker is gone (session dropped)
    #[error("session object destroyed")]
    DestroyedObject,

    /// Render-surface attach failed during the apply phase
    #[error("render surface failure: {0}")]
    Surface(String),

    /// Unexpected invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Map the error onto its stable wire code.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::NullArgument(_) => ResultCode::NullPtr,
            Self::InvalidState { .. } => ResultCode::InvalidState,
            Self::InvalidSession(_) => ResultCode::InvalidSession,
            Self::InvalidParam(_) => ResultCode::InvalidParam,
            Self::PermissionDenied(_) => ResultCode::InvalidPermission,
            Self::IdentityMismatch => ResultCode::IdentityMismatch,
            Self::NotSupportedForCategory { .. } | Self::OperationNotSupported { .. } => {
                ResultCode::NotSupportedForCategory
            }
            Self::InvalidParent => ResultCode::InvalidParent,
            Self::InvalidOperation(_) => ResultCode::InvalidOperation,
            Self::DeviceNotSupported(_) => ResultCode::DeviceNotSupport,
            Self::DestroyedObject => ResultCode::DestroyedObject,
            Self::Surface(_) => ResultCode::SurfaceFailure,
            Self::Internal(_) => ResultCode::Internal,
        }
    }

    /// Whether the failure came from the token guard.
    #[must_use]
    pub const fn is_identity_failure(&self) -> bool {
        matches!(self, Self::IdentityMismatch | Self::NullArgument(_))
    }
}

/// Collapse a result into the `(code, payload)` pair handed to the binding layer.
pub fn into_reply<T>(result: SessionResult<T>) -> (ResultCode, Option<T>) {
    match result {
        Ok(value) => (ResultCode::Ok, Some(value)),
        Err(err) => (err.code(), None),
    }
}
