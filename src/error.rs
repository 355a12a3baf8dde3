//! Handle Errors and Status Codes
//!
//! Every failure in this crate is a caller contract violation, raised at
//! the point of detection and never retried. `HandleStatus` is the flat
//! code an outward C-callable layer hands back to its callers.

use thiserror::Error;

/// Error type for handle and boundary operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// An opaque token resolved to no provider.
    #[error("the opaque handle is null")]
    NullHandle,

    /// A null pointer or token was supplied where a live one is required.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested type is neither the wrapped type nor a declared cast target.
    #[error("expected type {expected}, but got an opaque pointer to a type {actual}")]
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
        /// Name of the type actually wrapped by the handle.
        actual: &'static str,
    },

    /// An element of a batch conversion failed.
    #[error("element {index}: {source}")]
    Element {
        /// Position of the failing element.
        index: usize,
        /// Why it failed.
        #[source]
        source: Box<HandleError>,
    },
}

impl HandleError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// The error with any `Element` wrappers removed.
    pub fn root(&self) -> &HandleError {
        match self {
            Self::Element { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, HandleError>;

/// Status codes for the outward C-callable layer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// The call succeeded.
    Ok = 0,
    /// A null handle was passed.
    NullHandle = -1,
    /// A null pointer or otherwise invalid argument was passed.
    InvalidArgument = -2,
    /// The handle does not wrap, and cannot be cast to, the requested type.
    TypeMismatch = -3,
}

impl HandleStatus {
    /// Collapse a result into a status code.
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.into(),
        }
    }

    /// Raw code value.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<&HandleError> for HandleStatus {
    fn from(err: &HandleError) -> Self {
        match err.root() {
            HandleError::NullHandle => Self::NullHandle,
            HandleError::InvalidArgument(_) => Self::InvalidArgument,
            HandleError::TypeMismatch { .. } => Self::TypeMismatch,
            // root() never yields an Element
            HandleError::Element { .. } => Self::InvalidArgument,
        }
    }
}
