//! Device error types

use thiserror::Error;

/// Errors reported by a [`RectDevice`](super::RectDevice)
///
/// These mirror the failure classes of the rect buffer commands. None of
/// them are retried by the verifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid buffer handle: {0}")]
    InvalidBuffer(usize),
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Access out of range: {0}")]
    OutOfRange(String),
    #[error("Copy source and destination overlap: {0}")]
    CopyOverlap(String),
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Device result type
pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// The command was rejected before touching memory
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            DeviceError::InvalidBuffer(_)
                | DeviceError::InvalidValue(_)
                | DeviceError::OutOfRange(_)
                | DeviceError::CopyOverlap(_)
        )
    }
}
