//! Unified error handling for rectcheck
//!
//! This module provides a centralized error type for every layer of the
//! verifier. Errors are categorized as:
//! - Setup errors (bad region, layout or configuration; fatal to one test case)
//! - Device errors (propagated opaquely from the device under test)
//! - Verification failures (the device disagreed with the shadow buffer)
//! - Internal errors (I/O, serialization, bugs)
//!
//! None of these are retried: given a fixed seed every failure is deterministic.

use std::fmt;

use crate::backend::DeviceError;
use crate::region::Coord3;
use crate::verify::MismatchReport;

/// Unified error type for rectcheck
#[derive(Debug, thiserror::Error)]
pub enum RectCheckError {
    // ========== Setup Errors ==========
    /// A region extent is zero on some axis
    #[error("Invalid extent {extent:?}: every axis must be at least 1")]
    InvalidExtent { extent: Coord3 },

    /// A region does not fit inside its buffer
    #[error("Region out of bounds on axis {axis}: offset {offset} + extent {extent} > {bound}")]
    OutOfBounds {
        axis: usize,
        offset: usize,
        extent: usize,
        bound: usize,
    },

    /// Buffer dimensions or pitches are inconsistent
    #[error("Invalid buffer layout: {0}")]
    InvalidLayout(String),

    /// Source and destination regions differ in shape
    #[error("Region shape mismatch: source {src:?} != destination {dst:?}")]
    ShapeMismatch { src: Coord3, dst: Coord3 },

    /// Buffer index not present in the arena
    #[error("Unknown buffer index: {0}")]
    UnknownBuffer(usize),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Device Errors ==========
    /// Error returned by the device under test
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    // ========== Verification Errors ==========
    /// Device contents differ from the shadow buffer
    #[error("Verification failed: {0}")]
    Mismatch(#[from] MismatchReport),

    // ========== Internal Errors ==========
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RectCheckError {
    /// Categorize the error for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            RectCheckError::InvalidExtent { .. }
            | RectCheckError::OutOfBounds { .. }
            | RectCheckError::InvalidLayout(_)
            | RectCheckError::ShapeMismatch { .. }
            | RectCheckError::UnknownBuffer(_)
            | RectCheckError::InvalidConfiguration(_) => ErrorCategory::Setup,

            RectCheckError::Device(_) => ErrorCategory::Device,

            RectCheckError::Mismatch(_) => ErrorCategory::Verification,

            RectCheckError::IoError(_)
            | RectCheckError::Serialization(_)
            | RectCheckError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Test-setup error (region construction, layout, configuration)
    pub fn is_setup_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Setup)
    }

    /// The device returned different data than the shadow predicts
    pub fn is_verification_failure(&self) -> bool {
        matches!(self.category(), ErrorCategory::Verification)
    }

    /// Mismatch details, if this is a verification failure
    pub fn mismatch_report(&self) -> Option<&MismatchReport> {
        match self {
            RectCheckError::Mismatch(report) => Some(report),
            _ => None,
        }
    }
}

/// Error category for reporting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Programmer or test-setup error
    Setup,
    /// Failure reported by the device under test
    Device,
    /// Device output disagrees with the host mirror
    Verification,
    /// I/O, serialization or a bug in rectcheck itself
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Setup => write!(f, "Setup"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Verification => write!(f, "Verification"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result type for rectcheck operations
pub type RectResult<T> = std::result::Result<T, RectCheckError>;

/// Create a layout error with context
///
/// # Examples
/// ```ignore
/// return Err(layout_error!("element sizes differ: {} != {}", a, b));
/// ```
#[macro_export]
macro_rules! layout_error {
    ($msg:expr) => {
        $crate::error::RectCheckError::InvalidLayout($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RectCheckError::InvalidLayout(format!($fmt, $($arg)*))
    };
}

/// Create a configuration error with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::RectCheckError::InvalidConfiguration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RectCheckError::InvalidConfiguration(format!($fmt, $($arg)*))
    };
}

/// Wrap an IO error with context
///
/// # Examples
/// ```ignore
/// let text = std::fs::read_to_string(path).map_err(|e| io_context(e, "reading config"))?;
/// ```
pub fn io_context(err: std::io::Error, msg: &str) -> RectCheckError {
    RectCheckError::IoError(std::io::Error::new(err.kind(), format!("{}: {}", msg, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Mismatch;

    fn sample_report() -> MismatchReport {
        MismatchReport {
            checked: 16,
            total: 1,
            mismatches: vec![Mismatch {
                ordinal: 3,
                coordinate: [3, 0, 0],
                byte: 0,
                expected: 0x10,
                actual: 0x11,
            }],
        }
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            RectCheckError::InvalidExtent { extent: [0, 1, 1] }.category(),
            ErrorCategory::Setup
        );
        assert_eq!(
            RectCheckError::UnknownBuffer(9).category(),
            ErrorCategory::Setup
        );
        assert_eq!(
            RectCheckError::Device(DeviceError::InvalidBuffer(2)).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            RectCheckError::Mismatch(sample_report()).category(),
            ErrorCategory::Verification
        );
        assert_eq!(
            RectCheckError::InternalError("bug".to_string()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_predicates() {
        let err = RectCheckError::OutOfBounds {
            axis: 1,
            offset: 3,
            extent: 4,
            bound: 5,
        };
        assert!(err.is_setup_error());
        assert!(!err.is_verification_failure());
        assert!(err.mismatch_report().is_none());

        let err = RectCheckError::Mismatch(sample_report());
        assert!(err.is_verification_failure());
        assert_eq!(err.mismatch_report().map(|r| r.total), Some(1));
    }

    #[test]
    fn test_error_display() {
        let err = RectCheckError::OutOfBounds {
            axis: 0,
            offset: 6,
            extent: 3,
            bound: 8,
        };
        assert_eq!(
            err.to_string(),
            "Region out of bounds on axis 0: offset 6 + extent 3 > 8"
        );

        let err = RectCheckError::ShapeMismatch {
            src: [1, 2, 3],
            dst: [3, 2, 1],
        };
        assert_eq!(
            err.to_string(),
            "Region shape mismatch: source [1, 2, 3] != destination [3, 2, 1]"
        );
    }

    #[test]
    fn test_device_error_conversion() {
        let err: RectCheckError = DeviceError::CopyOverlap("same buffer".to_string()).into();
        assert!(matches!(err, RectCheckError::Device(DeviceError::CopyOverlap(_))));
    }

    #[test]
    fn test_macros() {
        let err = layout_error!("bad pitch");
        assert!(matches!(err, RectCheckError::InvalidLayout(_)));

        let err = config_error!("num_tries = {}", 0);
        assert_eq!(err.to_string(), "Invalid configuration: num_tries = 0");
    }

    #[test]
    fn test_io_context_helper() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
        let err = io_context(io_err, "reading config");
        assert!(matches!(err, RectCheckError::IoError(_)));
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Setup.to_string(), "Setup");
        assert_eq!(ErrorCategory::Device.to_string(), "Device");
        assert_eq!(ErrorCategory::Verification.to_string(), "Verification");
        assert_eq!(ErrorCategory::Internal.to_string(), "Internal");
    }
}
