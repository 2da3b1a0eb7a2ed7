//! rectcheck - strided region copy verifier
//!
//! Exercises the rect copy/read/write commands of a compute device against
//! host-side shadow buffers. Every operation issued to the device is mirrored
//! element by element on the host, and device contents are compared with the
//! shadows to detect incorrect copies.

#![allow(clippy::too_many_arguments)] // Rect commands carry offsets, extents and pitches for both sides
#![allow(clippy::needless_range_loop)] // Per-axis loops read clearer with an index
#![allow(clippy::manual_memcpy)] // Row copies mirror the device command layout

pub mod arena;
pub mod backend;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod overlap;
pub mod region;
pub mod stress;
pub mod verify;

pub use arena::{BufferArena, BufferState};
pub use backend::{DeviceBuffer, DeviceError, HostRectDevice, RectCopy, RectDevice};
pub use error::{ErrorCategory, RectCheckError, RectResult};
pub use logging::{init_logging_default, init_logging_from_env, LogFormat, LogLevel, LoggingConfig};
pub use mirror::{mirror_copy, mirror_copy_within, CopyOutcome, MirrorExecutor};
pub use overlap::{check_overlap_rect, regions_overlap};
pub use region::{make_region, BufferLayout, Coord3, Region};
pub use stress::{run_stress, RectStressConfig, RectStressTest, StressReport};
pub use verify::{hex_dump, Mismatch, MismatchReport, Verifier};
