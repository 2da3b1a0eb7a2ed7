//! Device seam for rect buffer commands
//!
//! The device under test is reached only through [`RectDevice`], whose
//! operations carry the contracts of the blocking copy/read/write rect
//! commands. [`HostRectDevice`] is a host-memory implementation.

pub mod error;
pub mod host;
pub mod rect;

pub use error::{DeviceError, DeviceResult};
pub use host::HostRectDevice;
pub use rect::RectCopy;

/// Opaque handle to a buffer owned by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceBuffer(usize);

impl DeviceBuffer {
    pub fn new(id: usize) -> Self {
        DeviceBuffer(id)
    }

    pub fn id(&self) -> usize {
        self.0
    }
}

/// Blocking rect-command interface of a compute device
///
/// Every call completes before returning. Origins and `region[0]` of a
/// [`RectCopy`] are in bytes; a pitch of 0 means tightly packed.
pub trait RectDevice {
    /// Human-readable device name for logs and reports
    fn name(&self) -> &str;

    /// Allocate a buffer initialized with `initial`
    fn create_buffer(&mut self, initial: &[u8]) -> DeviceResult<DeviceBuffer>;

    fn release_buffer(&mut self, buffer: DeviceBuffer) -> DeviceResult<()>;

    /// Copy a box between two device buffers.
    ///
    /// Overlapping source and destination ranges of one buffer are an error
    /// (`DeviceError::CopyOverlap`) or undefined, depending on the device.
    fn copy_rect(&mut self, src: DeviceBuffer, dst: DeviceBuffer, rect: &RectCopy) -> DeviceResult<()>;

    /// Read a box of `src` into `host`. The `src_*` fields of `rect` describe
    /// the buffer side and the `dst_*` fields the host side.
    fn read_rect(&mut self, src: DeviceBuffer, rect: &RectCopy, host: &mut [u8]) -> DeviceResult<()>;

    /// Write a box of `host` into `dst`. The `src_*` fields of `rect` describe
    /// the host side and the `dst_*` fields the buffer side.
    fn write_rect(&mut self, dst: DeviceBuffer, rect: &RectCopy, host: &[u8]) -> DeviceResult<()>;

    /// Read the whole buffer (the map-for-reading path)
    fn read_buffer(&mut self, src: DeviceBuffer, host: &mut [u8]) -> DeviceResult<()>;
}
