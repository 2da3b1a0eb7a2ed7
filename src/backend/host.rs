//! Host-memory reference device
//!
//! Executes rect commands row by row with slice copies, the way a driver
//! would, independently of the per-element shadow mirror. Useful as a known
//! good device and as the base of fault-injecting wrappers in tests.

use crate::backend::error::{DeviceError, DeviceResult};
use crate::backend::rect::RectCopy;
use crate::backend::{DeviceBuffer, RectDevice};
use crate::overlap::check_overlap_rect;

/// Device whose buffers live in host `Vec<u8>`s
#[derive(Debug, Default)]
pub struct HostRectDevice {
    buffers: Vec<Option<Vec<u8>>>,
    commands: usize,
}

impl HostRectDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rect and whole-buffer commands executed so far
    pub fn commands_executed(&self) -> usize {
        self.commands
    }

    /// Buffers currently allocated
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    /// Direct view of a buffer's bytes
    pub fn contents(&self, buffer: DeviceBuffer) -> DeviceResult<&[u8]> {
        self.buffers
            .get(buffer.id())
            .and_then(|b| b.as_deref())
            .ok_or(DeviceError::InvalidBuffer(buffer.id()))
    }

    /// Mutable view of a buffer's bytes (bypasses the rect commands)
    pub fn contents_mut(&mut self, buffer: DeviceBuffer) -> DeviceResult<&mut [u8]> {
        self.buffers
            .get_mut(buffer.id())
            .and_then(|b| b.as_deref_mut())
            .ok_or(DeviceError::InvalidBuffer(buffer.id()))
    }
}

fn check_range(what: &str, start: usize, end: usize, len: usize) -> DeviceResult<()> {
    if start > end || end > len {
        return Err(DeviceError::OutOfRange(format!(
            "{} bytes [{}, {}) exceed size {}",
            what, start, end, len
        )));
    }
    Ok(())
}

impl RectDevice for HostRectDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn create_buffer(&mut self, initial: &[u8]) -> DeviceResult<DeviceBuffer> {
        if initial.is_empty() {
            return Err(DeviceError::AllocationFailed(
                "zero-size buffer requested".to_string(),
            ));
        }

        let id = self.buffers.len();
        self.buffers.push(Some(initial.to_vec()));
        tracing::trace!("HostRectDevice::create_buffer: buffer {} with {} bytes", id, initial.len());
        Ok(DeviceBuffer::new(id))
    }

    fn release_buffer(&mut self, buffer: DeviceBuffer) -> DeviceResult<()> {
        match self.buffers.get_mut(buffer.id()) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(DeviceError::InvalidBuffer(buffer.id())),
        }
    }

    fn copy_rect(&mut self, src: DeviceBuffer, dst: DeviceBuffer, rect: &RectCopy) -> DeviceResult<()> {
        let rect = rect.resolved()?;
        let width = rect.region[0];

        if src == dst {
            if rect.src_row_pitch != rect.dst_row_pitch || rect.src_slice_pitch != rect.dst_slice_pitch {
                return Err(DeviceError::InvalidValue(
                    "same-buffer copy with differing pitches".to_string(),
                ));
            }
            if check_overlap_rect(
                rect.src_origin,
                rect.dst_origin,
                rect.region,
                rect.src_row_pitch,
                rect.src_slice_pitch,
            ) {
                return Err(DeviceError::CopyOverlap(format!(
                    "buffer {} origins {:?} and {:?} region {:?}",
                    src.id(),
                    rect.src_origin,
                    rect.dst_origin,
                    rect.region
                )));
            }

            let data = self.contents_mut(src)?;
            check_range("source", rect.src_offset(), rect.src_end(), data.len())?;
            check_range("destination", rect.dst_offset(), rect.dst_end(), data.len())?;
            for (s, d) in rect.rows() {
                data.copy_within(s..s + width, d);
            }
        } else {
            // take the source out so both buffers can be borrowed at once
            let source = self
                .buffers
                .get_mut(src.id())
                .and_then(Option::take)
                .ok_or(DeviceError::InvalidBuffer(src.id()))?;
            let result = (|| -> DeviceResult<()> {
                let target = self.contents_mut(dst)?;
                check_range("source", rect.src_offset(), rect.src_end(), source.len())?;
                check_range("destination", rect.dst_offset(), rect.dst_end(), target.len())?;
                for (s, d) in rect.rows() {
                    target[d..d + width].copy_from_slice(&source[s..s + width]);
                }
                Ok(())
            })();
            self.buffers[src.id()] = Some(source);
            result?;
        }

        self.commands += 1;
        Ok(())
    }

    fn read_rect(&mut self, src: DeviceBuffer, rect: &RectCopy, host: &mut [u8]) -> DeviceResult<()> {
        let rect = rect.resolved()?;
        let width = rect.region[0];
        let data = self.contents(src)?;
        check_range("buffer", rect.src_offset(), rect.src_end(), data.len())?;
        check_range("host", rect.dst_offset(), rect.dst_end(), host.len())?;

        for (s, d) in rect.rows() {
            host[d..d + width].copy_from_slice(&data[s..s + width]);
        }

        self.commands += 1;
        Ok(())
    }

    fn write_rect(&mut self, dst: DeviceBuffer, rect: &RectCopy, host: &[u8]) -> DeviceResult<()> {
        let rect = rect.resolved()?;
        let width = rect.region[0];
        let data = self.contents_mut(dst)?;
        check_range("host", rect.src_offset(), rect.src_end(), host.len())?;
        check_range("buffer", rect.dst_offset(), rect.dst_end(), data.len())?;

        for (s, d) in rect.rows() {
            data[d..d + width].copy_from_slice(&host[s..s + width]);
        }

        self.commands += 1;
        Ok(())
    }

    fn read_buffer(&mut self, src: DeviceBuffer, host: &mut [u8]) -> DeviceResult<()> {
        let data = self.contents(src)?;
        if host.len() < data.len() {
            return Err(DeviceError::OutOfRange(format!(
                "host buffer of {} bytes cannot hold {} bytes",
                host.len(),
                data.len()
            )));
        }
        host[..data.len()].copy_from_slice(data);

        self.commands += 1;
        Ok(())
    }
}
