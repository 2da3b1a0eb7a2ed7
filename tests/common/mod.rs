//! Common test utilities for rect verification tests
//!
//! Provides a fault-injecting device wrapper around [`HostRectDevice`] so
//! tests can check that a misbehaving device is caught by the verifier, plus
//! a few small fixtures.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{Fault, FaultyDevice};
//!
//! let device = FaultyDevice::new(Fault::CorruptReads);
//! ```

#![allow(dead_code)]

use rectcheck::backend::{DeviceBuffer, DeviceError, DeviceResult, HostRectDevice, RectCopy, RectDevice};
use rectcheck::RectStressConfig;

/// Misbehaviour injected by [`FaultyDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behave exactly like the host device
    None,
    /// Flip a bit in the first byte of every rect or whole-buffer read
    CorruptReads,
    /// Perform copies, then flip a bit in the first destination byte
    CorruptCopies,
    /// Report success for writes without touching the buffer
    DropWrites,
    /// Reject every copy with `CommandFailed`
    FailCopies,
}

/// Host device with one injected fault
#[derive(Debug)]
pub struct FaultyDevice {
    inner: HostRectDevice,
    fault: Fault,
    injected: usize,
}

impl FaultyDevice {
    pub fn new(fault: Fault) -> Self {
        FaultyDevice {
            inner: HostRectDevice::new(),
            fault,
            injected: 0,
        }
    }

    /// How many times the fault fired
    pub fn injected(&self) -> usize {
        self.injected
    }

    pub fn inner(&self) -> &HostRectDevice {
        &self.inner
    }
}

impl RectDevice for FaultyDevice {
    fn name(&self) -> &str {
        "faulty-host"
    }

    fn create_buffer(&mut self, initial: &[u8]) -> DeviceResult<DeviceBuffer> {
        self.inner.create_buffer(initial)
    }

    fn release_buffer(&mut self, buffer: DeviceBuffer) -> DeviceResult<()> {
        self.inner.release_buffer(buffer)
    }

    fn copy_rect(&mut self, src: DeviceBuffer, dst: DeviceBuffer, rect: &RectCopy) -> DeviceResult<()> {
        match self.fault {
            Fault::FailCopies => {
                self.injected += 1;
                Err(DeviceError::CommandFailed("injected copy failure".to_string()))
            }
            Fault::CorruptCopies => {
                self.inner.copy_rect(src, dst, rect)?;
                let offset = rect.resolved()?.dst_offset();
                self.inner.contents_mut(dst)?[offset] ^= 0x01;
                self.injected += 1;
                Ok(())
            }
            _ => self.inner.copy_rect(src, dst, rect),
        }
    }

    fn read_rect(&mut self, src: DeviceBuffer, rect: &RectCopy, host: &mut [u8]) -> DeviceResult<()> {
        self.inner.read_rect(src, rect, host)?;
        if self.fault == Fault::CorruptReads {
            host[rect.resolved()?.dst_offset()] ^= 0x01;
            self.injected += 1;
        }
        Ok(())
    }

    fn write_rect(&mut self, dst: DeviceBuffer, rect: &RectCopy, host: &[u8]) -> DeviceResult<()> {
        if self.fault == Fault::DropWrites {
            self.injected += 1;
            return Ok(());
        }
        self.inner.write_rect(dst, rect, host)
    }

    fn read_buffer(&mut self, src: DeviceBuffer, host: &mut [u8]) -> DeviceResult<()> {
        self.inner.read_buffer(src, host)?;
        if self.fault == Fault::CorruptReads {
            host[0] ^= 0x01;
            self.injected += 1;
        }
        Ok(())
    }
}

/// Bytes 0, 1, 2, ... wrapping at 256
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

/// Session small enough to run quickly in debug builds
pub fn small_session(seed: u64) -> RectStressConfig {
    RectStressConfig::new()
        .with_num_buffers(4)
        .with_num_tries(60)
        .with_max_alloc_bytes(16 * 1024)
        .with_seed(seed)
}
