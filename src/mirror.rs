//! Host-side mirroring of rect commands
//!
//! Every copy, read and write issued to the device is replayed on the shadow
//! buffers, element by element, in row-major order. The shadow is then the
//! reference the device's contents are verified against.
//!
//! The free functions here are pure and reentrant. [`MirrorExecutor`] ties
//! them to a [`RectDevice`] and owns the session's buffers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::arena::{BufferArena, BufferState};
use crate::backend::{DeviceResult, RectCopy, RectDevice};
use crate::error::{RectCheckError, RectResult};
use crate::overlap::regions_overlap;
use crate::region::{BufferLayout, Coord3, Region};
use crate::verify::{hex_dump, Verifier};

/// Copy the box of `extent` at `src_offset` in `src` to `dst_offset` in `dst`.
///
/// Element `i` of the box, decomposed as `z = i/(w*h)`, `y = (i%(w*h))/w`,
/// `x = (i%(w*h))%w`, goes from `src_offset + (x,y,z)` to
/// `dst_offset + (x,y,z)`.
pub fn mirror_copy(
    src: &[u8],
    src_layout: &BufferLayout,
    src_offset: Coord3,
    dst: &mut [u8],
    dst_layout: &BufferLayout,
    dst_offset: Coord3,
    extent: Coord3,
) -> RectResult<()> {
    same_element_size(src_layout, dst_layout)?;
    let src_region = Region::new(src_offset, extent, src_layout)?;
    let dst_region = Region::new(dst_offset, extent, dst_layout)?;
    check_backing(src.len(), src_layout)?;
    check_backing(dst.len(), dst_layout)?;

    let element_size = src_layout.element_size;
    for i in 0..src_region.volume() {
        let rel = src_region.coords_of(i);
        let s = src_layout.byte_index(src_region.absolute(rel));
        let d = dst_layout.byte_index(dst_region.absolute(rel));
        dst[d..d + element_size].copy_from_slice(&src[s..s + element_size]);
    }
    Ok(())
}

/// Same-buffer variant of [`mirror_copy`].
///
/// Elements are moved one at a time in row-major order; callers are expected
/// to have ruled out overlapping boxes.
pub fn mirror_copy_within(
    buf: &mut [u8],
    layout: &BufferLayout,
    src_offset: Coord3,
    dst_offset: Coord3,
    extent: Coord3,
) -> RectResult<()> {
    let src_region = Region::new(src_offset, extent, layout)?;
    let dst_region = Region::new(dst_offset, extent, layout)?;
    check_backing(buf.len(), layout)?;

    let element_size = layout.element_size;
    for i in 0..src_region.volume() {
        let rel = src_region.coords_of(i);
        let s = layout.byte_index(src_region.absolute(rel));
        let d = layout.byte_index(dst_region.absolute(rel));
        buf.copy_within(s..s + element_size, d);
    }
    Ok(())
}

/// Fill `buf` with random bytes in `0..0xff`
pub fn fill_random<R: Rng>(rng: &mut R, buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = (rng.gen::<u32>() % 0xff) as u8;
    }
}

fn same_element_size(a: &BufferLayout, b: &BufferLayout) -> RectResult<()> {
    if a.element_size != b.element_size {
        return Err(crate::layout_error!(
            "element sizes differ: {} != {}",
            a.element_size,
            b.element_size
        ));
    }
    Ok(())
}

fn check_backing(len: usize, layout: &BufferLayout) -> RectResult<()> {
    layout.validate()?;
    if len < layout.size_bytes() {
        return Err(crate::layout_error!(
            "buffer holds {} bytes, layout needs {}",
            len,
            layout.size_bytes()
        ));
    }
    Ok(())
}

fn device_call(op: &str, result: DeviceResult<()>) -> RectResult<()> {
    result.map_err(|e| {
        tracing::error!("{} failed: {}", op, e);
        RectCheckError::Device(e)
    })
}

/// What happened to a requested copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CopyOutcome {
    /// Issued to the device and mirrored
    Copied,
    /// Same-buffer copy with overlapping ranges; nothing was issued
    SkippedOverlap,
}

/// Drives a device and the shadow buffers in lock step
///
/// Buffers are released when the executor is dropped.
pub struct MirrorExecutor<D: RectDevice> {
    device: D,
    arena: BufferArena,
    scratch: Vec<u8>,
    rng: ChaCha8Rng,
    verifier: Verifier,
}

impl<D: RectDevice> MirrorExecutor<D> {
    /// Create an executor whose random data derives from `seed`
    pub fn new(device: D, seed: u64) -> Self {
        MirrorExecutor {
            device,
            arena: BufferArena::new(),
            scratch: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            verifier: Verifier::default(),
        }
    }

    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    pub fn buffer(&self, index: usize) -> RectResult<&BufferState> {
        self.arena.get(index)
    }

    /// Session random source, shared with the caller so one seed drives everything
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Create a device buffer holding `initial` and track it with a shadow copy.
    pub fn add_buffer(&mut self, layout: BufferLayout, initial: Vec<u8>) -> RectResult<usize> {
        if initial.len() != layout.size_bytes() {
            return Err(crate::layout_error!(
                "initial data of {} bytes does not match layout size {}",
                initial.len(),
                layout.size_bytes()
            ));
        }

        let handle = self.device.create_buffer(&initial)?;
        let index = self.arena.push(BufferState::new(layout, initial, handle)?);
        if self.scratch.len() < layout.size_bytes() {
            self.scratch.resize(layout.size_bytes(), 0);
        }

        tracing::debug!(
            "MirrorExecutor::add_buffer: buffer {} is ({},{},{}) x {} bytes on {}",
            index,
            layout.width,
            layout.height,
            layout.depth,
            layout.element_size,
            self.device.name()
        );
        Ok(index)
    }

    /// Create a buffer filled with random bytes
    pub fn add_random_buffer(&mut self, layout: BufferLayout) -> RectResult<usize> {
        let mut data = vec![0u8; layout.size_bytes()];
        fill_random(&mut self.rng, &mut data);
        self.add_buffer(layout, data)
    }

    fn layouts(&self, src: usize, dst: usize) -> RectResult<(BufferLayout, BufferLayout)> {
        let src_layout = *self.arena.get(src)?.layout();
        let dst_layout = *self.arena.get(dst)?.layout();
        same_element_size(&src_layout, &dst_layout)?;
        Ok((src_layout, dst_layout))
    }

    /// Copy `src_region` of buffer `src` to `dst_region` of buffer `dst` on
    /// the device, then mirror it into the destination shadow.
    ///
    /// Overlapping same-buffer copies are skipped entirely.
    ///
    /// # Errors
    /// - `ShapeMismatch` if the extents differ
    /// - `InvalidExtent` / `OutOfBounds` if a region does not fit its buffer
    /// - `Device` if the device rejects the command
    pub fn copy_region(
        &mut self,
        src: usize,
        src_region: Region,
        dst: usize,
        dst_region: Region,
    ) -> RectResult<CopyOutcome> {
        if src_region.extent != dst_region.extent {
            return Err(RectCheckError::ShapeMismatch {
                src: src_region.extent,
                dst: dst_region.extent,
            });
        }
        let (src_layout, dst_layout) = self.layouts(src, dst)?;
        let src_region = Region::new(src_region.offset, src_region.extent, &src_layout)?;
        let dst_region = Region::new(dst_region.offset, dst_region.extent, &dst_layout)?;

        if src == dst && regions_overlap(&src_layout, &src_region, &dst_region) {
            tracing::info!(
                "Copy overlap reported, skipping copy buffer rect: buffer {} {:?} -> {:?} region {:?}",
                src,
                src_region.offset,
                dst_region.offset,
                src_region.extent
            );
            return Ok(CopyOutcome::SkippedOverlap);
        }

        let rect = RectCopy::between(
            &src_layout,
            src_region.offset,
            &dst_layout,
            dst_region.offset,
            src_region.extent,
        );
        let src_handle = self.arena.get(src)?.device();
        let dst_handle = self.arena.get(dst)?.device();
        device_call(
            "copy_rect",
            self.device.copy_rect(src_handle, dst_handle, &rect),
        )?;

        if src == dst {
            mirror_copy_within(
                self.arena.get_mut(dst)?.shadow_mut(),
                &dst_layout,
                src_region.offset,
                dst_region.offset,
                src_region.extent,
            )?;
        } else {
            let (source, target) = self.arena.pair_mut(src, dst)?;
            mirror_copy(
                source.shadow(),
                &src_layout,
                src_region.offset,
                target.shadow_mut(),
                &dst_layout,
                dst_region.offset,
                src_region.extent,
            )?;
        }

        Ok(CopyOutcome::Copied)
    }

    /// Read `src_region` of buffer `src` from the device into a temporary host
    /// buffer laid out like buffer `dst` (at `dst_offset`), and compare it
    /// with `src`'s shadow.
    pub fn read_verify_region(
        &mut self,
        src: usize,
        src_region: Region,
        dst: usize,
        dst_offset: Coord3,
    ) -> RectResult<()> {
        let (src_layout, host_layout) = self.layouts(src, dst)?;
        let src_region = Region::new(src_region.offset, src_region.extent, &src_layout)?;
        Region::new(dst_offset, src_region.extent, &host_layout)?;

        let host_len = host_layout.size_bytes();
        self.scratch.fill(0xff);

        let rect = RectCopy::between(
            &src_layout,
            src_region.offset,
            &host_layout,
            dst_offset,
            src_region.extent,
        );
        let handle = self.arena.get(src)?.device();
        device_call(
            "read_rect",
            self.device.read_rect(handle, &rect, &mut self.scratch[..host_len]),
        )?;

        let source = self.arena.get(src)?;
        self.verifier.verify_region(
            &self.scratch[..host_len],
            &host_layout,
            dst_offset,
            source.shadow(),
            &src_layout,
            src_region.offset,
            src_region.extent,
        )
    }

    /// Generate fresh random host data laid out like buffer `src`, write the
    /// box at `src_offset` into `dst_region` of buffer `dst`, and mirror the
    /// same elements into `dst`'s shadow.
    pub fn write_region(
        &mut self,
        src: usize,
        src_offset: Coord3,
        dst: usize,
        dst_region: Region,
    ) -> RectResult<()> {
        let (host_layout, dst_layout) = self.layouts(src, dst)?;
        Region::new(src_offset, dst_region.extent, &host_layout)?;
        let dst_region = Region::new(dst_region.offset, dst_region.extent, &dst_layout)?;

        let host_len = host_layout.size_bytes();
        fill_random(&mut self.rng, &mut self.scratch);

        let rect = RectCopy::between(
            &host_layout,
            src_offset,
            &dst_layout,
            dst_region.offset,
            dst_region.extent,
        );
        let handle = self.arena.get(dst)?.device();
        device_call(
            "write_rect",
            self.device.write_rect(handle, &rect, &self.scratch[..host_len]),
        )?;

        mirror_copy(
            &self.scratch[..host_len],
            &host_layout,
            src_offset,
            self.arena.get_mut(dst)?.shadow_mut(),
            &dst_layout,
            dst_region.offset,
            dst_region.extent,
        )
    }

    /// Read the whole of buffer `index` and compare it with its shadow.
    pub fn map_verify_buffer(&mut self, index: usize) -> RectResult<()> {
        let state = self.arena.get(index)?;
        let layout = *state.layout();
        let handle = state.device();
        let len = layout.size_bytes();

        device_call(
            "read_buffer",
            self.device.read_buffer(handle, &mut self.scratch[..len]),
        )?;

        let state = self.arena.get(index)?;
        let result = self
            .verifier
            .verify(&self.scratch[..len], state.shadow(), &layout, &Region::whole(&layout));
        if result.is_err() && tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("Device: [{}]\n{}", index, hex_dump(&self.scratch[..len], &layout));
            tracing::debug!("Verify: [{}]\n{}", index, hex_dump(state.shadow(), &layout));
        }
        result
    }

    /// Full-buffer verification of every buffer in the session
    pub fn verify_all(&mut self) -> RectResult<()> {
        for index in 0..self.arena.len() {
            let layout = *self.arena.get(index)?.layout();
            tracing::info!(
                "Verify {} offset (0,0,0) region ({}x{}x{})",
                index,
                layout.width,
                layout.height,
                layout.depth
            );
            self.map_verify_buffer(index)?;
        }
        Ok(())
    }

    /// Release every device buffer. The first release error is returned after
    /// all buffers have been attempted.
    pub fn release_all(&mut self) -> RectResult<()> {
        let mut first_error = None;
        for handle in self.arena.drain() {
            if let Err(e) = self.device.release_buffer(handle) {
                tracing::warn!("MirrorExecutor::release_all: buffer {} failed to release: {}", handle.id(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(RectCheckError::Device(e)),
            None => Ok(()),
        }
    }
}

impl<D: RectDevice> Drop for MirrorExecutor<D> {
    fn drop(&mut self) {
        if !self.arena.is_empty() {
            let _ = self.release_all();
        }
    }
}
