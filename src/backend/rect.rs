//! Rect command parameters
//!
//! [`RectCopy`] carries the origin/region/pitch arguments shared by the copy,
//! read and write rect commands. Origins and `region[0]` are in bytes; y and z
//! count rows and slices. A pitch of 0 means "tightly packed": the row pitch
//! defaults to `region[0]` and the slice pitch to `region[1] * row_pitch`.

use crate::backend::error::{DeviceError, DeviceResult};
use crate::region::{byte_origin, BufferLayout, Coord3};

/// Arguments of one rect command, source side and destination side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectCopy {
    pub src_origin: Coord3,
    pub dst_origin: Coord3,
    pub region: Coord3,
    pub src_row_pitch: usize,
    pub src_slice_pitch: usize,
    pub dst_row_pitch: usize,
    pub dst_slice_pitch: usize,
}

impl RectCopy {
    /// Build the byte-space command that moves an element-space box of
    /// `extent` from `src_offset` in `src` to `dst_offset` in `dst`.
    ///
    /// Both layouts are expected to share one element size.
    pub fn between(
        src: &BufferLayout,
        src_offset: Coord3,
        dst: &BufferLayout,
        dst_offset: Coord3,
        extent: Coord3,
    ) -> Self {
        RectCopy {
            src_origin: byte_origin(src_offset, src.element_size),
            dst_origin: byte_origin(dst_offset, dst.element_size),
            region: [extent[0] * src.element_size, extent[1], extent[2]],
            src_row_pitch: src.row_pitch,
            src_slice_pitch: src.slice_pitch,
            dst_row_pitch: dst.row_pitch,
            dst_slice_pitch: dst.slice_pitch,
        }
    }

    /// Apply the default pitches and validate the command shape.
    ///
    /// # Errors
    /// `InvalidValue` if any region axis is zero or an explicit pitch is
    /// smaller than the data it has to step over.
    pub fn resolved(&self) -> DeviceResult<RectCopy> {
        if self.region.iter().any(|&r| r == 0) {
            return Err(DeviceError::InvalidValue(format!(
                "region {:?} has a zero axis",
                self.region
            )));
        }

        let (src_row_pitch, src_slice_pitch) =
            resolve_pitches(self.region, self.src_row_pitch, self.src_slice_pitch, "source")?;
        let (dst_row_pitch, dst_slice_pitch) =
            resolve_pitches(self.region, self.dst_row_pitch, self.dst_slice_pitch, "destination")?;

        Ok(RectCopy {
            src_row_pitch,
            src_slice_pitch,
            dst_row_pitch,
            dst_slice_pitch,
            ..*self
        })
    }

    /// First byte touched on the source side
    pub fn src_offset(&self) -> usize {
        self.src_origin[2] * self.src_slice_pitch + self.src_origin[1] * self.src_row_pitch + self.src_origin[0]
    }

    /// First byte touched on the destination side
    pub fn dst_offset(&self) -> usize {
        self.dst_origin[2] * self.dst_slice_pitch + self.dst_origin[1] * self.dst_row_pitch + self.dst_origin[0]
    }

    /// One past the last source byte touched
    pub fn src_end(&self) -> usize {
        self.src_offset() + span(self.region, self.src_row_pitch, self.src_slice_pitch)
    }

    /// One past the last destination byte touched
    pub fn dst_end(&self) -> usize {
        self.dst_offset() + span(self.region, self.dst_row_pitch, self.dst_slice_pitch)
    }

    /// `(src_start, dst_start)` byte offsets of every row, slice by slice
    pub fn rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let src_base = self.src_offset();
        let dst_base = self.dst_offset();
        (0..self.region[2]).flat_map(move |z| {
            (0..self.region[1]).map(move |y| {
                (
                    src_base + z * self.src_slice_pitch + y * self.src_row_pitch,
                    dst_base + z * self.dst_slice_pitch + y * self.dst_row_pitch,
                )
            })
        })
    }
}

fn resolve_pitches(region: Coord3, row_pitch: usize, slice_pitch: usize, side: &str) -> DeviceResult<(usize, usize)> {
    let row_pitch = if row_pitch == 0 { region[0] } else { row_pitch };
    if row_pitch < region[0] {
        return Err(DeviceError::InvalidValue(format!(
            "{} row pitch {} < region width {}",
            side, row_pitch, region[0]
        )));
    }

    let packed_slice = region[1] * row_pitch;
    let slice_pitch = if slice_pitch == 0 { packed_slice } else { slice_pitch };
    if slice_pitch < packed_slice {
        return Err(DeviceError::InvalidValue(format!(
            "{} slice pitch {} < {} rows of {} bytes",
            side, slice_pitch, region[1], row_pitch
        )));
    }

    Ok((row_pitch, slice_pitch))
}

fn span(region: Coord3, row_pitch: usize, slice_pitch: usize) -> usize {
    (region[2] - 1) * slice_pitch + (region[1] - 1) * row_pitch + region[0]
}
