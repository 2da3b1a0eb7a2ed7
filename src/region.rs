//! Region descriptors over strided linear buffers
//!
//! A [`BufferLayout`] describes how a 1D/2D/3D box of fixed-size elements is
//! flattened into bytes (row pitch and slice pitch), and a [`Region`] is an
//! axis-aligned sub-box of that layout. Offsets and extents are expressed in
//! elements; pitches are expressed in bytes.

use serde::{Deserialize, Serialize};

use crate::error::{RectCheckError, RectResult};

/// Three-axis coordinate or extent in `(x, y, z)` order
pub type Coord3 = [usize; 3];

/// Shape and pitches of one flattened buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferLayout {
    /// Elements per row
    pub width: usize,
    /// Rows per slice
    pub height: usize,
    /// Number of slices
    pub depth: usize,
    /// Size of one element in bytes
    pub element_size: usize,
    /// Bytes between the starts of consecutive rows
    pub row_pitch: usize,
    /// Bytes between the starts of consecutive slices (0 for single-slice buffers)
    pub slice_pitch: usize,
}

impl BufferLayout {
    /// Create a tightly packed layout.
    ///
    /// `row_pitch = width * element_size`, `slice_pitch = row_pitch * height`
    /// (or 0 when `depth == 1`).
    pub fn new(width: usize, height: usize, depth: usize, element_size: usize) -> RectResult<Self> {
        if width == 0 || height == 0 || depth == 0 || element_size == 0 {
            return Err(RectCheckError::InvalidLayout(format!(
                "dimensions must be non-zero: {}x{}x{} with element size {}",
                width, height, depth, element_size
            )));
        }

        let row_pitch = width.checked_mul(element_size).ok_or_else(|| {
            RectCheckError::InvalidLayout(format!("row of {} x {} bytes overflows", width, element_size))
        })?;
        let slice_pitch = if depth == 1 {
            0
        } else {
            row_pitch.checked_mul(height).ok_or_else(|| {
                RectCheckError::InvalidLayout(format!("slice of {} x {} bytes overflows", row_pitch, height))
            })?
        };

        let layout = BufferLayout {
            width,
            height,
            depth,
            element_size,
            row_pitch,
            slice_pitch,
        };
        layout.checked_size_bytes()?;
        Ok(layout)
    }

    /// One-dimensional layout of `len` elements
    pub fn linear(len: usize, element_size: usize) -> RectResult<Self> {
        Self::new(len, 1, 1, element_size)
    }

    /// Override the row and slice pitches.
    ///
    /// A `slice_pitch` of 0 keeps the default derived from the new row pitch.
    pub fn with_pitches(mut self, row_pitch: usize, slice_pitch: usize) -> RectResult<Self> {
        if row_pitch < self.row_bytes() {
            return Err(RectCheckError::InvalidLayout(format!(
                "row pitch {} is smaller than a row of {} bytes",
                row_pitch,
                self.row_bytes()
            )));
        }

        let min_slice = row_pitch.checked_mul(self.height).ok_or_else(|| {
            RectCheckError::InvalidLayout(format!("slice of {} x {} bytes overflows", row_pitch, self.height))
        })?;
        let slice_pitch = match (slice_pitch, self.depth) {
            (0, 1) => 0,
            (0, _) => min_slice,
            (pitch, _) if pitch < min_slice => {
                return Err(RectCheckError::InvalidLayout(format!(
                    "slice pitch {} is smaller than {} rows of {} bytes",
                    pitch, self.height, row_pitch
                )));
            }
            (pitch, _) => pitch,
        };

        self.row_pitch = row_pitch;
        self.slice_pitch = slice_pitch;
        self.checked_size_bytes()?;
        Ok(self)
    }

    /// Check the pitch invariants of a layout built outside [`BufferLayout::new`],
    /// e.g. a struct literal or one read from JSON.
    ///
    /// # Errors
    /// `InvalidLayout` for zero dimensions, pitches smaller than the data they
    /// step over, or a size that overflows.
    pub fn validate(&self) -> RectResult<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 || self.element_size == 0 {
            return Err(RectCheckError::InvalidLayout(format!(
                "dimensions must be non-zero: {}x{}x{} with element size {}",
                self.width, self.height, self.depth, self.element_size
            )));
        }

        let row_bytes = self.width.checked_mul(self.element_size).ok_or_else(|| {
            RectCheckError::InvalidLayout(format!(
                "row of {} x {} bytes overflows",
                self.width, self.element_size
            ))
        })?;
        if self.row_pitch < row_bytes {
            return Err(RectCheckError::InvalidLayout(format!(
                "row pitch {} is smaller than a row of {} bytes",
                self.row_pitch, row_bytes
            )));
        }

        if self.depth > 1 {
            let min_slice = self.row_pitch.checked_mul(self.height).ok_or_else(|| {
                RectCheckError::InvalidLayout(format!(
                    "slice of {} x {} bytes overflows",
                    self.row_pitch, self.height
                ))
            })?;
            if self.slice_pitch < min_slice {
                return Err(RectCheckError::InvalidLayout(format!(
                    "slice pitch {} is smaller than {} rows of {} bytes",
                    self.slice_pitch, self.height, self.row_pitch
                )));
            }
        }

        self.checked_size_bytes().map(|_| ())
    }

    /// Extent of the whole buffer in elements
    pub fn bounds(&self) -> Coord3 {
        [self.width, self.height, self.depth]
    }

    /// Bytes actually occupied by one row's elements
    pub fn row_bytes(&self) -> usize {
        self.width * self.element_size
    }

    /// Number of elements in the buffer
    pub fn element_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Bytes needed to back this layout
    pub fn size_bytes(&self) -> usize {
        if self.depth == 1 {
            self.row_pitch * self.height
        } else {
            self.slice_pitch * self.depth
        }
    }

    fn checked_size_bytes(&self) -> RectResult<usize> {
        let size = if self.depth == 1 {
            self.row_pitch.checked_mul(self.height)
        } else {
            self.slice_pitch.checked_mul(self.depth)
        };
        size.ok_or_else(|| {
            RectCheckError::InvalidLayout(format!(
                "buffer of {}x{}x{} elements overflows the address space",
                self.width, self.height, self.depth
            ))
        })
    }

    /// Byte offset of the element at `coord`
    ///
    /// `index(p) = p.z * slice_pitch + p.y * row_pitch + p.x * element_size`
    pub fn byte_index(&self, coord: Coord3) -> usize {
        coord[2] * self.slice_pitch + coord[1] * self.row_pitch + coord[0] * self.element_size
    }

    /// Whether `region` lies entirely inside this layout
    pub fn contains(&self, region: &Region) -> bool {
        let bounds = self.bounds();
        (0..3).all(|axis| {
            region.offset[axis]
                .checked_add(region.extent[axis])
                .map_or(false, |end| end <= bounds[axis])
        })
    }
}

/// Axis-aligned box inside a buffer, in element units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub offset: Coord3,
    pub extent: Coord3,
}

/// Validate a requested sub-region against a buffer's bounds.
///
/// # Errors
/// - `InvalidExtent` if any extent is zero
/// - `OutOfBounds` if `offset[i] + extent[i] > bounds[i]` on any axis
pub fn make_region(offset: Coord3, extent: Coord3, bounds: Coord3) -> RectResult<Region> {
    if extent.iter().any(|&e| e == 0) {
        return Err(RectCheckError::InvalidExtent { extent });
    }

    for axis in 0..3 {
        let fits = offset[axis]
            .checked_add(extent[axis])
            .map_or(false, |end| end <= bounds[axis]);
        if !fits {
            return Err(RectCheckError::OutOfBounds {
                axis,
                offset: offset[axis],
                extent: extent[axis],
                bound: bounds[axis],
            });
        }
    }

    Ok(Region { offset, extent })
}

/// Split a flattened row-major index into `(x, y, z)` within `extent`.
pub fn decompose(extent: Coord3, i: usize) -> Coord3 {
    let slice = extent[0] * extent[1];
    let z = i / slice;
    let y = (i % slice) / extent[0];
    let x = (i % slice) % extent[0];
    [x, y, z]
}

/// Element-space origin scaled to the byte-space origin used by rect commands
/// (x in bytes, y in rows, z in slices).
pub fn byte_origin(offset: Coord3, element_size: usize) -> Coord3 {
    [offset[0] * element_size, offset[1], offset[2]]
}

impl Region {
    /// Validated region inside `layout`
    pub fn new(offset: Coord3, extent: Coord3, layout: &BufferLayout) -> RectResult<Self> {
        layout.validate()?;
        make_region(offset, extent, layout.bounds())
    }

    /// The entire buffer
    pub fn whole(layout: &BufferLayout) -> Self {
        Region {
            offset: [0, 0, 0],
            extent: layout.bounds(),
        }
    }

    /// Number of elements in the region
    pub fn volume(&self) -> usize {
        self.extent[0] * self.extent[1] * self.extent[2]
    }

    /// Exclusive upper corner
    pub fn end(&self) -> Coord3 {
        [
            self.offset[0] + self.extent[0],
            self.offset[1] + self.extent[1],
            self.offset[2] + self.extent[2],
        ]
    }

    /// Region-relative coordinate of the `i`th element in row-major order
    pub fn coords_of(&self, i: usize) -> Coord3 {
        decompose(self.extent, i)
    }

    /// Absolute coordinate of a region-relative one
    pub fn absolute(&self, relative: Coord3) -> Coord3 {
        [
            self.offset[0] + relative[0],
            self.offset[1] + relative[1],
            self.offset[2] + relative[2],
        ]
    }

    /// Same extent, different origin
    pub fn at(&self, offset: Coord3) -> Region {
        Region {
            offset,
            extent: self.extent,
        }
    }

    /// Byte-space `(origin, region)` pair for rect commands
    pub fn to_bytes(&self, layout: &BufferLayout) -> (Coord3, Coord3) {
        (
            byte_origin(self.offset, layout.element_size),
            [self.extent[0] * layout.element_size, self.extent[1], self.extent[2]],
        )
    }

    /// Row-major walk over region-relative coordinates (x fastest, then y, then z)
    pub fn iter_relative(&self) -> RegionIter {
        RegionIter {
            extent: self.extent,
            next: 0,
            total: self.volume(),
        }
    }
}

/// Iterator returned by [`Region::iter_relative`]
#[derive(Debug, Clone)]
pub struct RegionIter {
    extent: Coord3,
    next: usize,
    total: usize,
}

impl Iterator for RegionIter {
    type Item = Coord3;

    fn next(&mut self) -> Option<Coord3> {
        if self.next >= self.total {
            return None;
        }
        let coord = decompose(self.extent, self.next);
        self.next += 1;
        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RegionIter {}
