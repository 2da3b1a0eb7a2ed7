//! Element-wise comparison of device output against shadow buffers
//!
//! The [`Verifier`] walks a region in row-major order and compares every byte
//! of every element. By default it keeps going after the first mismatch and
//! records up to [`Verifier::DEFAULT_MAX_REPORTED`] examples, so one failure
//! report shows whether a whole row, a whole slice or a single byte is wrong.

use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::error::{RectCheckError, RectResult};
use crate::region::{BufferLayout, Coord3, Region};

/// One differing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Row-major index of the element within the compared region
    pub ordinal: usize,
    /// Region-relative `(x, y, z)` of the element
    pub coordinate: Coord3,
    /// Byte within the element
    pub byte: usize,
    pub expected: u8,
    pub actual: u8,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "comparison {} at coordinate ({}, {}, {}) byte {}: 0x{:02x} != 0x{:02x}",
            self.ordinal,
            self.coordinate[0],
            self.coordinate[1],
            self.coordinate[2],
            self.byte,
            self.actual,
            self.expected
        )
    }
}

/// Result of a failed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchReport {
    /// Elements compared before stopping
    pub checked: usize,
    /// Elements found to differ
    pub total: usize,
    /// The first few differences, capped by the verifier
    pub mismatches: Vec<Mismatch>,
}

impl MismatchReport {
    pub fn first(&self) -> Option<&Mismatch> {
        self.mismatches.first()
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} elements differ", self.total, self.checked)?;
        if let Some(first) = self.first() {
            write!(f, "; first {}", first)?;
        }
        Ok(())
    }
}

impl std::error::Error for MismatchReport {}

/// Region comparator with a mismatch reporting cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verifier {
    max_reported: usize,
    stop_at_first: bool,
}

impl Default for Verifier {
    fn default() -> Self {
        Verifier {
            max_reported: Self::DEFAULT_MAX_REPORTED,
            stop_at_first: false,
        }
    }
}

impl Verifier {
    /// Examples kept by the default verifier
    pub const DEFAULT_MAX_REPORTED: usize = 5;

    /// Continue through the whole region, keeping up to `max_reported` examples
    pub fn new(max_reported: usize) -> Self {
        Verifier {
            max_reported: max_reported.max(1),
            stop_at_first: false,
        }
    }

    /// Stop at the first differing element
    pub fn first_only() -> Self {
        Verifier {
            max_reported: 1,
            stop_at_first: true,
        }
    }

    /// Most mismatches kept in one report
    pub fn max_reported(&self) -> usize {
        self.max_reported
    }

    /// Compare `region` of two buffers that share `layout`.
    pub fn verify(&self, actual: &[u8], expected: &[u8], layout: &BufferLayout, region: &Region) -> RectResult<()> {
        self.verify_region(actual, layout, region.offset, expected, layout, region.offset, region.extent)
    }

    /// Compare the box of `extent` at `actual_offset` in `actual` with the box
    /// at `expected_offset` in `expected`.
    ///
    /// # Errors
    /// - `InvalidLayout` if the element sizes differ or a box does not fit
    ///   its layout or backing slice
    /// - `Mismatch` with coordinates of the first differences
    pub fn verify_region(
        &self,
        actual: &[u8],
        actual_layout: &BufferLayout,
        actual_offset: Coord3,
        expected: &[u8],
        expected_layout: &BufferLayout,
        expected_offset: Coord3,
        extent: Coord3,
    ) -> RectResult<()> {
        if actual_layout.element_size != expected_layout.element_size {
            return Err(crate::layout_error!(
                "element sizes differ: {} != {}",
                actual_layout.element_size,
                expected_layout.element_size
            ));
        }
        let actual_region = Region::new(actual_offset, extent, actual_layout)?;
        let expected_region = Region::new(expected_offset, extent, expected_layout)?;
        check_backing("actual", actual, actual_layout)?;
        check_backing("expected", expected, expected_layout)?;

        let element_size = actual_layout.element_size;
        let mut report = MismatchReport {
            checked: 0,
            total: 0,
            mismatches: Vec::new(),
        };

        for (ordinal, rel) in actual_region.iter_relative().enumerate() {
            let a = actual_layout.byte_index(actual_region.absolute(rel));
            let e = expected_layout.byte_index(expected_region.absolute(rel));
            let a_bytes = &actual[a..a + element_size];
            let e_bytes = &expected[e..e + element_size];
            report.checked += 1;

            if a_bytes == e_bytes {
                continue;
            }

            report.total += 1;
            if report.mismatches.len() < self.max_reported {
                if let Some(byte) = (0..element_size).find(|&b| a_bytes[b] != e_bytes[b]) {
                    report.mismatches.push(Mismatch {
                        ordinal,
                        coordinate: rel,
                        byte,
                        expected: e_bytes[byte],
                        actual: a_bytes[byte],
                    });
                }
            }
            if self.stop_at_first {
                break;
            }
        }

        if report.total == 0 {
            return Ok(());
        }

        for mismatch in &report.mismatches {
            tracing::error!("Verify failed on {}", mismatch);
        }
        Err(RectCheckError::Mismatch(report))
    }
}

fn check_backing(what: &str, buf: &[u8], layout: &BufferLayout) -> RectResult<()> {
    layout.validate()?;
    if buf.len() < layout.size_bytes() {
        return Err(crate::layout_error!(
            "{} buffer holds {} bytes, layout needs {}",
            what,
            buf.len(),
            layout.size_bytes()
        ));
    }
    Ok(())
}

/// Render a buffer slice by slice as hex rows, for debug logs.
pub fn hex_dump(buf: &[u8], layout: &BufferLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Size = {}x{}x{} ({} total)",
        layout.width,
        layout.height,
        layout.depth,
        layout.element_count()
    );
    for z in 0..layout.depth {
        let _ = writeln!(out, "Slice: {}", z);
        for y in 0..layout.height {
            for x in 0..layout.width {
                let start = layout.byte_index([x, y, z]);
                match buf.get(start..start + layout.element_size) {
                    Some(bytes) => {
                        for b in bytes {
                            let _ = write!(out, "{:02x}", b);
                        }
                    }
                    None => out.push_str("--"),
                }
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
