//! Overlap detection for same-buffer rect copies
//!
//! Copying between overlapping source and destination ranges of one buffer
//! is undefined for rect copy commands, so such copies are skipped. All
//! coordinates here are byte-space: x and `region[0]` in bytes, y in rows,
//! z in slices.

use crate::region::{BufferLayout, Coord3, Region};

/// Returns true if the source and destination boxes may share bytes.
///
/// The axis-wise box test is combined (OR) with a linear-range test that is
/// consulted whenever a row runs past `row_pitch`, or a column runs past the
/// slice height, far enough to reach the other box's origin. Both regions
/// are assumed to use the same `row_pitch` and `slice_pitch`. Arithmetic
/// saturates at `usize::MAX`, so arbitrary inputs never panic.
pub fn check_overlap_rect(
    src_offset: Coord3,
    dst_offset: Coord3,
    region: Coord3,
    row_pitch: usize,
    slice_pitch: usize,
) -> bool {
    let src_max = [
        src_offset[0].saturating_add(region[0]),
        src_offset[1].saturating_add(region[1]),
        src_offset[2].saturating_add(region[2]),
    ];
    let dst_max = [
        dst_offset[0].saturating_add(region[0]),
        dst_offset[1].saturating_add(region[1]),
        dst_offset[2].saturating_add(region[2]),
    ];

    let mut overlap = (0..3).all(|i| src_offset[i] < dst_max[i] && src_max[i] > dst_offset[i]);
    if overlap {
        return true;
    }

    let span = linear_start(region, row_pitch, slice_pitch);
    let src_start = linear_start(src_offset, row_pitch, slice_pitch);
    let dst_start = linear_start(dst_offset, row_pitch, slice_pitch);
    let src_end = src_start.saturating_add(span);
    let dst_end = dst_start.saturating_add(span);
    let linear_overlap =
        (src_start <= dst_start && dst_start < src_end) || (dst_start <= src_start && src_start < dst_end);

    // rows spilling past the row pitch
    let delta_src_x = src_max[0].saturating_sub(row_pitch);
    let delta_dst_x = dst_max[0].saturating_sub(row_pitch);
    if (delta_src_x > 0 && delta_src_x > dst_offset[0]) || (delta_dst_x > 0 && delta_dst_x > src_offset[0]) {
        overlap |= linear_overlap;
    }

    // columns spilling past the slice height
    if region[2] > 1 {
        let slice_height = slice_pitch.checked_div(row_pitch).unwrap_or(0);
        let delta_src_y = src_max[1].saturating_sub(slice_height);
        let delta_dst_y = dst_max[1].saturating_sub(slice_height);
        if (delta_src_y > 0 && delta_src_y > dst_offset[1]) || (delta_dst_y > 0 && delta_dst_y > src_offset[1]) {
            overlap |= linear_overlap;
        }
    }

    overlap
}

fn linear_start(offset: Coord3, row_pitch: usize, slice_pitch: usize) -> usize {
    offset[2]
        .saturating_mul(slice_pitch)
        .saturating_add(offset[1].saturating_mul(row_pitch))
        .saturating_add(offset[0])
}

/// Overlap test for two element-space regions of one buffer.
///
/// The source extent is used for both boxes; rect copies require equal extents.
pub fn regions_overlap(layout: &BufferLayout, src: &Region, dst: &Region) -> bool {
    let (src_origin, extent) = src.to_bytes(layout);
    let (dst_origin, _) = dst.to_bytes(layout);
    check_overlap_rect(src_origin, dst_origin, extent, layout.row_pitch, layout.slice_pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_1d_ranges() {
        assert!(!check_overlap_rect([10, 0, 0], [50, 0, 0], [5, 1, 1], 100, 0));
    }

    #[test]
    fn test_intersecting_1d_ranges() {
        assert!(check_overlap_rect([0, 0, 0], [5, 0, 0], [10, 1, 1], 100, 0));
        assert!(check_overlap_rect([5, 0, 0], [0, 0, 0], [10, 1, 1], 100, 0));
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        assert!(!check_overlap_rect([0, 0, 0], [10, 0, 0], [10, 1, 1], 100, 0));
    }

    #[test]
    fn test_identical_offsets_overlap() {
        assert!(check_overlap_rect([3, 2, 1], [3, 2, 1], [2, 2, 2], 16, 256));
    }

    #[test]
    fn test_side_by_side_2d_boxes() {
        // two 2x4 columns in a 8-wide image never touch
        assert!(!check_overlap_rect([0, 0, 0], [4, 0, 0], [2, 4, 1], 8, 0));
    }

    #[test]
    fn test_row_wraparound_detected() {
        // a 6-byte row starting at x=6 in a 8-byte pitch spills 4 bytes into
        // the next row, which is where the destination begins
        assert!(check_overlap_rect([6, 0, 0], [0, 1, 0], [6, 1, 1], 8, 0));
        assert!(check_overlap_rect([0, 1, 0], [6, 0, 0], [6, 1, 1], 8, 0));
    }

    #[test]
    fn test_column_wraparound_detected() {
        // slice height is 4 rows; a 3-row box starting at y=3 spills into the next slice
        assert!(check_overlap_rect([0, 3, 0], [0, 0, 1], [4, 3, 2], 4, 16));
    }

    #[test]
    fn test_extreme_coordinates_saturate() {
        assert!(!check_overlap_rect([usize::MAX, 0, 0], [0, 0, 0], [1, 1, 1], 8, 0));
        assert!(!check_overlap_rect([0, 0, 0], [usize::MAX, 0, 0], [1, 1, 1], 8, 0));

        let near_end = usize::MAX - 4;
        assert!(check_overlap_rect([near_end, 0, 0], [near_end + 1, 0, 0], [2, 1, 1], usize::MAX, 0));

        let cases = [
            ([0, 1, 0], [0, 0, 1], [1, 1, 2], usize::MAX, usize::MAX),
            ([usize::MAX, usize::MAX, usize::MAX], [0, 0, 0], [usize::MAX, 2, 2], 8, 64),
            ([3, usize::MAX, 0], [3, 0, usize::MAX], [4, 4, 4], 1 << 40, 1 << 60),
        ];
        for (a, b, region, row_pitch, slice_pitch) in cases {
            assert_eq!(
                check_overlap_rect(a, b, region, row_pitch, slice_pitch),
                check_overlap_rect(b, a, region, row_pitch, slice_pitch)
            );
        }
    }

    #[test]
    fn test_regions_overlap_scales_element_size() {
        let layout = BufferLayout::new(16, 1, 1, 4).unwrap();
        let a = Region::new([0, 0, 0], [4, 1, 1], &layout).unwrap();
        let b = Region::new([4, 0, 0], [4, 1, 1], &layout).unwrap();
        let c = Region::new([3, 0, 0], [4, 1, 1], &layout).unwrap();
        assert!(!regions_overlap(&layout, &a, &b));
        assert!(regions_overlap(&layout, &a, &c));
    }

    #[test]
    fn test_regions_overlap_3d_disjoint() {
        let layout = BufferLayout::new(8, 8, 8, 4).unwrap();
        let a = Region::new([0, 0, 0], [2, 2, 2], &layout).unwrap();
        let b = Region::new([4, 4, 4], [2, 2, 2], &layout).unwrap();
        assert!(!regions_overlap(&layout, &a, &b));
        assert!(!regions_overlap(&layout, &b, &a));
    }
}
