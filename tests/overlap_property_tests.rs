//! Property tests for the overlap rule and shadow mirroring

use std::collections::HashSet;

use proptest::prelude::*;
use rectcheck::{
    check_overlap_rect, mirror_copy, mirror_copy_within, regions_overlap, BufferLayout, CopyOutcome, HostRectDevice,
    MirrorExecutor, Region, Verifier,
};

/// A small layout and two equally shaped in-bounds regions of it
fn layout_and_regions() -> impl Strategy<Value = (BufferLayout, Region, Region)> {
    (1usize..7, 1usize..6, 1usize..5, 1usize..4)
        .prop_flat_map(|(w, h, d, es)| {
            let layout = BufferLayout::new(w, h, d, es).unwrap();
            (Just(layout), 1..=w, 1..=h, 1..=d)
        })
        .prop_flat_map(|(layout, ew, eh, ed)| {
            let b = layout.bounds();
            (
                Just(layout),
                Just([ew, eh, ed]),
                (0..=b[0] - ew, 0..=b[1] - eh, 0..=b[2] - ed),
                (0..=b[0] - ew, 0..=b[1] - eh, 0..=b[2] - ed),
            )
        })
        .prop_map(|(layout, extent, (sx, sy, sz), (dx, dy, dz))| {
            (
                layout,
                Region {
                    offset: [sx, sy, sz],
                    extent,
                },
                Region {
                    offset: [dx, dy, dz],
                    extent,
                },
            )
        })
}

fn touched_bytes(layout: &BufferLayout, region: &Region) -> HashSet<usize> {
    let mut bytes = HashSet::new();
    for rel in region.iter_relative() {
        let start = layout.byte_index(region.absolute(rel));
        bytes.extend(start..start + layout.element_size);
    }
    bytes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_overlap_is_symmetric(
        src in prop::array::uniform3(0usize..40),
        dst in prop::array::uniform3(0usize..40),
        region in prop::array::uniform3(1usize..20),
        row_pitch in 1usize..64,
        slice_factor in 0usize..64,
    ) {
        let slice_pitch = row_pitch * slice_factor;
        prop_assert_eq!(
            check_overlap_rect(src, dst, region, row_pitch, slice_pitch),
            check_overlap_rect(dst, src, region, row_pitch, slice_pitch)
        );
    }

    #[test]
    fn test_in_bounds_overlap_matches_shared_bytes((layout, src, dst) in layout_and_regions()) {
        let shared = !touched_bytes(&layout, &src).is_disjoint(&touched_bytes(&layout, &dst));
        prop_assert_eq!(regions_overlap(&layout, &src, &dst), shared);
    }

    #[test]
    fn test_same_offset_copy_is_skipped((layout, src, _dst) in layout_and_regions(), seed in any::<u64>()) {
        let mut exec = MirrorExecutor::new(HostRectDevice::new(), seed);
        let a = exec.add_random_buffer(layout).unwrap();
        let before = exec.buffer(a).unwrap().shadow().to_vec();

        prop_assert_eq!(exec.copy_region(a, src, a, src).unwrap(), CopyOutcome::SkippedOverlap);
        prop_assert_eq!(exec.buffer(a).unwrap().shadow(), &before[..]);
    }

    #[test]
    fn test_copy_full_coverage((layout, src, dst) in layout_and_regions(), seed in any::<u64>()) {
        let mut exec = MirrorExecutor::new(HostRectDevice::new(), seed);
        let a = exec.add_random_buffer(layout).unwrap();
        let b = exec.add_random_buffer(layout).unwrap();

        prop_assert_eq!(exec.copy_region(a, src, b, dst).unwrap(), CopyOutcome::Copied);
        exec.verify_all().unwrap();

        let es = layout.element_size;
        let sa = exec.buffer(a).unwrap().shadow();
        let sb = exec.buffer(b).unwrap().shadow();
        for rel in src.iter_relative() {
            let i = layout.byte_index(src.absolute(rel));
            let j = layout.byte_index(dst.absolute(rel));
            prop_assert_eq!(&sa[i..i + es], &sb[j..j + es]);
        }
    }

    #[test]
    fn test_copy_round_trip((layout, src, dst) in layout_and_regions(), seed in any::<u64>()) {
        let mut exec = MirrorExecutor::new(HostRectDevice::new(), seed);
        let a = exec.add_random_buffer(layout).unwrap();
        let b = exec.add_random_buffer(layout).unwrap();
        let original = exec.buffer(a).unwrap().shadow().to_vec();

        prop_assert_eq!(exec.copy_region(a, src, b, dst).unwrap(), CopyOutcome::Copied);
        prop_assert_eq!(exec.copy_region(b, dst, a, src).unwrap(), CopyOutcome::Copied);

        prop_assert_eq!(exec.buffer(a).unwrap().shadow(), &original[..]);
        exec.verify_all().unwrap();
    }

    #[test]
    fn test_mirror_copy_touches_only_destination((layout, src, dst) in layout_and_regions()) {
        let source: Vec<u8> = (0..layout.size_bytes()).map(|i| (i % 251) as u8 + 1).collect();
        let mut target = vec![0u8; layout.size_bytes()];
        mirror_copy(&source, &layout, src.offset, &mut target, &layout, dst.offset, src.extent).unwrap();

        let written = touched_bytes(&layout, &dst);
        for (i, &b) in target.iter().enumerate() {
            prop_assert_eq!(b != 0, written.contains(&i), "byte {}", i);
        }
    }

    #[test]
    fn test_single_byte_difference_always_found(
        (layout, _src, _dst) in layout_and_regions(),
        pick in any::<prop::sample::Index>(),
    ) {
        let expected = vec![0x5au8; layout.size_bytes()];
        let mut actual = expected.clone();
        let flipped = pick.index(actual.len());
        actual[flipped] ^= 0x80;

        let err = Verifier::default()
            .verify(&actual, &expected, &layout, &Region::whole(&layout))
            .unwrap_err();
        let report = err.mismatch_report().unwrap();
        prop_assert_eq!(report.total, 1);
        prop_assert_eq!(report.checked, layout.element_count());

        let first = report.first().unwrap();
        let es = layout.element_size;
        let element = flipped / es;
        prop_assert_eq!(first.byte, flipped % es);
        prop_assert_eq!(first.ordinal, element);
        prop_assert_eq!(
            first.coordinate,
            [element % layout.width, (element / layout.width) % layout.height, element / (layout.width * layout.height)]
        );
    }
}

proptest! {
    // most small same-buffer pairs overlap and are filtered out
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_global_rejects: 8192,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_same_buffer_round_trip((layout, src, dst) in layout_and_regions(), seed in any::<u64>()) {
        prop_assume!(!regions_overlap(&layout, &src, &dst));

        let mut exec = MirrorExecutor::new(HostRectDevice::new(), seed);
        let a = exec.add_random_buffer(layout).unwrap();
        let original = exec.buffer(a).unwrap().shadow().to_vec();

        prop_assert_eq!(exec.copy_region(a, src, a, dst).unwrap(), CopyOutcome::Copied);
        prop_assert_eq!(exec.copy_region(a, dst, a, src).unwrap(), CopyOutcome::Copied);

        // src is restored, dst holds src's bytes, nothing else moved
        let mut expected = original.clone();
        mirror_copy_within(&mut expected, &layout, src.offset, dst.offset, src.extent).unwrap();
        let shadow = exec.buffer(a).unwrap().shadow();
        prop_assert_eq!(shadow, &expected[..]);

        let es = layout.element_size;
        for rel in src.iter_relative() {
            let i = layout.byte_index(src.absolute(rel));
            prop_assert_eq!(&shadow[i..i + es], &original[i..i + es]);
        }
        exec.verify_all().unwrap();
    }
}
