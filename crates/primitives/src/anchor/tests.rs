use proptest::prelude::*;

use super::*;

#[test]
fn test_map_offset_before_inside_after() {
	// "abcdef", replace [1,4) with "XY"
	assert_eq!(map_offset(0, 1, 4, 2), 0);
	assert_eq!(map_offset(1, 1, 4, 2), 3);
	assert_eq!(map_offset(2, 1, 4, 2), 3);
	assert_eq!(map_offset(4, 1, 4, 2), 3);
	assert_eq!(map_offset(5, 1, 4, 2), 4);
	assert_eq!(map_offset(6, 1, 4, 2), 5);
}

#[test]
fn test_insertion_at_anchor_moves_it_past_the_text() {
	assert_eq!(map_offset(3, 3, 3, 4), 7);
	assert_eq!(map_offset(2, 3, 3, 4), 2);
}

#[test]
fn test_create_resolve_release() {
	let mut set = AnchorSet::new();
	let a = set.create(4);
	let b = set.create(9);
	assert_ne!(a, b);
	assert_eq!(set.resolve(a), Ok(4));
	assert_eq!(set.release(a), Ok(4));
	assert_eq!(set.resolve(a), Err(BufferError::AnchorNotFound(a)));
	assert_eq!(set.release(a), Err(BufferError::AnchorNotFound(a)));
	assert_eq!(set.len(), 1);
	assert_eq!(set.resolve(b), Ok(9));
}

#[test]
fn test_remap_collapses_covered_anchors() {
	let mut set = AnchorSet::new();
	let a = set.create(2);
	let b = set.create(3);
	set.remap(&Edit::replace(1..4, "XY"));
	assert_eq!(set.resolve(a), Ok(3));
	assert_eq!(set.resolve(b), Ok(3));
}

#[test]
fn test_restore_skips_released_and_keeps_new() {
	let mut set = AnchorSet::new();
	let a = set.create(5);
	let b = set.create(6);
	let saved = set.capture();

	set.remap(&Edit::delete(0..6));
	set.release(b).unwrap();
	let c = set.create(0);
	set.restore(&saved);

	assert_eq!(set.resolve(a), Ok(5));
	assert!(set.resolve(b).is_err());
	assert_eq!(set.resolve(c), Ok(0));
}

proptest! {
	#[test]
	fn prop_equal_anchors_never_diverge(
		offset in 0usize..100,
		start in 0usize..100,
		len in 0usize..20,
		inserted in 0usize..20,
	) {
		let mut set = AnchorSet::new();
		let a = set.create(offset);
		let b = set.create(offset);
		set.remap(&Edit::replace(start..start + len, "x".repeat(inserted)));
		prop_assert_eq!(set.resolve(a), set.resolve(b));
	}

	#[test]
	fn prop_remap_preserves_order(
		x in 0usize..100,
		y in 0usize..100,
		start in 0usize..100,
		len in 0usize..20,
		inserted in 0usize..20,
	) {
		let (lo, hi) = (x.min(y), x.max(y));
		let end = start + len;
		prop_assert!(map_offset(lo, start, end, inserted) <= map_offset(hi, start, end, inserted));
	}
}
