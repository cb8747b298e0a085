use std::ops::Range;

use crate::error::{BufferError, Result};

/// A position in the text, measured in characters (not bytes).
///
/// This is the canonical coordinate space for weft.
pub type CharIdx = usize;

/// A length or count in the text, measured in characters (not bytes).
///
/// This is distinct from CharIdx to avoid accidentally passing an index
/// where a length is expected or vice versa.
pub type CharLen = usize;

/// Validates that `range` is ordered and lies within `[0, len]`.
#[inline]
pub fn check_range(range: &Range<CharIdx>, len: CharLen) -> Result<()> {
	if range.start > range.end || range.end > len {
		return Err(BufferError::Range {
			start: range.start,
			end: range.end,
			len,
		});
	}
	Ok(())
}

/// Validates that `offset` addresses a position in a document of `len` chars.
///
/// The end of the document is a valid position.
#[inline]
pub fn check_offset(offset: CharIdx, len: CharLen) -> Result<()> {
	check_range(&(offset..offset), len)
}

/// Returns true if the closed intervals `[a.start, a.end]` and `[b.start, b.end]` meet.
///
/// Touching counts: an insertion at a boundary touches both neighbours.
#[inline]
pub fn touches(a: &Range<CharIdx>, b: &Range<CharIdx>) -> bool {
	a.start <= b.end && b.start <= a.end
}
