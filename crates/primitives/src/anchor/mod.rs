//! Anchors: consumer-owned positions that the buffer keeps pointing at the
//! same logical place in the text across edits.
//!
//! # Remapping
//!
//! For an edit replacing `[start, end)` with `L` chars, an anchor at `o`
//! moves to:
//!
//! - `o` when `o < start`
//! - `start + L` when `start <= o <= end`
//! - `o - (end - start) + L` when `o > end`
//!
//! The rule is a pure function of the offset, so anchors that were equal
//! before an edit are equal after it.

#[cfg(test)]
mod tests;

use std::fmt;

use rustc_hash::FxHashMap;

use crate::edit::Edit;
use crate::error::{BufferError, Result};
use crate::range::CharIdx;

/// Handle to an anchor tracked by an [`AnchorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorId(u64);

impl AnchorId {
	/// Returns the raw id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for AnchorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Maps `offset` through an edit of `[start, end)` replaced by `inserted` chars.
#[inline]
pub fn map_offset(offset: CharIdx, start: CharIdx, end: CharIdx, inserted: usize) -> CharIdx {
	if offset < start {
		offset
	} else if offset <= end {
		start + inserted
	} else {
		offset - (end - start) + inserted
	}
}

/// Saved anchor positions, used by history to restore anchors exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorPositions(FxHashMap<AnchorId, CharIdx>);

impl AnchorPositions {
	pub fn get(&self, id: AnchorId) -> Option<CharIdx> {
		self.0.get(&id).copied()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// The set of live anchors of one document.
#[derive(Debug, Default)]
pub struct AnchorSet {
	next_id: u64,
	positions: FxHashMap<AnchorId, CharIdx>,
}

impl AnchorSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts tracking `offset` and returns its handle.
	///
	/// The offset is trusted; the session validates it against the current
	/// snapshot before calling.
	pub fn create(&mut self, offset: CharIdx) -> AnchorId {
		let id = AnchorId(self.next_id);
		self.next_id += 1;
		self.positions.insert(id, offset);
		id
	}

	/// Returns the current offset of an anchor.
	pub fn resolve(&self, id: AnchorId) -> Result<CharIdx> {
		self.positions.get(&id).copied().ok_or(BufferError::AnchorNotFound(id))
	}

	/// Stops tracking an anchor.
	pub fn release(&mut self, id: AnchorId) -> Result<CharIdx> {
		self.positions.remove(&id).ok_or(BufferError::AnchorNotFound(id))
	}

	/// Number of live anchors.
	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	/// Iterates live anchors in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (AnchorId, CharIdx)> + '_ {
		self.positions.iter().map(|(&id, &offset)| (id, offset))
	}

	/// Moves every anchor through `edit`.
	pub fn remap(&mut self, edit: &Edit) {
		let (start, end, inserted) = (edit.start(), edit.end(), edit.inserted_len());
		for offset in self.positions.values_mut() {
			*offset = map_offset(*offset, start, end, inserted);
		}
	}

	/// Captures the current positions of all anchors.
	pub fn capture(&self) -> AnchorPositions {
		AnchorPositions(self.positions.clone())
	}

	/// Restores saved positions for anchors that are still live.
	///
	/// Anchors released since the capture stay released; anchors created
	/// since keep their current (already remapped) position.
	pub fn restore(&mut self, saved: &AnchorPositions) {
		for (id, offset) in &mut self.positions {
			if let Some(&saved) = saved.0.get(id) {
				*offset = saved;
			}
		}
	}
}
