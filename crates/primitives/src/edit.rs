use std::ops::Range;

use crate::range::{CharIdx, CharLen};
use crate::version::Version;

/// A replacement of the char range `[start, end)` by `text`.
///
/// Pure insertions have an empty range, pure deletions have empty text.
/// The inserted char count is cached because anchor remapping, history
/// coalescing and rebasing all need it on hot paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
	range: Range<CharIdx>,
	text: String,
	text_len: CharLen,
}

impl Edit {
	/// Replaces `range` with `text`.
	///
	/// The range is not validated here; [`Snapshot::apply`](crate::Snapshot::apply)
	/// rejects reversed or out-of-bounds ranges.
	pub fn replace(range: Range<CharIdx>, text: impl Into<String>) -> Self {
		let text = text.into();
		let text_len = text.chars().count();
		Self { range, text, text_len }
	}

	/// Inserts `text` at `at`.
	pub fn insert(at: CharIdx, text: impl Into<String>) -> Self {
		Self::replace(at..at, text)
	}

	/// Deletes `range`.
	pub fn delete(range: Range<CharIdx>) -> Self {
		Self {
			range,
			text: String::new(),
			text_len: 0,
		}
	}

	/// Returns the replaced range in the pre-edit document.
	pub fn range(&self) -> Range<CharIdx> {
		self.range.clone()
	}

	#[inline]
	pub fn start(&self) -> CharIdx {
		self.range.start
	}

	#[inline]
	pub fn end(&self) -> CharIdx {
		self.range.end
	}

	/// Returns the replacement text.
	#[inline]
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Number of chars inserted.
	#[inline]
	pub fn inserted_len(&self) -> CharLen {
		self.text_len
	}

	/// Number of chars removed.
	#[inline]
	pub fn removed_len(&self) -> CharLen {
		self.range.end.saturating_sub(self.range.start)
	}

	/// End of the replacement in the post-edit document.
	#[inline]
	pub fn new_end(&self) -> CharIdx {
		self.range.start + self.text_len
	}

	/// Signed change in document length.
	#[inline]
	pub fn delta(&self) -> isize {
		self.text_len as isize - self.removed_len() as isize
	}

	/// True if nothing is removed.
	#[inline]
	pub fn is_insertion(&self) -> bool {
		self.range.is_empty() && self.text_len > 0
	}

	/// True if nothing is inserted.
	#[inline]
	pub fn is_deletion(&self) -> bool {
		self.text_len == 0 && !self.range.is_empty()
	}

	/// True if the edit changes nothing.
	#[inline]
	pub fn is_noop(&self) -> bool {
		self.range.is_empty() && self.text_len == 0
	}

	/// Returns this edit moved by `delta` chars.
	#[must_use]
	pub(crate) fn shifted(&self, delta: isize) -> Self {
		let shift = |pos: CharIdx| pos.saturating_add_signed(delta);
		Self {
			range: shift(self.range.start)..shift(self.range.end),
			text: self.text.clone(),
			text_len: self.text_len,
		}
	}
}

/// Identifies the logical source of edits for undo coalescing.
///
/// Typing by the same actor may merge into one undo step; edits from
/// different actors never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ActorId(pub u32);

impl ActorId {
	/// The interactive user of the session.
	pub const USER: ActorId = ActorId(0);
}

/// Where an edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
	/// Interactive typing or local editing by an actor.
	Typing(ActorId),
	/// A programmatic change (formatting, refactoring, patch application).
	Command(ActorId),
	/// Undo or redo replaying recorded edits.
	History,
}

impl EditOrigin {
	/// Returns the actor responsible for the edit, if any.
	pub fn actor(self) -> Option<ActorId> {
		match self {
			Self::Typing(actor) | Self::Command(actor) => Some(actor),
			Self::History => None,
		}
	}

	/// True for interactive typing.
	pub fn is_typing(self) -> bool {
		matches!(self, Self::Typing(_))
	}
}

impl Default for EditOrigin {
	fn default() -> Self {
		Self::Typing(ActorId::USER)
	}
}

/// An edit as it landed on a concrete snapshot.
///
/// Carries the removed text so the edit can be inverted without the
/// pre-edit snapshot, and the versions it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
	pub edit: Edit,
	pub removed: String,
	pub base: Version,
	pub result: Version,
}

impl AppliedEdit {
	/// Returns the edit that restores the pre-edit content.
	pub fn inverse(&self) -> Edit {
		Edit::replace(self.edit.start()..self.edit.new_end(), self.removed.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_edit_lengths_count_chars() {
		let edit = Edit::replace(2..4, "héllo");
		assert_eq!(edit.inserted_len(), 5);
		assert_eq!(edit.removed_len(), 2);
		assert_eq!(edit.new_end(), 7);
		assert_eq!(edit.delta(), 3);
	}

	#[test]
	fn test_edit_classification() {
		assert!(Edit::insert(3, "x").is_insertion());
		assert!(Edit::delete(1..2).is_deletion());
		assert!(Edit::insert(3, "").is_noop());
		assert!(!Edit::replace(1..2, "x").is_insertion());
	}

	#[test]
	fn test_inverse_restores_removed_text() {
		let applied = AppliedEdit {
			edit: Edit::replace(1..4, "XY"),
			removed: "bcd".into(),
			base: Version::new(1),
			result: Version::new(2),
		};
		assert_eq!(applied.inverse(), Edit::replace(1..3, "bcd"));
	}
}
