//! Rebasing: re-expressing an edit computed against an older version in
//! terms of the current one.
//!
//! This is the inclusion transformation of operational transformation,
//! specialised to single-range replacements. The later edit ("over") has
//! already been applied; the rebased edit must keep the text it inserted.
//!
//! - `over` entirely before the edit: the edit shifts by `over`'s delta.
//!   An insertion by `over` at the edit's start counts as before.
//! - `over` entirely after the edit: the edit is unchanged.
//! - overlapping: the parts of the edit's range that `over` did not
//!   already remove survive. If `over` sits strictly inside the edit, the
//!   edit splits around `over`'s inserted text. If nothing survives, the
//!   edit's text is inserted just after `over`'s replacement.
//!
//! Multi-part results are ordered by descending start: applying them in
//! order never shifts a later part.

use smallvec::{SmallVec, smallvec};

use crate::edit::Edit;

/// Rebases `edit` over `over`, both computed against the same document.
pub fn rebase(edit: &Edit, over: &Edit) -> SmallVec<[Edit; 2]> {
	let (a, b) = (edit.start(), edit.end());
	let (s, t) = (over.start(), over.end());

	if t <= a {
		return smallvec![edit.shifted(over.delta())];
	}
	if s >= b {
		return smallvec![edit.clone()];
	}

	let after_over = s + over.inserted_len();
	let left = a < s;
	let right = b > t;

	let parts: SmallVec<[Edit; 2]> = match (left, right) {
		(true, true) => {
			let tail = after_over..after_over + (b - t);
			smallvec![Edit::delete(tail), Edit::replace(a..s, edit.text())]
		}
		(true, false) => smallvec![Edit::replace(a..s, edit.text())],
		(false, true) => {
			smallvec![Edit::replace(after_over..after_over + (b - t), edit.text())]
		}
		(false, false) => smallvec![Edit::insert(after_over, edit.text())],
	};

	parts.into_iter().filter(|part| !part.is_noop()).collect()
}

/// Rebases `edit` over a sequence of later edits, oldest first.
///
/// Returns the parts to apply, in order, against the document produced by
/// the last edit of `overs`.
pub fn rebase_through<'a>(edit: &Edit, overs: impl IntoIterator<Item = &'a Edit>) -> Vec<Edit> {
	let mut parts = vec![edit.clone()];
	for over in overs {
		parts = parts.iter().flat_map(|part| rebase(part, over)).collect();
		if parts.is_empty() {
			break;
		}
	}
	parts
}
