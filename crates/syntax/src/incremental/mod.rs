//! Incremental re-derivation of a structural model after edits.
//!
//! The edits since the previous model are folded into one damaged region.
//! Re-derivation starts in the deepest container whose interior encloses
//! the damage and re-parses only the run of children touching it, padded
//! by one sibling on each side. A run is accepted when the grammar reports
//! a neutral lexical state at its end and its last item lines up with the
//! old child it replaces; otherwise the run grows by one sibling, then
//! climbs to the parent container. At the root the run can always grow to
//! the end of the document, so derivation terminates.
//!
//! Unchanged siblings are carried over as the same `Arc`s, so their stamps
//! and ids survive. Ancestors of the re-derived run are rebuilt.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, trace, warn};
use weft_primitives::range::touches;
use weft_primitives::{CharIdx, CharLen, Edit, Snapshot};
use weft_worker::GenerationToken;

use crate::grammar::{Grammar, ParseContext, StructureError};
use crate::node::{Node, NodeKind, Provenance, StructuralModel};

/// The region changed by a sequence of edits.
///
/// Text before `start` is untouched, so `start` is shared by both
/// coordinate spaces. `[start, old_end)` in the old text became
/// `[start, new_end)` in the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
	pub start: CharIdx,
	pub old_end: CharIdx,
	pub new_end: CharIdx,
}

impl Damage {
	/// Folds consecutive edits, each expressed against the text left by the
	/// previous one, into a single damaged region. Returns `None` when no
	/// edit changes the text.
	pub fn from_edits<'a>(edits: impl IntoIterator<Item = &'a Edit>) -> Option<Damage> {
		let mut damage: Option<Damage> = None;
		for edit in edits {
			if edit.is_noop() {
				continue;
			}
			damage = Some(match damage {
				None => Damage {
					start: edit.start(),
					old_end: edit.end(),
					new_end: edit.new_end(),
				},
				Some(d) => {
					let hi = d.new_end.max(edit.end());
					Damage {
						start: d.start.min(edit.start()),
						old_end: d.old_end + (hi - d.new_end),
						new_end: hi - edit.removed_len() + edit.inserted_len(),
					}
				}
			});
		}
		damage
	}

	/// Change in document length.
	pub fn delta(&self) -> isize {
		self.new_end as isize - self.old_end as isize
	}
}

/// Bookkeeping for one derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationStats {
	pub provenance: Provenance,
	/// Chars handed to the grammar.
	pub reparsed: CharLen,
	/// Times a run grew by a sibling or climbed to a parent.
	pub widenings: usize,
}

/// A derived model plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Derivation {
	pub model: StructuralModel,
	pub stats: DerivationStats,
}

/// One container on the descent from the root.
struct PathEntry {
	node: Arc<Node>,
	/// Absolute start in the old text.
	start: CharIdx,
	/// Position among the parent's children.
	index: usize,
}

/// Derives structural models, reusing the previous model where possible.
#[derive(Clone)]
pub struct IncrementalAnalyzer {
	grammar: Arc<dyn Grammar>,
}

impl std::fmt::Debug for IncrementalAnalyzer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IncrementalAnalyzer").field("grammar", &self.grammar.name()).finish()
	}
}

fn check_tiling(items: &[Arc<Node>], expected: CharLen) -> Result<(), StructureError> {
	let covered: CharLen = items.iter().map(|n| n.len()).sum();
	if covered != expected {
		return Err(StructureError::Tiling { expected, covered });
	}
	Ok(())
}

fn same_outline(a: &Node, b: &Node) -> bool {
	a.kind() == b.kind() && a.len() == b.len() && a.open_len() == b.open_len() && a.close_len() == b.close_len()
}

impl IncrementalAnalyzer {
	pub fn new(grammar: Arc<dyn Grammar>) -> Self {
		Self { grammar }
	}

	pub fn grammar(&self) -> &Arc<dyn Grammar> {
		&self.grammar
	}

	/// Derives a model for `snapshot` from scratch.
	///
	/// Grammar failures produce the degenerate model; only cancellation is
	/// returned as an error.
	pub fn analyze(&self, snapshot: &Snapshot, cancel: &GenerationToken) -> Result<Derivation, StructureError> {
		let version = snapshot.version();
		let text = snapshot.rope().slice(..);
		let len = text.len_chars();
		let parsed = self
			.grammar
			.parse_items(text, ParseContext::ROOT, version, cancel)
			.and_then(|parsed| check_tiling(&parsed.items, len).map(|()| parsed));
		match parsed {
			Ok(parsed) => {
				let root = Node::container(NodeKind::ROOT, 0, parsed.items, 0, version);
				Ok(Derivation {
					model: StructuralModel::new(root, version, Provenance::Full),
					stats: DerivationStats {
						provenance: Provenance::Full,
						reparsed: len,
						widenings: 0,
					},
				})
			}
			Err(StructureError::Cancelled) => Err(StructureError::Cancelled),
			Err(error) => Ok(self.degenerate(snapshot, &error)),
		}
	}

	fn degenerate(&self, snapshot: &Snapshot, error: &StructureError) -> Derivation {
		warn!(
			grammar = self.grammar.name(),
			version = snapshot.version().get(),
			%error,
			"structure.degenerate"
		);
		Derivation {
			model: StructuralModel::degenerate(snapshot.len_chars(), snapshot.version(), Provenance::Degenerate),
			stats: DerivationStats {
				provenance: Provenance::Degenerate,
				reparsed: 0,
				widenings: 0,
			},
		}
	}

	/// Derives a model for `snapshot` from `model` and the edits that turned
	/// the model's text into the snapshot's text, in application order.
	///
	/// Falls back to [`analyze`](Self::analyze) when the previous model has
	/// no structure to reuse, when the edits do not fit it, or when the
	/// grammar fails during the incremental pass.
	pub fn on_edit(&self, model: &StructuralModel, edits: &[Edit], snapshot: &Snapshot, cancel: &GenerationToken) -> Result<Derivation, StructureError> {
		if model.is_degenerate() {
			return self.analyze(snapshot, cancel);
		}
		let Some(damage) = Damage::from_edits(edits) else {
			if model.len() != snapshot.len_chars() {
				return self.analyze(snapshot, cancel);
			}
			return Ok(Derivation {
				model: StructuralModel::new(model.root_node().clone(), snapshot.version(), Provenance::Incremental),
				stats: DerivationStats {
					provenance: Provenance::Incremental,
					reparsed: 0,
					widenings: 0,
				},
			});
		};

		let fits = damage.old_end <= model.len() && model.len().checked_add_signed(damage.delta()) == Some(snapshot.len_chars());
		if !fits {
			debug!(
				model_len = model.len(),
				doc_len = snapshot.len_chars(),
				"structure.edits_do_not_fit_model"
			);
			return self.analyze(snapshot, cancel);
		}

		match self.reparse(model.root_node(), damage, snapshot, cancel) {
			Ok((root, reparsed, widenings)) => {
				trace!(
					version = snapshot.version().get(),
					reparsed,
					widenings,
					"structure.incremental"
				);
				Ok(Derivation {
					model: StructuralModel::new(root, snapshot.version(), Provenance::Incremental),
					stats: DerivationStats {
						provenance: Provenance::Incremental,
						reparsed,
						widenings,
					},
				})
			}
			Err(StructureError::Cancelled) => Err(StructureError::Cancelled),
			Err(error) => {
				debug!(%error, "structure.incremental_fallback");
				self.analyze(snapshot, cancel)
			}
		}
	}

	/// Descends from `root` to the deepest delimited container whose
	/// interior encloses `damage` in old coordinates.
	fn descend(root: &Arc<Node>, damage: Damage) -> Vec<PathEntry> {
		let mut path = vec![PathEntry {
			node: root.clone(),
			start: 0,
			index: 0,
		}];
		loop {
			let Some(top) = path.last() else { break };
			let mut at = top.start + top.node.open_len();
			let mut next = None;
			for (index, child) in top.node.children().iter().enumerate() {
				let start = at;
				at += child.len();
				if start > damage.old_end {
					break;
				}
				if child.open_len() == 0 {
					continue;
				}
				let interior = start + child.open_len()..start + child.len() - child.close_len();
				if interior.start <= damage.start && damage.old_end <= interior.end {
					next = Some(PathEntry {
						node: child.clone(),
						start,
						index,
					});
					break;
				}
			}
			match next {
				Some(entry) => path.push(entry),
				None => break,
			}
		}
		path
	}

	/// Re-derives the damaged region and returns the new root, the number of
	/// chars re-parsed and the number of widenings.
	fn reparse(&self, root: &Arc<Node>, damage: Damage, snapshot: &Snapshot, cancel: &GenerationToken) -> Result<(Arc<Node>, CharLen, usize), StructureError> {
		let stamp = snapshot.version();
		let text = snapshot.rope().slice(..);
		let delta = damage.delta();
		let lookahead = self.grammar.lookahead().max(1);

		let mut path = Self::descend(root, damage);
		let mut region = damage.start..damage.old_end;
		let mut reparsed = 0;
		let mut widenings = 0;

		loop {
			if cancel.is_cancelled() {
				return Err(StructureError::Cancelled);
			}
			let Some(entry) = path.last() else {
				return Err(StructureError::Grammar("descent path exhausted".into()));
			};
			let node = &entry.node;
			let children = node.children();
			let n = children.len();
			let interior_start = entry.start + node.open_len();
			let interior_end = entry.start + node.len() - node.close_len();
			let context = ParseContext {
				kind: node.kind(),
				depth: path.len() - 1,
			};
			let at_root = path.len() == 1;

			let mut starts = Vec::with_capacity(n);
			let mut at = interior_start;
			for child in children {
				starts.push(at);
				at += child.len();
			}
			let span = |i: usize| starts[i]..starts[i] + children[i].len();

			// Children touching the damage, padded by one sibling each side and
			// on the left by enough unchanged text to cover the lexer's lookahead.
			let (mut first, mut last) = (0, 0);
			if n > 0 {
				first = (0..n).find(|&i| touches(&span(i), &region)).unwrap_or(0);
				last = (0..n).rev().find(|&i| touches(&span(i), &region)).unwrap_or(n - 1);
				first = first.saturating_sub(1);
				while first > 0 && region.start.saturating_sub(starts[first]) < lookahead {
					first -= 1;
				}
				last = (last + 1).min(n - 1);
			}

			loop {
				let (old_start, old_end) = if n == 0 {
					(interior_start, interior_end)
				} else {
					(starts[first], span(last).end)
				};
				let Some(new_end) = old_end.checked_add_signed(delta) else {
					return Err(StructureError::Grammar("damage outside region".into()));
				};
				let slice = text.slice(old_start..new_end);
				reparsed += new_end - old_start;

				let parsed = self.grammar.parse_items(slice, context, stamp, cancel)?;
				let reaches_end = n == 0 || last == n - 1;
				let accept = if parsed.settled {
					reaches_end || parsed.items.last().is_some_and(|item| same_outline(item, &children[last]))
				} else {
					at_root && reaches_end
				};

				if accept {
					check_tiling(&parsed.items, new_end - old_start)?;
					let run = if n == 0 { &children[..0] } else { &children[first..=last] };
					let items = reuse_unchanged(parsed.items, run, old_start, damage);

					let mut new_children = Vec::with_capacity(n + items.len());
					if n > 0 {
						new_children.extend(children[..first].iter().cloned());
						new_children.extend(items);
						new_children.extend(children[last + 1..].iter().cloned());
					} else {
						new_children.extend(items);
					}
					let mut rebuilt = node.with_children(new_children, stamp);

					for i in (1..path.len()).rev() {
						let parent = &path[i - 1].node;
						let mut siblings = parent.children().to_vec();
						siblings[path[i].index] = rebuilt;
						rebuilt = parent.with_children(siblings, stamp);
					}
					return Ok((rebuilt, reparsed, widenings));
				}

				if n > 0 && last + 1 < n {
					last += 1;
					widenings += 1;
					continue;
				}
				break;
			}

			if at_root {
				return Err(StructureError::Grammar("root run did not settle".into()));
			}
			if let Some(exhausted) = path.pop() {
				region = exhausted.start..exhausted.start + exhausted.node.len();
				widenings += 1;
			}
		}
	}
}

/// Swaps freshly derived items for the old nodes they duplicate.
///
/// An item lying entirely outside the damaged text covers the same text as
/// the old child at the corresponding position; if the outlines agree, the
/// old subtree is identical and keeps its identity.
fn reuse_unchanged(items: Vec<Arc<Node>>, run: &[Arc<Node>], run_start: CharIdx, damage: Damage) -> Vec<Arc<Node>> {
	let delta = damage.delta();
	let mut old = Vec::with_capacity(run.len());
	let mut at = run_start;
	for child in run {
		old.push((at, child));
		at += child.len();
	}

	let mut out = Vec::with_capacity(items.len());
	let mut at = run_start;
	for item in items {
		let start = at;
		let end = at + item.len();
		at = end;
		let old_start = if end <= damage.start {
			Some(start)
		} else if start >= damage.new_end {
			start.checked_add_signed(-delta)
		} else {
			None
		};
		let reused = old_start.and_then(|s| {
			old.iter()
				.find(|(o, child)| *o == s && same_outline(child, &item))
				.map(|(_, child)| Arc::clone(child))
		});
		out.push(reused.unwrap_or(item));
	}
	out
}
