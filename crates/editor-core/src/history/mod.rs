//! Undo history and the forward delta log of a document.
//!
//! History is linear and grouped: a step bundles the edits of one
//! user-perceived operation, such as a typing run, and undoing it replays
//! their inverses in reverse order. Each step remembers the anchor
//! positions on both sides so undo and redo restore anchors exactly.
//!
//! Separately, every edit that produced a version (including undo and
//! redo replays) is kept in a bounded delta log so edits computed against
//! a recent version can be rebased onto the current one.


use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::trace;
use weft_primitives::{ActorId, AnchorPositions, AppliedEdit, Edit, EditOrigin, Version};

/// Maximum undo history size in steps.
pub const MAX_UNDO: usize = 100;

/// Maximum undo memory usage in bytes (10MB).
pub const MAX_UNDO_BYTES: usize = 10 * 1024 * 1024;

/// Idle gap after which typing starts a new undo step.
pub const DEFAULT_COALESCE_IDLE_MS: u64 = 1000;

/// Number of versions kept in the delta log for rebasing.
pub const DEFAULT_DELTA_WINDOW: usize = 1024;

/// Fixed per-edit overhead counted against [`MAX_UNDO_BYTES`].
const EDIT_OVERHEAD_BYTES: usize = 32;

/// Approximate cost of one saved anchor position.
const ANCHOR_BYTES: usize = 16;

/// History limits and grouping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
	/// Longest pause between keystrokes that still extends a typing step.
	pub coalesce_idle_ms: u64,
	/// Maximum number of undo steps; the oldest are evicted first.
	pub max_steps: usize,
	/// Maximum bytes retained by undo steps; the oldest are evicted first.
	pub max_bytes: usize,
	/// Number of recent versions whose edits stay available for rebasing.
	pub delta_window: usize,
}

impl Default for HistoryConfig {
	fn default() -> Self {
		Self {
			coalesce_idle_ms: DEFAULT_COALESCE_IDLE_MS,
			max_steps: MAX_UNDO,
			max_bytes: MAX_UNDO_BYTES,
			delta_window: DEFAULT_DELTA_WINDOW,
		}
	}
}

impl HistoryConfig {
	pub fn coalesce_idle(&self) -> Duration {
		Duration::from_millis(self.coalesce_idle_ms)
	}
}

/// A single step in the undo/redo history.
#[derive(Debug, Clone)]
pub struct UndoStep {
	/// Edits applied during the forward operation, in order.
	edits: Vec<AppliedEdit>,
	/// Actor that opened the step, `None` for programmatic multi-edit steps.
	actor: Option<ActorId>,
	anchors_before: AnchorPositions,
	anchors_after: AnchorPositions,
	/// When the last edit joined the step.
	last_at: Instant,
	/// Approximate memory usage of this step in bytes.
	bytes: usize,
}

impl UndoStep {
	fn new(edits: Vec<AppliedEdit>, actor: Option<ActorId>, before: AnchorPositions, after: AnchorPositions, now: Instant) -> Self {
		let bytes = edits.iter().map(approx_edit_bytes).sum::<usize>() + (before.len() + after.len()) * ANCHOR_BYTES;
		Self {
			edits,
			actor,
			anchors_before: before,
			anchors_after: after,
			last_at: now,
			bytes,
		}
	}

	/// Number of edits grouped in this step.
	pub fn len(&self) -> usize {
		self.edits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.edits.is_empty()
	}

	/// Approximate memory usage in bytes.
	pub fn bytes(&self) -> usize {
		self.bytes
	}

	fn inverse(&self) -> Vec<Edit> {
		self.edits.iter().rev().map(AppliedEdit::inverse).collect()
	}

	fn forward(&self) -> Vec<Edit> {
		self.edits.iter().map(|applied| applied.edit.clone()).collect()
	}

	/// Whether a single edit by `actor` continues this step's typing run.
	fn continues(&self, edit: &Edit, actor: ActorId, now: Instant, idle: Duration) -> bool {
		let Some(last) = self.edits.last() else {
			return false;
		};
		self.actor == Some(actor)
			&& edit.is_insertion()
			&& last.edit.is_insertion()
			&& last.edit.new_end() == edit.start()
			&& now.saturating_duration_since(self.last_at) <= idle
	}
}

/// Estimates the memory usage of an applied edit in bytes.
///
/// Counts the inserted and removed text plus a small overhead.
fn approx_edit_bytes(applied: &AppliedEdit) -> usize {
	applied.edit.text().len() + applied.removed.len() + EDIT_OVERHEAD_BYTES
}

/// Edits to replay for an undo or redo, plus the anchor positions to
/// restore once they are applied.
#[derive(Debug, Clone)]
pub struct Replay {
	/// Edits in application order.
	pub edits: Vec<Edit>,
	/// Anchor positions on the far side of the replayed step.
	pub anchors: AnchorPositions,
}

/// Grouped undo history plus the delta log.
#[derive(Debug)]
pub struct EditLog {
	config: HistoryConfig,
	undo_stack: VecDeque<UndoStep>,
	redo_stack: Vec<UndoStep>,
	undo_bytes: usize,
	/// Whether the next typed edit may join the newest step.
	group_open: bool,
	/// Forward edits tagged with the version they produced, oldest first.
	deltas: VecDeque<(Version, Edit)>,
	/// Number of distinct versions in `deltas`.
	delta_versions: usize,
	/// Oldest version the delta log can rebase from.
	floor: Version,
}

impl EditLog {
	/// Creates an empty log for a document opened at `version`.
	pub fn new(config: HistoryConfig, version: Version) -> Self {
		Self {
			config,
			undo_stack: VecDeque::new(),
			redo_stack: Vec::new(),
			undo_bytes: 0,
			group_open: false,
			deltas: VecDeque::new(),
			delta_versions: 0,
			floor: version,
		}
	}

	pub fn config(&self) -> &HistoryConfig {
		&self.config
	}

	/// Returns whether undo is available.
	pub fn can_undo(&self) -> bool {
		!self.undo_stack.is_empty()
	}

	/// Returns whether redo is available.
	pub fn can_redo(&self) -> bool {
		!self.redo_stack.is_empty()
	}

	/// Returns the number of steps in the undo stack.
	pub fn undo_len(&self) -> usize {
		self.undo_stack.len()
	}

	/// Returns the number of steps in the redo stack.
	pub fn redo_len(&self) -> usize {
		self.redo_stack.len()
	}

	/// Bytes currently retained by the undo stack.
	pub fn undo_bytes(&self) -> usize {
		self.undo_bytes
	}

	/// Returns the newest undo step.
	pub fn last_step(&self) -> Option<&UndoStep> {
		self.undo_stack.back()
	}

	/// Ends the current typing group; the next edit starts a new step.
	pub fn break_group(&mut self) {
		self.group_open = false;
	}

	/// Records edits that were applied as one operation.
	///
	/// A single pure insertion typed by the same actor directly after the
	/// previous insertion of the open step, within the idle window, joins
	/// that step. Everything else starts a new step. Recording always
	/// clears the redo stack.
	pub fn record(&mut self, edits: Vec<AppliedEdit>, origin: EditOrigin, now: Instant, before: AnchorPositions, after: AnchorPositions) {
		let Some(result) = edits.last().map(|applied| applied.result) else {
			return;
		};
		self.push_deltas(result, edits.iter().map(|applied| applied.edit.clone()));
		self.redo_stack.clear();

		let typing = match (origin, edits.as_slice()) {
			(EditOrigin::Typing(actor), [single]) => Some((actor, single)),
			_ => None,
		};
		let typed = typing.is_some();
		let merge = typing.is_some_and(|(actor, single)| {
			self.group_open
				&& self
					.undo_stack
					.back()
					.is_some_and(|step| step.continues(&single.edit, actor, now, self.config.coalesce_idle()))
		});

		if merge && let Some(step) = self.undo_stack.back_mut() {
			let added: usize = edits.iter().map(approx_edit_bytes).sum::<usize>()
				+ after.len().saturating_sub(step.anchors_after.len()) * ANCHOR_BYTES;
			step.edits.extend(edits);
			step.anchors_after = after;
			step.last_at = now;
			step.bytes += added;
			self.undo_bytes += added;
			trace!(version = result.get(), steps = self.undo_stack.len(), "history.coalesce");
		} else {
			let step = UndoStep::new(edits, origin.actor(), before, after, now);
			self.undo_bytes += step.bytes;
			self.undo_stack.push_back(step);
			trace!(version = result.get(), steps = self.undo_stack.len(), "history.step");
		}

		self.group_open = typed;
		self.enforce_limits();
	}

	/// Pops the newest step and returns the edits that revert it.
	///
	/// Returns `None` when there is nothing to undo.
	pub fn undo(&mut self) -> Option<Replay> {
		let step = self.undo_stack.pop_back()?;
		self.undo_bytes = self.undo_bytes.saturating_sub(step.bytes);
		self.group_open = false;
		let replay = Replay {
			edits: step.inverse(),
			anchors: step.anchors_before.clone(),
		};
		self.redo_stack.push(step);
		Some(replay)
	}

	/// Pops the newest undone step and returns the edits that reapply it.
	///
	/// Returns `None` when there is nothing to redo.
	pub fn redo(&mut self) -> Option<Replay> {
		let step = self.redo_stack.pop()?;
		self.group_open = false;
		let replay = Replay {
			edits: step.forward(),
			anchors: step.anchors_after.clone(),
		};
		self.undo_bytes += step.bytes;
		self.undo_stack.push_back(step);
		self.enforce_limits();
		Some(replay)
	}

	/// Logs edits replayed by undo or redo, which produced `result`.
	pub fn record_replay(&mut self, result: Version, edits: &[Edit]) {
		self.push_deltas(result, edits.iter().cloned());
	}

	/// Returns the forward edits that lead from `version` to the newest
	/// logged version, oldest first.
	///
	/// Returns `None` when `version` has already left the delta window.
	pub fn edits_since(&self, version: Version) -> Option<Vec<Edit>> {
		if version < self.floor {
			return None;
		}
		Some(
			self.deltas
				.iter()
				.filter(|(produced, _)| *produced > version)
				.map(|(_, edit)| edit.clone())
				.collect(),
		)
	}

	/// Oldest version [`EditLog::edits_since`] can answer for.
	pub fn floor(&self) -> Version {
		self.floor
	}

	fn push_deltas(&mut self, result: Version, edits: impl IntoIterator<Item = Edit>) {
		let before = self.deltas.len();
		let fresh = self.deltas.back().is_none_or(|(produced, _)| *produced != result);
		self.deltas.extend(edits.into_iter().map(|edit| (result, edit)));
		if fresh && self.deltas.len() > before {
			self.delta_versions += 1;
		}

		// Versions leave the window whole so a rebase never sees half of one.
		while self.delta_versions > self.config.delta_window
			&& let Some(&(oldest, _)) = self.deltas.front()
		{
			while self.deltas.front().is_some_and(|(produced, _)| *produced == oldest) {
				self.deltas.pop_front();
			}
			self.floor = oldest;
			self.delta_versions -= 1;
		}
	}

	/// Evicts oldest steps until limits are met.
	fn enforce_limits(&mut self) {
		while (self.undo_stack.len() > self.config.max_steps || self.undo_bytes > self.config.max_bytes)
			&& let Some(oldest) = self.undo_stack.pop_front()
		{
			self.undo_bytes = self.undo_bytes.saturating_sub(oldest.bytes);
			trace!(bytes = oldest.bytes, "history.evict");
		}
	}
}
