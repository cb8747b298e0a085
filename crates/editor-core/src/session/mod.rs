//! Buffer session: one document's text, history, anchors and structure.
//!
//! Every edit passes through [`BufferSession::commit`], the single gate
//! that applies it to the text, records history, remaps anchors and
//! forwards the delta to structural analysis. Mutation takes `&mut self`;
//! use a [`SessionHandle`] when several edit sources share a document.

mod handle;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

pub use handle::SessionHandle;
use tracing::{debug, trace};
use weft_primitives::range::{check_offset, check_range};
use weft_primitives::{ActorId, AnchorId, AnchorSet, BufferError, CharIdx, CharLen, Edit, EditOrigin, LineCol, Result, Snapshot, Version, rebase_through};
use weft_syntax::{Grammar, MetricsSnapshot, StructuralModel, StructureReader, StructureWorker};

use crate::config::SessionConfig;
use crate::history::{EditLog, Replay};

/// A single open document.
pub struct BufferSession {
	snapshot: Snapshot,
	anchors: AnchorSet,
	history: EditLog,
	structure: StructureWorker,
	config: SessionConfig,
}

impl std::fmt::Debug for BufferSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferSession")
			.field("version", &self.snapshot.version())
			.field("len_chars", &self.snapshot.len_chars())
			.field("anchors", &self.anchors.len())
			.field("undo_len", &self.history.undo_len())
			.field("structure", &self.structure)
			.finish()
	}
}

impl BufferSession {
	/// Opens a session over `text` and starts analysing it in the background.
	pub fn open(text: &str, grammar: Arc<dyn Grammar>, config: SessionConfig) -> Self {
		let snapshot = Snapshot::new(text);
		debug!(
			len_chars = snapshot.len_chars(),
			grammar = grammar.name(),
			analysis = config.analysis.enabled,
			"session.open"
		);
		let structure = StructureWorker::spawn(grammar, &snapshot, config.analysis.clone());
		let history = EditLog::new(config.history.clone(), snapshot.version());
		Self {
			snapshot,
			anchors: AnchorSet::new(),
			history,
			structure,
			config,
		}
	}

	/// Current version.
	pub fn version(&self) -> Version {
		self.snapshot.version()
	}

	/// The current snapshot. Cheap to clone and safe to keep.
	pub fn snapshot(&self) -> Snapshot {
		self.snapshot.clone()
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Replaces `range` of the current version by `content`, as typing by
	/// the local user.
	pub fn apply_edit(&mut self, range: Range<CharIdx>, content: &str) -> Result<Version> {
		self.apply_edit_as(range, content, EditOrigin::default())
	}

	/// Like [`BufferSession::apply_edit`] with an explicit origin, which
	/// decides undo coalescing.
	pub fn apply_edit_as(&mut self, range: Range<CharIdx>, content: &str, origin: EditOrigin) -> Result<Version> {
		self.commit(vec![Edit::replace(range, content)], origin)
	}

	/// Applies an edit computed against `base`.
	///
	/// # Errors
	///
	/// [`BufferError::StaleEdit`] when `base` is not the current version;
	/// see [`BufferSession::rebase_edit`] to transform such edits instead.
	pub fn apply_edit_at(&mut self, base: Version, range: Range<CharIdx>, content: &str) -> Result<Version> {
		self.check_current(base)?;
		self.apply_edit(range, content)
	}

	/// Applies an edit computed against a recent `base` version, moving it
	/// through every edit logged since.
	///
	/// Text the stale edit meant to replace but that a later edit already
	/// removed is left alone; its replacement lands where that text was.
	///
	/// # Errors
	///
	/// [`BufferError::StaleEdit`] when `base` is newer than the document or
	/// older than the delta window.
	pub fn rebase_edit(&mut self, base: Version, range: Range<CharIdx>, content: &str) -> Result<Version> {
		let current = self.version();
		if base == current {
			return self.apply_edit(range, content);
		}
		let stale = BufferError::StaleEdit { target: base, current };
		if base > current {
			return Err(stale);
		}
		let since = self.history.edits_since(base).ok_or(stale)?;
		let parts = rebase_through(&Edit::replace(range, content), &since);
		trace!(base = base.get(), current = current.get(), over = since.len(), parts = parts.len(), "session.rebase");
		self.commit(parts, EditOrigin::Command(ActorId::USER))
	}

	/// The single edit gate. Applies `edits` in order as one version.
	fn commit(&mut self, edits: Vec<Edit>, origin: EditOrigin) -> Result<Version> {
		let started = Instant::now();
		let base = self.version();
		let len = self.snapshot.len_chars();

		let (noops, edits): (Vec<_>, Vec<_>) = edits.into_iter().partition(Edit::is_noop);
		if edits.is_empty() {
			for noop in &noops {
				check_range(&noop.range(), len)?;
			}
			return Ok(base);
		}

		let mut next = self.snapshot.clone();
		let mut applied = Vec::with_capacity(edits.len());
		for edit in &edits {
			let (snapshot, record) = next.apply(edit)?;
			next = snapshot;
			applied.push(record);
		}
		let version = base.next();
		let next = next.with_version(version);
		for record in &mut applied {
			record.base = base;
			record.result = version;
		}

		let before = self.anchors.capture();
		for edit in &edits {
			self.anchors.remap(edit);
		}
		let after = self.anchors.capture();
		self.history.record(applied, origin, started, before, after);

		self.snapshot = next;
		self.structure.note_edits(&self.snapshot, edits, false);
		trace!(
			version = version.get(),
			len_chars = self.snapshot.len_chars(),
			elapsed_us = started.elapsed().as_micros() as u64,
			"session.apply_edit"
		);
		Ok(version)
	}

	/// Reverts the newest undo step. Returns the new version, or `None`
	/// when there is nothing to undo.
	///
	/// Undo produces a new, higher version and restores the anchor
	/// positions from before the step.
	pub fn undo(&mut self) -> Result<Option<Version>> {
		let Some(replay) = self.history.undo() else {
			return Ok(None);
		};
		self.replay(replay, "undo").map(Some)
	}

	/// Reapplies the newest undone step. Returns the new version, or
	/// `None` when there is nothing to redo.
	pub fn redo(&mut self) -> Result<Option<Version>> {
		let Some(replay) = self.history.redo() else {
			return Ok(None);
		};
		self.replay(replay, "redo").map(Some)
	}

	fn replay(&mut self, replay: Replay, direction: &'static str) -> Result<Version> {
		// Replayed edits invert or repeat logged ones exactly, so they fit.
		let mut next = self.snapshot.clone();
		for edit in &replay.edits {
			next = next.apply(edit)?.0;
		}
		let version = self.version().next();
		let next = next.with_version(version);

		for edit in &replay.edits {
			self.anchors.remap(edit);
		}
		self.anchors.restore(&replay.anchors);
		self.history.record_replay(version, &replay.edits);

		self.snapshot = next;
		debug!(version = version.get(), edits = replay.edits.len(), direction, "session.replay");
		self.structure.note_edits(&self.snapshot, replay.edits, true);
		Ok(version)
	}

	/// Ends the current typing group, e.g. after a cursor move.
	pub fn break_undo_group(&mut self) {
		self.history.break_group();
	}

	pub fn can_undo(&self) -> bool {
		self.history.can_undo()
	}

	pub fn can_redo(&self) -> bool {
		self.history.can_redo()
	}

	/// Read access to the undo history and delta log.
	pub fn history(&self) -> &EditLog {
		&self.history
	}

	/// Anchor manager over the current version.
	pub fn anchors(&mut self) -> Anchors<'_> {
		Anchors {
			set: &mut self.anchors,
			version: self.snapshot.version(),
			len: self.snapshot.len_chars(),
		}
	}

	/// Starts tracking `offset` of the current version.
	pub fn create_anchor(&mut self, offset: CharIdx) -> Result<AnchorId> {
		self.anchors().create(offset)
	}

	/// Starts tracking an offset computed against `version`.
	pub fn create_anchor_at(&mut self, version: Version, offset: CharIdx) -> Result<AnchorId> {
		self.anchors().create_at(version, offset)
	}

	pub fn resolve_anchor(&self, id: AnchorId) -> Result<CharIdx> {
		self.anchors.resolve(id)
	}

	pub fn release_anchor(&mut self, id: AnchorId) -> Result<CharIdx> {
		self.anchors.release(id)
	}

	/// Converts an offset computed against `version` to line/column.
	pub fn to_line_column(&self, version: Version, offset: CharIdx) -> Result<LineCol> {
		self.snapshot.to_line_column(version, offset)
	}

	/// Converts a line/column computed against `version` to an offset.
	pub fn to_offset(&self, version: Version, pos: LineCol) -> Result<CharIdx> {
		self.snapshot.to_offset(version, pos)
	}

	/// The newest published structural model. May lag the text; compare
	/// its version with [`BufferSession::version`].
	pub fn structure(&self) -> Arc<StructuralModel> {
		self.structure.current()
	}

	/// Read side of the structural worker, usable without borrowing the
	/// session.
	pub fn structure_reader(&self) -> StructureReader {
		self.structure.reader()
	}

	/// Waits until the structural model catches up with `version`.
	///
	/// Returns `None` once the session is closed.
	pub async fn settled(&self, version: Version) -> Option<Arc<StructuralModel>> {
		self.structure.settled(version).await
	}

	pub fn analysis_metrics(&self) -> MetricsSnapshot {
		self.structure.metrics()
	}

	/// Stops background analysis. Text, history and anchors stay usable,
	/// but the structural model no longer advances.
	pub fn close(&mut self) {
		self.structure.shutdown();
		debug!(version = self.version().get(), "session.close");
	}

	fn check_current(&self, base: Version) -> Result<()> {
		let current = self.version();
		if base != current {
			return Err(BufferError::StaleEdit { target: base, current });
		}
		Ok(())
	}
}

/// Anchor manager view of a session, bound to its current version.
#[derive(Debug)]
pub struct Anchors<'a> {
	set: &'a mut AnchorSet,
	version: Version,
	len: CharLen,
}

impl Anchors<'_> {
	/// Starts tracking `offset`.
	///
	/// # Errors
	///
	/// [`BufferError::Range`] when `offset` lies past the end of the document.
	pub fn create(&mut self, offset: CharIdx) -> Result<AnchorId> {
		check_offset(offset, self.len)?;
		Ok(self.set.create(offset))
	}

	/// Like [`create`](Self::create), but rejects an offset computed against
	/// any version other than the current one with
	/// [`BufferError::VersionMismatch`].
	pub fn create_at(&mut self, version: Version, offset: CharIdx) -> Result<AnchorId> {
		if version != self.version {
			return Err(BufferError::VersionMismatch {
				given: version,
				current: self.version,
			});
		}
		self.create(offset)
	}

	pub fn version(&self) -> Version {
		self.version
	}

	pub fn resolve(&self, id: AnchorId) -> Result<CharIdx> {
		self.set.resolve(id)
	}

	/// Stops tracking `id`, returning its last offset.
	pub fn release(&mut self, id: AnchorId) -> Result<CharIdx> {
		self.set.release(id)
	}

	pub fn len(&self) -> usize {
		self.set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (AnchorId, CharIdx)> + '_ {
		self.set.iter()
	}
}
