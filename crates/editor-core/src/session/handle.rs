use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use weft_primitives::{AnchorId, CharIdx, EditOrigin, Result, Snapshot, Version};
use weft_syntax::{Grammar, StructuralModel, StructureReader};

use super::BufferSession;
use crate::config::SessionConfig;

/// Shared handle to a [`BufferSession`] for several edit sources.
///
/// Edits are totally ordered by a short lock around the session; the lock
/// is never held while waiting on analysis. Structure reads bypass the
/// lock entirely.
#[derive(Clone)]
pub struct SessionHandle {
	session: Arc<Mutex<BufferSession>>,
	structure: StructureReader,
}

impl std::fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionHandle").field("structure", &self.structure).finish_non_exhaustive()
	}
}

impl SessionHandle {
	pub fn open(text: &str, grammar: Arc<dyn Grammar>, config: SessionConfig) -> Self {
		Self::new(BufferSession::open(text, grammar, config))
	}

	pub fn new(session: BufferSession) -> Self {
		let structure = session.structure_reader();
		Self {
			session: Arc::new(Mutex::new(session)),
			structure,
		}
	}

	/// Runs `f` with exclusive access to the session.
	pub fn with<R>(&self, f: impl FnOnce(&mut BufferSession) -> R) -> R {
		f(&mut self.session.lock())
	}

	pub fn version(&self) -> Version {
		self.session.lock().version()
	}

	pub fn snapshot(&self) -> Snapshot {
		self.session.lock().snapshot()
	}

	pub fn apply_edit(&self, range: Range<CharIdx>, content: &str) -> Result<Version> {
		self.session.lock().apply_edit(range, content)
	}

	pub fn apply_edit_as(&self, range: Range<CharIdx>, content: &str, origin: EditOrigin) -> Result<Version> {
		self.session.lock().apply_edit_as(range, content, origin)
	}

	pub fn apply_edit_at(&self, base: Version, range: Range<CharIdx>, content: &str) -> Result<Version> {
		self.session.lock().apply_edit_at(base, range, content)
	}

	pub fn rebase_edit(&self, base: Version, range: Range<CharIdx>, content: &str) -> Result<Version> {
		self.session.lock().rebase_edit(base, range, content)
	}

	pub fn undo(&self) -> Result<Option<Version>> {
		self.session.lock().undo()
	}

	pub fn redo(&self) -> Result<Option<Version>> {
		self.session.lock().redo()
	}

	pub fn create_anchor(&self, offset: CharIdx) -> Result<AnchorId> {
		self.session.lock().create_anchor(offset)
	}

	pub fn create_anchor_at(&self, version: Version, offset: CharIdx) -> Result<AnchorId> {
		self.session.lock().create_anchor_at(version, offset)
	}

	pub fn resolve_anchor(&self, id: AnchorId) -> Result<CharIdx> {
		self.session.lock().resolve_anchor(id)
	}

	pub fn release_anchor(&self, id: AnchorId) -> Result<CharIdx> {
		self.session.lock().release_anchor(id)
	}

	/// The newest published structural model, read without locking.
	pub fn structure(&self) -> Arc<StructuralModel> {
		self.structure.current()
	}

	/// Waits until the structural model catches up with `version`.
	pub async fn settled(&self, version: Version) -> Option<Arc<StructuralModel>> {
		self.structure.settled(version).await
	}

	pub fn close(&self) {
		self.session.lock().close();
	}
}
