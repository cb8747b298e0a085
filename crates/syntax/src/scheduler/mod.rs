//! Background scheduling and publication of structural models.
//!
//! Edits are queued under a short lock and never wait on analysis. A driver
//! task debounces them, takes the newest snapshot and runs one derivation
//! at a time on the blocking pool. A newer edit cancels the derivation in
//! flight; a cancelled derivation is abandoned even if it finished, so only
//! the newest version is ever published. Publication swaps an `Arc`, and
//! readers holding the previous model keep it alive.


use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use weft_primitives::{Edit, Snapshot, Version};
use weft_worker::{GenerationClock, GenerationToken, WorkerRuntime};

use crate::grammar::{Grammar, StructureError};
use crate::incremental::{Derivation, IncrementalAnalyzer};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::node::{Provenance, StructuralModel};
use crate::policy::AnalysisConfig;

#[derive(Default)]
struct Pending {
	/// Newest snapshot not yet taken by a derivation.
	target: Option<Snapshot>,
	/// Edits newer than the published model, tagged with the version they
	/// produced.
	edits: VecDeque<(Version, Edit)>,
	/// Edits up to this version were dropped; derive from scratch until a
	/// model at least this new is published.
	overflow: Option<Version>,
	/// Skip the debounce for the next derivation.
	urgent: bool,
	last_edit: Option<Instant>,
	in_flight: Option<GenerationToken>,
}

struct Shared {
	analyzer: IncrementalAnalyzer,
	config: AnalysisConfig,
	published: ArcSwap<StructuralModel>,
	/// Version of the newest derived model; `None` until the first one.
	versions: watch::Sender<Option<Version>>,
	pending: Mutex<Pending>,
	wake: Notify,
	shutdown: CancellationToken,
	metrics: AnalysisMetrics,
	clock: GenerationClock,
	runtime: WorkerRuntime,
}

struct Job {
	target: Snapshot,
	base: Arc<StructuralModel>,
	/// `None` derives from scratch.
	edits: Option<Vec<Edit>>,
	token: GenerationToken,
}

/// Owns background derivation and the published model for one document.
pub struct StructureWorker {
	shared: Arc<Shared>,
	driver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StructureWorker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StructureWorker")
			.field("published", &self.shared.published.load().version())
			.field("generation", &self.shared.clock.latest())
			.field("running", &self.driver.is_some())
			.finish()
	}
}

impl StructureWorker {
	/// Publishes a flat placeholder for `snapshot` and, when analysis is
	/// enabled, starts deriving its structure in the background.
	pub fn spawn(grammar: Arc<dyn Grammar>, snapshot: &Snapshot, config: AnalysisConfig) -> Self {
		let version = snapshot.version();
		let placeholder = StructuralModel::degenerate(snapshot.len_chars(), version, Provenance::Initial);
		let enabled = config.enabled;
		let (versions, _) = watch::channel((!enabled).then_some(version));

		let shared = Arc::new(Shared {
			analyzer: IncrementalAnalyzer::new(grammar),
			config,
			published: ArcSwap::from_pointee(placeholder),
			versions,
			pending: Mutex::new(Pending::default()),
			wake: Notify::new(),
			shutdown: CancellationToken::new(),
			metrics: AnalysisMetrics::new(),
			clock: GenerationClock::new(),
			runtime: WorkerRuntime::current(),
		});

		let driver = enabled.then(|| {
			{
				let mut pending = shared.pending.lock();
				pending.target = Some(snapshot.clone());
				pending.urgent = true;
			}
			shared.wake.notify_one();
			shared.runtime.spawn_scheduler(drive(Arc::clone(&shared)))
		});

		Self { shared, driver }
	}

	/// Records edits that produced `snapshot`, in application order.
	///
	/// `urgent` skips the debounce, for edits replayed from history.
	pub fn note_edits(&self, snapshot: &Snapshot, edits: impl IntoIterator<Item = Edit>, urgent: bool) {
		let version = snapshot.version();
		if !self.shared.config.enabled {
			let flat = StructuralModel::degenerate(snapshot.len_chars(), version, Provenance::Initial);
			self.shared.published.store(Arc::new(flat));
			self.shared.versions.send_replace(Some(version));
			return;
		}
		if self.shared.shutdown.is_cancelled() {
			return;
		}

		let superseded = {
			let mut pending = self.shared.pending.lock();
			pending.edits.extend(edits.into_iter().map(|edit| (version, edit)));
			if pending.edits.len() > self.shared.config.max_pending_edits {
				pending.edits.clear();
				pending.overflow = Some(version);
				debug!(version = version.get(), "structure.pending_overflow");
			}
			pending.target = Some(snapshot.clone());
			pending.last_edit = Some(Instant::now());
			pending.urgent |= urgent;
			pending.in_flight.take()
		};
		if let Some(token) = superseded {
			token.cancel();
			debug!(
				generation = token.generation(),
				version = version.get(),
				"structure.supersede"
			);
		}
		self.shared.wake.notify_one();
		trace!(version = version.get(), urgent, "structure.note_edit");
	}

	/// The newest published model. Never blocks.
	pub fn current(&self) -> Arc<StructuralModel> {
		self.shared.current()
	}

	/// Receiver tracking the version of the newest derived model.
	pub fn subscribe(&self) -> watch::Receiver<Option<Version>> {
		self.shared.versions.subscribe()
	}

	/// Waits until a model derived for `version` or newer is published.
	/// The placeholder published at spawn does not count.
	///
	/// Returns `None` if the worker shuts down first.
	pub async fn settled(&self, version: Version) -> Option<Arc<StructuralModel>> {
		self.shared.settled(version).await
	}

	/// Returns a read-only handle that outlives borrows of the worker.
	pub fn reader(&self) -> StructureReader {
		StructureReader {
			shared: Arc::clone(&self.shared),
		}
	}

	pub fn metrics(&self) -> MetricsSnapshot {
		self.shared.metrics.snapshot()
	}

	pub fn config(&self) -> &AnalysisConfig {
		&self.shared.config
	}

	/// Stops background work. The last published model stays readable.
	pub fn shutdown(&mut self) {
		self.shared.shutdown.cancel();
		if let Some(token) = self.shared.pending.lock().in_flight.take() {
			token.cancel();
		}
		if self.driver.take().is_some() {
			debug!(version = self.current().version().get(), "structure.shutdown");
		}
	}
}

impl Drop for StructureWorker {
	fn drop(&mut self) {
		self.shutdown();
	}
}

/// Cloneable read side of a [`StructureWorker`].
///
/// Readers never block edits; they keep observing the last published model
/// after the worker shuts down.
#[derive(Clone)]
pub struct StructureReader {
	shared: Arc<Shared>,
}

impl std::fmt::Debug for StructureReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StructureReader")
			.field("published", &self.shared.published.load().version())
			.finish()
	}
}

impl StructureReader {
	pub fn current(&self) -> Arc<StructuralModel> {
		self.shared.current()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Version>> {
		self.shared.versions.subscribe()
	}

	/// See [`StructureWorker::settled`].
	pub async fn settled(&self, version: Version) -> Option<Arc<StructuralModel>> {
		self.shared.settled(version).await
	}
}

async fn drive(shared: Arc<Shared>) {
	loop {
		tokio::select! {
			() = shared.shutdown.cancelled() => break,
			() = shared.wake.notified() => {}
		}
		if !wait_quiet(&shared).await {
			break;
		}
		let Some(job) = shared.take_job() else { continue };

		shared.metrics.record_started();
		let generation = job.token.generation();
		let token = job.token.clone();
		let full = job.edits.is_none();
		let target_version = job.target.version();
		let target_len = job.target.len_chars();
		let analyzer = shared.analyzer.clone();

		let outcome = shared.runtime.spawn_derivation(move || {
			let started = Instant::now();
			let derived = match &job.edits {
				Some(edits) => analyzer.on_edit(&job.base, edits, &job.target, &job.token),
				None => analyzer.analyze(&job.target, &job.token),
			};
			(derived, started.elapsed())
		})
		.await;

		shared.finish(generation, &token, full, target_version, target_len, outcome);
	}
	trace!("structure.driver_stopped");
}

/// Sleeps until the debounce window after the latest edit has passed.
/// Newer edits restart the window and urgent ones end it. Returns false on
/// shutdown.
async fn wait_quiet(shared: &Shared) -> bool {
	loop {
		let wait = {
			let pending = shared.pending.lock();
			match pending.last_edit {
				_ if pending.target.is_none() || pending.urgent => Duration::ZERO,
				Some(last) => shared.config.debounce().saturating_sub(last.elapsed()),
				None => Duration::ZERO,
			}
		};
		if wait.is_zero() {
			return true;
		}
		tokio::select! {
			() = shared.shutdown.cancelled() => return false,
			() = tokio::time::sleep(wait) => {}
			() = shared.wake.notified() => {}
		}
	}
}

impl Shared {
	fn current(&self) -> Arc<StructuralModel> {
		self.published.load_full()
	}

	async fn settled(&self, version: Version) -> Option<Arc<StructuralModel>> {
		let mut versions = self.versions.subscribe();
		tokio::select! {
			reached = versions.wait_for(|published| published.is_some_and(|v| v >= version)) => {
				reached.ok()?;
				Some(self.current())
			}
			() = self.shutdown.cancelled() => None,
		}
	}

	fn take_job(&self) -> Option<Job> {
		let mut pending = self.pending.lock();
		let target = pending.target.take()?;
		let base = self.published.load_full();
		let edits = (pending.overflow.is_none() && !base.is_degenerate()).then(|| {
			pending
				.edits
				.iter()
				.filter(|(version, _)| *version > base.version())
				.map(|(_, edit)| edit.clone())
				.collect()
		});
		let token = self.clock.issue(&self.shutdown);
		pending.in_flight = Some(token.clone());
		pending.urgent = false;
		Some(Job {
			target,
			base,
			edits,
			token,
		})
	}

	fn finish(
		&self,
		generation: u64,
		token: &GenerationToken,
		full: bool,
		version: Version,
		len: usize,
		outcome: Result<(Result<Derivation, StructureError>, Duration), JoinError>,
	) {
		{
			let mut pending = self.pending.lock();
			if pending.in_flight.as_ref().is_some_and(|t| t.generation() == generation) {
				pending.in_flight = None;
			}
		}

		match outcome {
			Ok((Ok(derived), elapsed)) => {
				if token.is_cancelled() {
					self.metrics.record_cancelled();
					debug!(generation, version = version.get(), "structure.abandon");
					return;
				}
				self.metrics.record_completed(&derived.stats, elapsed);
				self.publish(derived.model, full, elapsed);
			}
			Ok((Err(StructureError::Cancelled), _)) => {
				self.metrics.record_cancelled();
				debug!(generation, version = version.get(), "structure.abandon");
			}
			Ok((Err(error), elapsed)) => {
				warn!(version = version.get(), %error, "structure.derive_failed");
				self.metrics.record_failed();
				self.publish(StructuralModel::degenerate(len, version, Provenance::Degenerate), true, elapsed);
			}
			Err(error) => {
				warn!(version = version.get(), %error, "structure.task_panicked");
				self.metrics.record_failed();
				if !token.is_cancelled() {
					self.publish(StructuralModel::degenerate(len, version, Provenance::Degenerate), true, Duration::ZERO);
				}
			}
		}
	}

	fn publish(&self, model: StructuralModel, full: bool, elapsed: Duration) {
		let version = model.version();
		let provenance = model.provenance();
		{
			let mut pending = self.pending.lock();
			let current = self.published.load();
			let stale = version < current.version() || (version == current.version() && current.provenance() != Provenance::Initial);
			if stale {
				trace!(version = version.get(), "structure.publish_stale");
				return;
			}
			self.published.store(Arc::new(model));
			self.metrics.record_published(provenance);
			while pending.edits.front().is_some_and(|(v, _)| *v <= version) {
				pending.edits.pop_front();
			}
			if full && pending.overflow.is_some_and(|v| v <= version) {
				pending.overflow = None;
			}
		}
		self.versions.send_replace(Some(version));
		debug!(
			version = version.get(),
			?provenance,
			elapsed_ms = elapsed.as_secs_f64() * 1000.0,
			"structure.publish"
		);
	}
}
