use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, trace_span};

use crate::TaskClass;

/// The runtime a document's background work lands on.
///
/// Resolved once per document: the ambient runtime when there is one,
/// otherwise a small shared runtime built on first use, so sessions opened
/// from plain threads still get background analysis.
#[derive(Debug, Clone)]
pub struct WorkerRuntime {
	handle: Handle,
}

impl WorkerRuntime {
	pub fn current() -> Self {
		if let Ok(handle) = Handle::try_current() {
			return Self { handle };
		}

		static FALLBACK: OnceLock<Runtime> = OnceLock::new();
		let runtime = FALLBACK.get_or_init(|| {
			tokio::runtime::Builder::new_multi_thread()
				.enable_all()
				.worker_threads(2)
				.thread_name("weft-worker")
				.build()
				.expect("failed to build weft-worker fallback runtime")
		});
		Self {
			handle: runtime.handle().clone(),
		}
	}

	/// Starts the async loop of a [`TaskClass::Scheduler`] task.
	pub fn spawn_scheduler<F>(&self, fut: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		self.handle.spawn(fut.instrument(task_span(TaskClass::Scheduler)))
	}

	/// Runs one [`TaskClass::Derivation`] on the blocking pool.
	pub fn spawn_derivation<F, R>(&self, f: F) -> JoinHandle<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		let span = task_span(TaskClass::Derivation);
		self.handle.spawn_blocking(move || {
			let _guard = span.enter();
			f()
		})
	}
}

fn task_span(class: TaskClass) -> Span {
	trace_span!("worker.task", class = class.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn thread_name() -> Option<String> {
		std::thread::current().name().map(str::to_string)
	}

	#[test]
	fn test_plain_thread_falls_back_to_shared_runtime() {
		let runtime = WorkerRuntime::current();
		let scheduled = runtime.spawn_scheduler(async { 40 + 2 });
		let derived = runtime.spawn_derivation(thread_name);
		let (value, name) = std::thread::spawn(move || {
			let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
			rt.block_on(async { (scheduled.await.unwrap(), derived.await.unwrap()) })
		})
		.join()
		.unwrap();
		assert_eq!(value, 42);
		assert_eq!(name.as_deref(), Some("weft-worker"));
	}

	#[tokio::test]
	async fn test_ambient_runtime_is_preferred() {
		let name = WorkerRuntime::current().spawn_derivation(thread_name).await.unwrap();
		assert_ne!(name.as_deref(), Some("weft-worker"));
	}
}
