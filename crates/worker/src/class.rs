/// Kind of background task; names the span each task runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Long-lived async loop that batches edits and hands out derivation jobs.
	Scheduler,
	/// One CPU-bound structural derivation on the blocking pool.
	Derivation,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Scheduler => "scheduler",
			Self::Derivation => "derivation",
		}
	}
}
