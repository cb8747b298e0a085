//! Shared worker runtime primitives for off-edit-path work.
//!
//! Background structural analysis runs here: an async driver task per
//! document plus CPU-bound re-derivations on the blocking pool, each tied to
//! a [`GenerationToken`] so newer edits can cancel stale work.

mod class;
mod spawn;
mod token;

pub use class::TaskClass;
pub use spawn::WorkerRuntime;
pub use token::{GenerationClock, GenerationToken};
