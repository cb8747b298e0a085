use std::fmt;

/// Identifies one immutable snapshot of a document.
///
/// Versions only ever grow: every applied edit, undo and redo produces a
/// new, strictly larger version. Cached coordinates and structural models
/// carry the version they were computed against so staleness is a plain
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(u64);

impl Version {
	/// Version of a freshly opened document.
	pub const INITIAL: Version = Version(0);

	/// Creates a version from its raw value.
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Returns the raw version number.
	pub const fn get(self) -> u64 {
		self.0
	}

	/// Returns the version that follows this one.
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "v{}", self.0)
	}
}

impl From<Version> for u64 {
	fn from(version: Version) -> Self {
		version.0
	}
}
