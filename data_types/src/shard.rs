//! Shard identifiers and shard versions.

use std::fmt;
use std::sync::Arc;

/// Name of a shard (a storage node or replica set owning chunks).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardName(Arc<str>);

impl ShardName {
    /// Create a shard name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShardName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ShardName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ShardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A monotonic `(major, minor)` tag identifying a chunk's generation.
///
/// Versions order lexicographically: every minor step within a major
/// generation sorts below the next major generation. A chunk whose version is
/// not recorded anywhere (e.g. the donor-side version of a reconstructed
/// move) is represented as `Option::<ShardVersion>::None`, which sorts below
/// every known version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardVersion {
    /// Incremented when a chunk migrates between shards.
    pub major: u32,
    /// Incremented when a chunk splits within a shard.
    pub minor: u32,
}

impl ShardVersion {
    /// Create a version from its parts.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl From<bson::Timestamp> for ShardVersion {
    fn from(ts: bson::Timestamp) -> Self {
        Self {
            major: ts.time,
            minor: ts.increment,
        }
    }
}

impl fmt::Display for ShardVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the pipe form operators know from the shell: 2|1
        write!(f, "{}|{}", self.major, self.minor)
    }
}
