//! Per-namespace chunk distributions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use snafu::Snafu;

use crate::{ChangeEvent, Chunk, ChunkRange, DistributionTime, ShardKeyTuple, ShardVersion};

/// Precondition violations of distribution operations.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum DistributionError {
    #[snafu(display(
        "chunk namespace `{chunk}` does not match distribution namespace `{distribution}`"
    ))]
    NamespaceMismatch { chunk: String, distribution: String },

    #[snafu(display(
        "chunk shard key fields {chunk:?} do not match distribution shard key fields {distribution:?}"
    ))]
    ArityMismatch {
        chunk: Vec<String>,
        distribution: Vec<String>,
    },

    #[snafu(display("no chunk with range {range} in distribution"))]
    NotFound { range: String },
}

/// Outcome of a [`ChunkDistribution::check`]: one human-readable message per
/// violated invariant.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    messages: Vec<String>,
}

impl CheckReport {
    /// Whether every invariant held.
    pub fn is_ok(&self) -> bool {
        self.messages.is_empty()
    }

    /// One message per violation, in key-space order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn push(&mut self, message: String) {
        self.messages.push(message);
    }
}

/// All chunks of one namespace, ordered by range.
///
/// A healthy distribution covers shard-key space completely: its first chunk
/// starts at MinKey on every field, its last chunk ends at MaxKey, and every
/// chunk's max equals its successor's min. [`check`](Self::check) verifies
/// exactly that.
///
/// Cloning is shallow: the chunk handles are shared with the clone, so
/// reconstruction can keep every historical distribution alive while only
/// the chunks an event touched are reallocated.
#[derive(Debug, Clone)]
pub struct ChunkDistribution {
    namespace: Arc<str>,
    chunks: Vec<Arc<Chunk>>,
    time: DistributionTime,
    applied_change: Option<Arc<ChangeEvent>>,
}

impl ChunkDistribution {
    /// Create an empty distribution for `namespace`, tagged as the live
    /// snapshot.
    pub fn new(namespace: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            chunks: vec![],
            time: DistributionTime::Latest,
            applied_change: None,
        }
    }

    /// The namespace all contained chunks share.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// When this distribution became the cluster's current layout.
    pub fn time(&self) -> DistributionTime {
        self.time
    }

    /// Tag the moment this distribution became current.
    pub fn set_time(&mut self, time: DistributionTime) {
        self.time = time;
    }

    /// The journal event whose inversion produced this distribution, if any.
    pub fn applied_change(&self) -> Option<&Arc<ChangeEvent>> {
        self.applied_change.as_ref()
    }

    /// Record the journal event whose inversion produced this distribution.
    pub fn set_applied_change(&mut self, event: Arc<ChangeEvent>) {
        self.applied_change = Some(event);
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the distribution holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The chunks in range order.
    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    /// Iterate the chunks in range order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.iter()
    }

    /// Insert `chunk` at its position in range order.
    ///
    /// Fails if the chunk belongs to a different namespace or disagrees with
    /// the distribution's shard-key fields.
    pub fn insert(&mut self, chunk: Arc<Chunk>) -> Result<(), DistributionError> {
        if chunk.namespace() != self.namespace.as_ref() {
            return NamespaceMismatchSnafu {
                chunk: chunk.namespace(),
                distribution: self.namespace.to_string(),
            }
            .fail();
        }
        if let Some(first) = self.chunks.first() {
            if first.key_fields() != chunk.key_fields() {
                return ArityMismatchSnafu {
                    chunk: chunk.key_fields().to_vec(),
                    distribution: first.key_fields().to_vec(),
                }
                .fail();
            }
        }

        let at = self
            .chunks
            .partition_point(|existing| existing.range() <= chunk.range());
        self.chunks.insert(at, chunk);
        Ok(())
    }

    /// Remove and return the chunk with exactly `range`.
    pub fn remove(&mut self, range: &ChunkRange) -> Result<Arc<Chunk>, DistributionError> {
        match self
            .chunks
            .binary_search_by(|chunk| chunk.range().cmp(range))
        {
            Ok(at) => Ok(self.chunks.remove(at)),
            Err(_) => NotFoundSnafu {
                range: range.to_string(),
            }
            .fail(),
        }
    }

    /// The chunk with exactly `range`, if present.
    pub fn find_by_range(&self, range: &ChunkRange) -> Option<&Arc<Chunk>> {
        self.chunks
            .binary_search_by(|chunk| chunk.range().cmp(range))
            .ok()
            .map(|at| &self.chunks[at])
    }

    /// The chunk whose range contains `key`, if any.
    ///
    /// Unique whenever the distribution invariants hold.
    pub fn find_containing(&self, key: &ShardKeyTuple) -> Option<&Arc<Chunk>> {
        let at = self
            .chunks
            .partition_point(|chunk| &chunk.range().min <= key);
        at.checked_sub(1)
            .map(|at| &self.chunks[at])
            .filter(|chunk| chunk.range().contains(key))
    }

    /// The greatest shard version across contained chunks, if any chunk
    /// carries a known version.
    pub fn max_shard_version(&self) -> Option<ShardVersion> {
        self.chunks.iter().filter_map(|chunk| chunk.version()).max()
    }

    /// Validate the distribution's structural invariants: coverage from
    /// MinKey to MaxKey, no gaps or overlaps between adjacent chunks, one
    /// namespace, one set of shard-key fields.
    ///
    /// Violations are reported as messages rather than errors so a health
    /// check can show them all at once.
    pub fn check(&self) -> CheckReport {
        let mut report = CheckReport::default();

        let (first, last) = match (self.chunks.first(), self.chunks.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                report.push("distribution holds no chunks".to_string());
                return report;
            }
        };

        if !first.range().min.is_all_min() {
            report.push("chunk range does not start with MinKey".to_string());
        }
        if !last.range().max.is_all_max() {
            report.push("chunk range does not end with MaxKey".to_string());
        }

        for pair in self.chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.range().min != a.range().max {
                report.push(format!(
                    "discontinuity in chunk range between {} and {}",
                    a.range().max.display_with(a.key_fields()),
                    b.range().min.display_with(b.key_fields()),
                ));
            }
        }

        let namespaces: BTreeSet<&str> = self.chunks.iter().map(|c| c.namespace()).collect();
        if namespaces.len() > 1 {
            report.push(format!(
                "chunk range has different namespaces: {}",
                namespaces.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        let field_sets: BTreeSet<&[String]> = self.chunks.iter().map(|c| c.key_fields()).collect();
        if field_sets.len() > 1 {
            report.push(format!(
                "chunks disagree on shard key fields: {:?}",
                field_sets
            ));
        }

        report
    }
}

// Two distributions are "equal" when they lay out key space identically:
// same chunk count and positional agreement on (range, shard, namespace).
// Shard versions are excluded, as two catalogs can agree on the layout while
// disagreeing on per-chunk versions; `time` and `applied_change` are
// bookkeeping, not layout.
impl PartialEq for ChunkDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.chunks.len() == other.chunks.len()
            && self
                .chunks
                .iter()
                .zip(&other.chunks)
                .all(|(a, b)| a.same_layout(b))
    }
}

impl Eq for ChunkDistribution {}

impl fmt::Display for ChunkDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ChunkDistribution([")?;
        for chunk in &self.chunks {
            writeln!(f, "    {chunk}")?;
        }
        write!(f, "])")
    }
}
