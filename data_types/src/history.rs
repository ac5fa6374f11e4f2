//! The reconstructed history of a namespace's chunk distributions.

use crate::{ChunkDistribution, DistributionTime};

/// Chunk distributions of one namespace ordered by the time they became
/// current, oldest first.
#[derive(Debug, Default)]
pub struct History {
    distributions: Vec<ChunkDistribution>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a distribution at its position in time order.
    pub fn insert(&mut self, distribution: ChunkDistribution) {
        let at = self
            .distributions
            .partition_point(|existing| existing.time() <= distribution.time());
        self.distributions.insert(at, distribution);
    }

    /// The latest distribution valid at or before `time`.
    pub fn latest_at(&self, time: DistributionTime) -> Option<&ChunkDistribution> {
        let at = self
            .distributions
            .partition_point(|existing| existing.time() <= time);
        at.checked_sub(1).map(|at| &self.distributions[at])
    }

    /// Number of distributions.
    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    /// Whether the history holds no distributions.
    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    /// Iterate oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkDistribution> {
        self.distributions.iter()
    }

    /// The oldest distribution.
    pub fn earliest(&self) -> Option<&ChunkDistribution> {
        self.distributions.first()
    }

    /// The newest distribution.
    pub fn latest(&self) -> Option<&ChunkDistribution> {
        self.distributions.last()
    }
}
