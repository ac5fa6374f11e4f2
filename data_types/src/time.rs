//! The time axis of reconstructed distributions.

use std::fmt;

/// The moment at which a [`ChunkDistribution`](crate::ChunkDistribution)
/// became the cluster's current layout.
///
/// `Latest` tags the live snapshot and `Earliest` the oldest layout the
/// journal can reconstruct; both bound every concrete journal timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DistributionTime {
    /// Before the oldest reconstructable event.
    Earliest,
    /// The moment of the journal event that produced this layout.
    At(bson::DateTime),
    /// The live snapshot.
    Latest,
}

impl fmt::Display for DistributionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earliest => write!(f, "the beginning of the journal"),
            Self::At(t) => write!(f, "{t}"),
            Self::Latest => write!(f, "the current snapshot"),
        }
    }
}
