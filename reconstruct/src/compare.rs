//! Finding the last moment several catalogs agreed on a namespace's layout.

use data_types::{ChunkDistribution, DistributionTime, ShardVersion};
use observability_deps::tracing::debug;

use crate::walk::WalkError;

/// The comparator's verdict for one namespace.
#[derive(Debug)]
pub enum CompareOutcome {
    /// All catalogs shared this layout, last at `time`.
    Agreement {
        /// The earliest of the agreeing distributions' times: the moment
        /// the shared layout became current everywhere.
        time: DistributionTime,
        /// The shared layout.
        distribution: ChunkDistribution,
    },
    /// The walks ended without ever agreeing. A definite negative result,
    /// not an error.
    NoCommonHistory,
}

#[derive(Debug)]
struct Stream<I> {
    walk: I,
    current: Option<ChunkDistribution>,
}

impl<I> Stream<I>
where
    I: Iterator<Item = Result<ChunkDistribution, WalkError>>,
{
    fn advance(&mut self) -> Result<(), WalkError> {
        self.current = self.walk.next().transpose()?;
        Ok(())
    }

    /// Tournament rank: exhausted streams sort below every live one, live
    /// streams by their layout's greatest shard version.
    fn rank(&self) -> Option<Option<ShardVersion>> {
        self.current
            .as_ref()
            .map(ChunkDistribution::max_shard_version)
    }
}

/// Drives one [`DistributionWalker`](crate::DistributionWalker) per catalog
/// backwards in lock-step until every catalog shows the same layout.
///
/// The stream whose current distribution carries the greatest shard version
/// is the one furthest in the future relative to the others, so it is the
/// one rolled back each round (ties broken by stream order, for
/// determinism). Shard versions are monotonic across the cluster, so the
/// joint maximum strictly decreases and the tournament terminates after at
/// most the combined length of all walks.
#[derive(Debug)]
pub struct CatalogComparator<I> {
    streams: Vec<Stream<I>>,
}

impl<I> CatalogComparator<I>
where
    I: Iterator<Item = Result<ChunkDistribution, WalkError>>,
{
    /// Compare the given walks; callers provide at least two.
    pub fn new(walks: impl IntoIterator<Item = I>) -> Self {
        Self {
            streams: walks
                .into_iter()
                .map(|walk| Stream {
                    walk,
                    current: None,
                })
                .collect(),
        }
    }

    /// Run the tournament to completion.
    ///
    /// Errors raised by a walk (an inconsistent journal, a failed integrity
    /// check) abort the comparison for this namespace.
    pub fn run(mut self) -> Result<CompareOutcome, WalkError> {
        if self.streams.is_empty() {
            return Ok(CompareOutcome::NoCommonHistory);
        }
        for stream in &mut self.streams {
            stream.advance()?;
        }

        let mut rounds = 0_usize;
        loop {
            // a walk that ran dry can never agree with anything again
            if self.streams.iter().any(|s| s.current.is_none()) {
                debug!(rounds, "a catalog exhausted its journal before agreement");
                return Ok(CompareOutcome::NoCommonHistory);
            }
            if self.all_agree() {
                let time = self
                    .streams
                    .iter()
                    .filter_map(|s| s.current.as_ref().map(ChunkDistribution::time))
                    .min()
                    .unwrap_or(DistributionTime::Latest);
                let distribution = self.streams[0]
                    .current
                    .take()
                    .expect("all streams agreed, so every stream holds a distribution");
                debug!(rounds, %time, "catalogs agree");
                return Ok(CompareOutcome::Agreement { time, distribution });
            }

            let leader = self.leader();
            self.streams[leader].advance()?;
            rounds += 1;
        }
    }

    fn all_agree(&self) -> bool {
        let mut live = self.streams.iter().filter_map(|s| s.current.as_ref());
        match live.next() {
            Some(first) => live.all(|other| other == first),
            None => false,
        }
    }

    /// Index of the stream to roll back next: the greatest
    /// [`rank`](Stream::rank), earliest stream on ties.
    fn leader(&self) -> usize {
        let mut best = 0;
        for (at, stream) in self.streams.iter().enumerate().skip(1) {
            if stream.rank() > self.streams[best].rank() {
                best = at;
            }
        }
        best
    }
}
