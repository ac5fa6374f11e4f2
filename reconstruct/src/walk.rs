//! Walking a namespace's chunk distributions backwards in time.
//!
//! A [`DistributionWalker`] starts from the catalog's current chunk snapshot
//! and inverts the change journal's events one by one, yielding the layout
//! the namespace had before each split, multi-split and completed move.

use std::collections::HashSet;
use std::sync::Arc;

use config_catalog::ConfigCatalog;
use data_types::{
    ChangeEvent, Chunk, ChunkDistribution, ChunkRange, ChunkSpec, DistributionTime, History,
    MovePhase, ShardName, ShardVersion,
};
use observability_deps::tracing::{debug, warn};
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use crate::codec::{decode_entry, JOURNAL_KINDS};

/// Errors that end the reconstruction of one namespace.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum WalkError {
    #[snafu(display("catalog error while loading `{namespace}`: {source}"))]
    Catalog {
        namespace: String,
        source: config_catalog::Error,
    },

    #[snafu(display("snapshot chunk document for `{namespace}` is invalid: {source}"))]
    Snapshot {
        namespace: String,
        source: data_types::SnapshotError,
    },

    #[snafu(display("snapshot of `{namespace}` does not form a distribution: {source}"))]
    SnapshotShape {
        namespace: String,
        source: data_types::DistributionError,
    },

    #[snafu(display(
        "journal event at {time} references a chunk with range {range} \
         missing from the distribution of `{namespace}`"
    ))]
    MissingChunk {
        namespace: String,
        range: String,
        time: bson::DateTime,
    },

    #[snafu(display(
        "journal {side} chunk of the event at {time} does not match the \
         distribution of `{namespace}`: {decoded} <--> {located}"
    ))]
    ChunkMismatch {
        namespace: String,
        side: &'static str,
        time: bson::DateTime,
        decoded: String,
        located: String,
    },

    #[snafu(display(
        "inverting the event at {time} for `{namespace}` failed: {source}"
    ))]
    Invert {
        namespace: String,
        time: bson::DateTime,
        source: data_types::DistributionError,
    },

    #[snafu(display(
        "distribution of `{namespace}` failed its integrity check after \
         inverting the event at {time}: {messages}"
    ))]
    Integrity {
        namespace: String,
        time: bson::DateTime,
        messages: String,
    },
}

/// What to do when a journal sub-record disagrees with the chunk found in
/// the distribution during a split inversion.
///
/// The policy applies to both sides of a split alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Treat the mismatch as an inconsistent journal and stop the walk.
    #[default]
    Fatal,
    /// Log the mismatch and keep walking.
    Warn,
}

/// Build the current chunk distribution of `namespace` from the catalog's
/// chunk snapshot.
pub async fn current_distribution(
    catalog: &dyn ConfigCatalog,
    namespace: &str,
) -> Result<ChunkDistribution, WalkError> {
    let docs = catalog
        .chunk_documents(namespace)
        .await
        .context(CatalogSnafu { namespace })?;

    let mut distribution = ChunkDistribution::new(namespace);
    for doc in &docs {
        let chunk = Chunk::from_snapshot(doc).context(SnapshotSnafu { namespace })?;
        distribution
            .insert(Arc::new(chunk))
            .context(SnapshotShapeSnafu { namespace })?;
    }
    Ok(distribution)
}

/// Collect a namespace's full walk into a [`History`].
///
/// The earliest reconstructable distribution is re-tagged
/// [`DistributionTime::Earliest`] so point-in-time queries below the oldest
/// journal entry resolve to it.
pub async fn build_history(
    catalog: &dyn ConfigCatalog,
    namespace: &str,
) -> Result<History, WalkError> {
    let walker = DistributionWalker::load(catalog, namespace).await?;
    let mut distributions = walker.collect::<Result<Vec<_>, _>>()?;
    if let Some(earliest) = distributions.last_mut() {
        earliest.set_time(DistributionTime::Earliest);
    }

    let mut history = History::new();
    for distribution in distributions {
        history.insert(distribution);
    }
    Ok(history)
}

#[derive(Debug, Clone, Copy)]
enum WalkerState {
    Start,
    Walking,
    Finished,
}

/// Outcome of scanning the journal window that should hold the four phases
/// of one chunk move.
#[derive(Debug)]
enum MoveScan {
    /// All four phases found for the same range.
    Complete {
        donor: ShardName,
        commit_time: bson::DateTime,
    },
    /// The window does not describe one completed move; no inversion.
    Incomplete,
}

/// An iterator over one catalog's chunk distributions for one namespace,
/// newest first.
///
/// The first item is the current snapshot (tagged
/// [`DistributionTime::Latest`]); every further item is the inversion of the
/// next applicable journal event, tagged with that event's time. Incoming
/// distributions are never modified: inversion clones the distribution and
/// reallocates only the chunks the event touched, so every yielded layout
/// stays valid while the walk continues.
#[derive(Debug)]
pub struct DistributionWalker {
    namespace: Arc<str>,
    events: Vec<Arc<ChangeEvent>>,
    cursor: usize,
    current: ChunkDistribution,
    processed_multisplits: HashSet<ShardVersion>,
    policy: MismatchPolicy,
    state: WalkerState,
}

impl DistributionWalker {
    /// Walk `snapshot` backwards through `events` (newest first).
    pub fn new(snapshot: ChunkDistribution, events: Vec<Arc<ChangeEvent>>) -> Self {
        Self {
            namespace: snapshot.namespace().into(),
            events,
            cursor: 0,
            current: snapshot,
            processed_multisplits: HashSet::new(),
            policy: MismatchPolicy::default(),
            state: WalkerState::Start,
        }
    }

    /// Load the snapshot and journal of `namespace` from `catalog`.
    ///
    /// The journal cursor is drained here; malformed entries are logged and
    /// skipped, unrecognized kinds dropped.
    pub async fn load(catalog: &dyn ConfigCatalog, namespace: &str) -> Result<Self, WalkError> {
        let snapshot = current_distribution(catalog, namespace).await?;
        let raw = catalog
            .changelog_documents(namespace, &JOURNAL_KINDS)
            .await
            .context(CatalogSnafu { namespace })?;

        let mut events = Vec::with_capacity(raw.len());
        for doc in &raw {
            match decode_entry(doc) {
                Ok(Some(event)) => events.push(Arc::new(event)),
                Ok(None) => {}
                Err(e) => warn!(namespace, error = %e, "skipping malformed journal entry"),
            }
        }
        debug!(namespace, n = events.len(), "loaded journal events");
        Ok(Self::new(snapshot, events))
    }

    /// Replace the split mismatch policy.
    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn invert(
        &mut self,
        event: &Arc<ChangeEvent>,
    ) -> Result<Option<ChunkDistribution>, WalkError> {
        match event.as_ref() {
            ChangeEvent::Split {
                namespace,
                time,
                before,
                left,
                right,
            } => self
                .invert_split(event, namespace, *time, before, left, right)
                .map(Some),
            ChangeEvent::MultiSplit {
                namespace,
                time,
                before,
                ..
            } => self.invert_multi_split(event, namespace, *time, before),
            ChangeEvent::Move {
                phase: MovePhase::From,
                aborted: true,
                namespace,
                ..
            } => {
                debug!(namespace = %namespace, "skipping aborted move");
                Ok(None)
            }
            ChangeEvent::Move {
                phase: MovePhase::From,
                namespace,
                range,
                ..
            } => self.invert_move(event, namespace, range),
            // the other phases are consumed by the scan a `from` triggers
            ChangeEvent::Move { .. } => Ok(None),
        }
    }

    /// Undo a split: the two halves leave the distribution, the journalled
    /// `before` chunk returns, with the halves linked underneath it.
    fn invert_split(
        &self,
        event: &Arc<ChangeEvent>,
        namespace: &Arc<str>,
        time: bson::DateTime,
        before: &ChunkSpec,
        left: &ChunkSpec,
        right: &ChunkSpec,
    ) -> Result<ChunkDistribution, WalkError> {
        let left_located = self.locate(&left.range, time)?;
        let right_located = self.locate(&right.range, time)?;

        // The version journalled at split time is authoritative: snapshot
        // versions can post-date later moves, and a move's inversion leaves
        // versions unknown. Rebuild rather than touch the located chunks,
        // which earlier distributions still reference.
        let left_rebuilt = Arc::new(left_located.with_version(left.version));
        let right_rebuilt = Arc::new(right_located.with_version(right.version));

        self.compare_rebuilt("left", namespace, time, left, &left_rebuilt)?;
        self.compare_rebuilt("right", namespace, time, right, &right_rebuilt)?;

        let merged = Arc::new(Chunk::new(
            Arc::clone(namespace),
            left_rebuilt.key_fields().to_vec(),
            before.range.clone(),
            left_rebuilt.shard().cloned(),
            Some(before.version),
            vec![Arc::clone(&left_rebuilt), Arc::clone(&right_rebuilt)],
        ));
        left_rebuilt.set_parent(&merged);
        right_rebuilt.set_parent(&merged);

        let mut earlier = self.current.clone();
        let invert_context = InvertSnafu {
            namespace: namespace.to_string(),
            time,
        };
        earlier.remove(&left.range).context(invert_context.clone())?;
        earlier.remove(&right.range).context(invert_context.clone())?;
        earlier.insert(merged).context(invert_context)?;
        earlier.set_time(DistributionTime::At(time));
        earlier.set_applied_change(Arc::clone(event));

        self.verify(&earlier, time)?;
        Ok(earlier)
    }

    /// Undo a multi-split. The journal holds one entry per resulting chunk,
    /// all sharing the `before` sub-record; the first entry encountered
    /// gathers its siblings and performs the whole inversion, the rest are
    /// skipped.
    fn invert_multi_split(
        &mut self,
        event: &Arc<ChangeEvent>,
        namespace: &Arc<str>,
        time: bson::DateTime,
        before: &ChunkSpec,
    ) -> Result<Option<ChunkDistribution>, WalkError> {
        if !self.processed_multisplits.insert(before.version) {
            return Ok(None);
        }

        let before_version = before.version;
        let sibling_specs: Vec<ChunkSpec> = self.events[self.cursor..]
            .iter()
            .filter_map(|candidate| match candidate.as_ref() {
                ChangeEvent::MultiSplit {
                    before: candidate_before,
                    sibling,
                    ..
                } if candidate_before.version == before_version => Some(sibling.clone()),
                _ => None,
            })
            .collect();

        let mut rebuilt = Vec::with_capacity(sibling_specs.len());
        for spec in &sibling_specs {
            let located = self.locate(&spec.range, time)?;
            let sibling = Arc::new(located.with_version(spec.version));
            self.compare_rebuilt("multi-split", namespace, time, spec, &sibling)?;
            rebuilt.push(sibling);
        }
        let first = rebuilt
            .first()
            .expect("the gathered siblings include the triggering entry");

        let merged = Arc::new(Chunk::new(
            Arc::clone(namespace),
            first.key_fields().to_vec(),
            before.range.clone(),
            first.shard().cloned(),
            Some(before.version),
            rebuilt.iter().map(Arc::clone).collect(),
        ));
        for sibling in &rebuilt {
            sibling.set_parent(&merged);
        }

        let mut earlier = self.current.clone();
        let invert_context = InvertSnafu {
            namespace: namespace.to_string(),
            time,
        };
        for spec in &sibling_specs {
            earlier.remove(&spec.range).context(invert_context.clone())?;
        }
        earlier.insert(merged).context(invert_context)?;
        earlier.set_time(DistributionTime::At(time));
        earlier.set_applied_change(Arc::clone(event));

        self.verify(&earlier, time)?;
        Ok(Some(earlier))
    }

    /// Undo a completed move: the chunk returns to its donor, with the
    /// donor-side version unknown (the journal does not record it).
    fn invert_move(
        &self,
        event: &Arc<ChangeEvent>,
        namespace: &Arc<str>,
        range: &ChunkRange,
    ) -> Result<Option<ChunkDistribution>, WalkError> {
        let (donor, commit_time) = match self.scan_move(range) {
            MoveScan::Complete { donor, commit_time } => (donor, commit_time),
            MoveScan::Incomplete => {
                debug!(namespace = %namespace, %range, "move window incomplete, skipping");
                return Ok(None);
            }
        };

        let located = self.locate(range, commit_time)?;
        let moved = Arc::new(Chunk::new(
            Arc::clone(namespace),
            located.key_fields().to_vec(),
            located.range().clone(),
            Some(donor),
            None,
            vec![Arc::clone(&located)],
        ));
        located.set_parent(&moved);

        let mut earlier = self.current.clone();
        let invert_context = InvertSnafu {
            namespace: namespace.to_string(),
            time: commit_time,
        };
        earlier.remove(range).context(invert_context.clone())?;
        earlier.insert(moved).context(invert_context)?;
        earlier.set_time(DistributionTime::At(commit_time));
        earlier.set_applied_change(Arc::clone(event));

        self.verify(&earlier, commit_time)?;
        Ok(Some(earlier))
    }

    /// Scan the entries following a `from` for the remaining phases of the
    /// same move.
    ///
    /// The donor journals its `from` summary after the move finishes, so in
    /// the newest-first stream the other three phases follow it. Any entry
    /// that is not a move phase of the same range, a second `from`, or a
    /// repeated phase ends the scan without an inversion.
    fn scan_move(&self, range: &ChunkRange) -> MoveScan {
        let mut seen = HashSet::from([MovePhase::From]);
        let mut donor = None;
        let mut commit_time = None;

        for event in &self.events[self.cursor + 1..] {
            let (event_range, phase, event_donor, time) = match event.as_ref() {
                ChangeEvent::Move {
                    range,
                    phase,
                    donor,
                    time,
                    ..
                } => (range, *phase, donor, *time),
                _ => return MoveScan::Incomplete,
            };
            if event_range != range {
                return MoveScan::Incomplete;
            }
            if phase == MovePhase::From {
                // a second initiator: this window mixes two moves
                return MoveScan::Incomplete;
            }
            if !seen.insert(phase) {
                return MoveScan::Incomplete;
            }

            match phase {
                MovePhase::Start => donor = event_donor.clone(),
                MovePhase::Commit => commit_time = Some(time),
                _ => {}
            }
            if seen.len() == 4 {
                return match (donor, commit_time) {
                    (Some(donor), Some(commit_time)) => MoveScan::Complete { donor, commit_time },
                    _ => MoveScan::Incomplete,
                };
            }
        }
        MoveScan::Incomplete
    }

    fn locate(&self, range: &ChunkRange, time: bson::DateTime) -> Result<Arc<Chunk>, WalkError> {
        self.current
            .find_by_range(range)
            .map(Arc::clone)
            .context(MissingChunkSnafu {
                namespace: self.namespace.to_string(),
                range: range.to_string(),
                time,
            })
    }

    /// Compare a journal sub-record against the rebuilt chunk it describes.
    /// The sub-record carries no shard, so the located chunk's shard is
    /// copied in before comparing.
    fn compare_rebuilt(
        &self,
        side: &'static str,
        namespace: &Arc<str>,
        time: bson::DateTime,
        spec: &ChunkSpec,
        rebuilt: &Chunk,
    ) -> Result<(), WalkError> {
        let decoded = Chunk::from_spec(Arc::clone(namespace), spec, rebuilt.shard().cloned());
        if decoded != *rebuilt {
            match self.policy {
                MismatchPolicy::Fatal => {
                    return ChunkMismatchSnafu {
                        namespace: namespace.to_string(),
                        side,
                        time,
                        decoded: decoded.to_string(),
                        located: rebuilt.to_string(),
                    }
                    .fail()
                }
                MismatchPolicy::Warn => warn!(
                    namespace = %namespace,
                    side,
                    decoded = %decoded,
                    located = %rebuilt,
                    "journal chunk does not match distribution"
                ),
            }
        }
        Ok(())
    }

    fn verify(
        &self,
        earlier: &ChunkDistribution,
        time: bson::DateTime,
    ) -> Result<(), WalkError> {
        let report = earlier.check();
        ensure!(
            report.is_ok(),
            IntegritySnafu {
                namespace: self.namespace.to_string(),
                time,
                messages: report.messages().join("; "),
            }
        );
        Ok(())
    }
}

impl Iterator for DistributionWalker {
    type Item = Result<ChunkDistribution, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            WalkerState::Finished => return None,
            WalkerState::Start => {
                self.state = WalkerState::Walking;
                return Some(Ok(self.current.clone()));
            }
            WalkerState::Walking => {}
        }

        while self.cursor < self.events.len() {
            let event = Arc::clone(&self.events[self.cursor]);
            let inverted = self.invert(&event);
            self.cursor += 1;

            match inverted {
                Ok(Some(earlier)) => {
                    self.current = earlier.clone();
                    return Some(Ok(earlier));
                }
                Ok(None) => {}
                Err(e) => {
                    self.state = WalkerState::Finished;
                    return Some(Err(e));
                }
            }
        }

        self.state = WalkerState::Finished;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use data_types::{ShardKeyTuple, ShardKeyValue};

    const NS: &str = "mydb.mycoll";

    fn dt(millis: i64) -> bson::DateTime {
        bson::DateTime::from_millis(millis)
    }

    fn key(v: Option<i64>) -> ShardKeyValue {
        match v {
            Some(v) => ShardKeyValue::Int(v),
            None => ShardKeyValue::MinKey,
        }
    }

    fn tuple(v: ShardKeyValue) -> ShardKeyTuple {
        ShardKeyTuple::new(vec![v])
    }

    fn range(min: ShardKeyValue, max: ShardKeyValue) -> ChunkRange {
        ChunkRange::new(tuple(min), tuple(max))
    }

    fn spec(min: ShardKeyValue, max: ShardKeyValue, version: (u32, u32)) -> ChunkSpec {
        ChunkSpec {
            key_fields: vec!["_id".to_string()],
            range: range(min, max),
            version: ShardVersion::new(version.0, version.1),
        }
    }

    fn chunk(
        min: ShardKeyValue,
        max: ShardKeyValue,
        shard: &str,
        version: (u32, u32),
    ) -> Arc<Chunk> {
        Arc::new(Chunk::new(
            NS,
            vec!["_id".to_string()],
            range(min, max),
            Some(ShardName::from(shard)),
            Some(ShardVersion::new(version.0, version.1)),
            vec![],
        ))
    }

    fn snapshot(chunks: Vec<Arc<Chunk>>) -> ChunkDistribution {
        let mut distribution = ChunkDistribution::new(NS);
        for chunk in chunks {
            distribution.insert(chunk).unwrap();
        }
        distribution
    }

    fn split_event(
        time: bson::DateTime,
        before: ChunkSpec,
        left: ChunkSpec,
        right: ChunkSpec,
    ) -> Arc<ChangeEvent> {
        Arc::new(ChangeEvent::Split {
            namespace: NS.into(),
            time,
            before,
            left,
            right,
        })
    }

    fn move_event(
        time: bson::DateTime,
        phase: MovePhase,
        move_range: ChunkRange,
        donor: Option<&str>,
        aborted: bool,
    ) -> Arc<ChangeEvent> {
        Arc::new(ChangeEvent::Move {
            namespace: NS.into(),
            time,
            phase,
            range: move_range,
            donor: donor.map(ShardName::from),
            aborted,
        })
    }

    fn two_chunk_snapshot() -> ChunkDistribution {
        snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(5)), "s0", (3, 1)),
            chunk(key(Some(5)), ShardKeyValue::MaxKey, "s0", (3, 0)),
        ])
    }

    fn single_split() -> Arc<ChangeEvent> {
        split_event(
            dt(1_000),
            spec(ShardKeyValue::MinKey, ShardKeyValue::MaxKey, (2, 0)),
            spec(ShardKeyValue::MinKey, key(Some(5)), (3, 1)),
            spec(key(Some(5)), ShardKeyValue::MaxKey, (3, 0)),
        )
    }

    #[test]
    fn empty_journal_yields_only_the_snapshot() {
        test_helpers::maybe_start_logging();

        let walker = DistributionWalker::new(two_chunk_snapshot(), vec![]);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 1);
        assert_eq!(yielded[0].time(), DistributionTime::Latest);
        assert_eq!(yielded[0].len(), 2);
    }

    #[test]
    fn split_inversion_restores_the_merged_chunk() {
        let walker = DistributionWalker::new(two_chunk_snapshot(), vec![single_split()]);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 2);

        // the snapshot is untouched
        assert_eq!(yielded[0].len(), 2);
        assert_eq!(yielded[0].time(), DistributionTime::Latest);
        assert!(yielded[0].applied_change().is_none());

        let earlier = &yielded[1];
        assert_eq!(earlier.len(), 1);
        assert_eq!(earlier.time(), DistributionTime::At(dt(1_000)));
        assert_matches!(
            earlier.applied_change().unwrap().as_ref(),
            ChangeEvent::Split { .. }
        );
        assert!(earlier.check().is_ok());

        let merged = &earlier.chunks()[0];
        assert_eq!(merged.shard(), Some(&ShardName::from("s0")));
        assert_eq!(merged.version(), Some(ShardVersion::new(2, 0)));
        assert!(merged.range().min.is_all_min());
        assert!(merged.range().max.is_all_max());

        // the two halves hang underneath the merged chunk
        assert_eq!(merged.children().len(), 2);
        for child in merged.children() {
            assert!(Arc::ptr_eq(&child.parent().unwrap(), merged));
        }
        assert_eq!(merged.children()[0].range().min, merged.range().min);
        assert_eq!(
            merged.children()[0].range().max,
            merged.children()[1].range().min
        );
        assert_eq!(merged.children()[1].range().max, merged.range().max);
    }

    #[test]
    fn split_inversion_takes_versions_from_the_event() {
        // snapshot versions post-date the split (e.g. rewritten by a later
        // move); the journalled versions win
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(5)), "s0", (9, 9)),
            chunk(key(Some(5)), ShardKeyValue::MaxKey, "s0", (3, 0)),
        ]);
        let walker = DistributionWalker::new(distribution, vec![single_split()]);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();

        let merged = &yielded[1].chunks()[0];
        assert_eq!(merged.children()[0].version(), Some(ShardVersion::new(3, 1)));
        assert_eq!(merged.children()[1].version(), Some(ShardVersion::new(3, 0)));
    }

    #[test]
    fn multi_split_inverts_once() {
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(3)), "s0", (4, 1)),
            chunk(key(Some(3)), key(Some(7)), "s0", (4, 2)),
            chunk(key(Some(7)), ShardKeyValue::MaxKey, "s0", (4, 3)),
        ]);

        let before = spec(ShardKeyValue::MinKey, ShardKeyValue::MaxKey, (2, 5));
        let siblings = [
            spec(ShardKeyValue::MinKey, key(Some(3)), (4, 1)),
            spec(key(Some(3)), key(Some(7)), (4, 2)),
            spec(key(Some(7)), ShardKeyValue::MaxKey, (4, 3)),
        ];
        let events: Vec<_> = siblings
            .iter()
            .enumerate()
            .map(|(i, sibling)| {
                Arc::new(ChangeEvent::MultiSplit {
                    namespace: NS.into(),
                    time: dt(3_000 - i as i64),
                    before: before.clone(),
                    sibling: sibling.clone(),
                })
            })
            .collect();

        let walker = DistributionWalker::new(distribution, events);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();

        // one inversion for three journal entries
        assert_eq!(yielded.len(), 2);
        let earlier = &yielded[1];
        assert_eq!(earlier.len(), 1);
        assert!(earlier.check().is_ok());

        let merged = &earlier.chunks()[0];
        assert_eq!(merged.version(), Some(ShardVersion::new(2, 5)));
        assert_eq!(merged.children().len(), 3);
        for child in merged.children() {
            assert!(Arc::ptr_eq(&child.parent().unwrap(), merged));
        }
    }

    fn move_window(move_range: &ChunkRange) -> Vec<Arc<ChangeEvent>> {
        // the donor writes its summary last, so it leads the
        // newest-first journal
        vec![
            move_event(dt(4_000), MovePhase::From, move_range.clone(), None, false),
            move_event(dt(3_000), MovePhase::Commit, move_range.clone(), None, false),
            move_event(dt(2_000), MovePhase::To, move_range.clone(), None, false),
            move_event(
                dt(1_000),
                MovePhase::Start,
                move_range.clone(),
                Some("s0"),
                false,
            ),
        ]
    }

    #[test]
    fn completed_move_returns_the_chunk_to_its_donor() {
        let moved_range = range(key(Some(10)), key(Some(20)));
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(10)), "s0", (6, 0)),
            chunk(key(Some(10)), key(Some(20)), "s1", (7, 0)),
            chunk(key(Some(20)), ShardKeyValue::MaxKey, "s0", (6, 1)),
        ]);

        let walker = DistributionWalker::new(distribution, move_window(&moved_range));
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 2);

        let earlier = &yielded[1];
        assert_eq!(earlier.len(), 3);
        assert!(earlier.check().is_ok());
        // the new distribution is current as of the commit
        assert_eq!(earlier.time(), DistributionTime::At(dt(3_000)));

        let moved = earlier.find_by_range(&moved_range).unwrap();
        assert_eq!(moved.shard(), Some(&ShardName::from("s0")));
        assert_eq!(moved.version(), None);
        assert_eq!(moved.children().len(), 1);
        assert!(Arc::ptr_eq(&moved.children()[0].parent().unwrap(), moved));

        // the snapshot still owns the recipient-side chunk
        let current = yielded[0].find_by_range(&moved_range).unwrap();
        assert_eq!(current.shard(), Some(&ShardName::from("s1")));
    }

    #[test]
    fn aborted_move_is_ignored() {
        let moved_range = range(key(Some(10)), key(Some(20)));
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(10)), "s0", (6, 0)),
            chunk(key(Some(10)), key(Some(20)), "s1", (7, 0)),
            chunk(key(Some(20)), ShardKeyValue::MaxKey, "s0", (6, 1)),
        ]);
        let events = vec![move_event(
            dt(4_000),
            MovePhase::From,
            moved_range,
            None,
            true,
        )];

        let walker = DistributionWalker::new(distribution, events);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 1);
    }

    #[test]
    fn incomplete_move_window_is_ignored() {
        let moved_range = range(key(Some(10)), key(Some(20)));
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(10)), "s0", (6, 0)),
            chunk(key(Some(10)), key(Some(20)), "s1", (7, 0)),
            chunk(key(Some(20)), ShardKeyValue::MaxKey, "s0", (6, 1)),
        ]);
        let mut events = move_window(&moved_range);
        events.pop(); // drop the start entry

        let walker = DistributionWalker::new(distribution, events);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 1);
    }

    #[test]
    fn unrelated_event_inside_the_move_window_ends_the_scan() {
        let moved_range = range(ShardKeyValue::MinKey, key(Some(5)));
        let distribution = two_chunk_snapshot();

        let mut events = vec![move_event(
            dt(5_000),
            MovePhase::From,
            moved_range.clone(),
            None,
            false,
        )];
        events.push(single_split());
        events.extend(move_window(&moved_range).split_off(1));

        let walker = DistributionWalker::new(distribution, events);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();

        // the move is never inverted; the split still is
        assert_eq!(yielded.len(), 2);
        assert_eq!(yielded[1].len(), 1);
        assert_matches!(
            yielded[1].applied_change().unwrap().as_ref(),
            ChangeEvent::Split { .. }
        );
    }

    #[test]
    fn missing_chunk_is_an_inconsistent_journal() {
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(7)), "s0", (3, 1)),
            chunk(key(Some(7)), ShardKeyValue::MaxKey, "s0", (3, 0)),
        ]);
        // the split's halves do not exist in this distribution
        let mut walker = DistributionWalker::new(distribution, vec![single_split()]);

        assert_matches!(walker.next(), Some(Ok(_)));
        assert_matches!(walker.next(), Some(Err(WalkError::MissingChunk { .. })));
        assert_matches!(walker.next(), None);
    }

    #[test]
    fn mismatch_policy_applies_to_both_sides() {
        // journal sub-records disagree with the snapshot on the shard key
        // fields, which survives the shard copy and version sync
        let foreign = |min, max, version| ChunkSpec {
            key_fields: vec!["other".to_string()],
            ..spec(min, max, version)
        };
        let event = split_event(
            dt(1_000),
            spec(ShardKeyValue::MinKey, ShardKeyValue::MaxKey, (2, 0)),
            spec(ShardKeyValue::MinKey, key(Some(5)), (3, 1)),
            foreign(key(Some(5)), ShardKeyValue::MaxKey, (3, 0)),
        );

        // a right-side mismatch is as fatal as a left-side one
        let walker = DistributionWalker::new(two_chunk_snapshot(), vec![Arc::clone(&event)]);
        let err = walker
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_matches!(err, WalkError::ChunkMismatch { side: "right", .. });

        // unless the walk is configured to only warn
        let walker = DistributionWalker::new(two_chunk_snapshot(), vec![event])
            .with_policy(MismatchPolicy::Warn);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 2);
        assert!(yielded[1].check().is_ok());
    }

    #[test]
    fn yielded_times_decrease_strictly() {
        let moved_range = range(key(Some(10)), key(Some(20)));
        let distribution = snapshot(vec![
            chunk(ShardKeyValue::MinKey, key(Some(10)), "s0", (6, 0)),
            chunk(key(Some(10)), key(Some(20)), "s1", (7, 0)),
            chunk(key(Some(20)), ShardKeyValue::MaxKey, "s0", (6, 1)),
        ]);

        // a move window followed by the split that created the moved chunk
        let mut events = move_window(&moved_range);
        events.push(split_event(
            dt(500),
            spec(key(Some(10)), ShardKeyValue::MaxKey, (5, 0)),
            spec(key(Some(10)), key(Some(20)), (6, 0)),
            spec(key(Some(20)), ShardKeyValue::MaxKey, (6, 1)),
        ));

        let walker = DistributionWalker::new(distribution, events);
        let yielded: Vec<_> = walker.collect::<Result<_, _>>().unwrap();
        assert_eq!(yielded.len(), 3);

        let times: Vec<_> = yielded.iter().map(|d| d.time()).collect();
        for pair in times.windows(2) {
            assert!(pair[0] > pair[1], "times not strictly decreasing: {times:?}");
        }

        // the split inversion filled the version the move inversion left
        // unknown
        let merged = yielded[2].find_by_range(&range(key(Some(10)), ShardKeyValue::MaxKey)).unwrap();
        assert_eq!(merged.children()[0].version(), Some(ShardVersion::new(6, 0)));
        assert_eq!(merged.children()[0].shard(), Some(&ShardName::from("s0")));
    }
}
