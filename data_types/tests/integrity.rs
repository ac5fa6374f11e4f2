//! Property tests for distribution integrity checking.

use std::collections::BTreeSet;
use std::sync::Arc;

use data_types::{Chunk, ChunkDistribution, ChunkRange, ShardKeyTuple, ShardKeyValue, ShardName, ShardVersion};
use proptest::prelude::*;

const NAMESPACE: &str = "propdb.coll";

fn tuple(v: ShardKeyValue) -> ShardKeyTuple {
    ShardKeyTuple::new(vec![v])
}

/// Build the boundary tuples MinKey, c1, ..., cn, MaxKey from a set of cuts.
fn boundaries(cuts: &BTreeSet<i64>) -> Vec<ShardKeyTuple> {
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(tuple(ShardKeyValue::MinKey));
    bounds.extend(cuts.iter().map(|c| tuple(ShardKeyValue::Int(*c))));
    bounds.push(tuple(ShardKeyValue::MaxKey));
    bounds
}

fn chunk(min: ShardKeyTuple, max: ShardKeyTuple, index: usize) -> Arc<Chunk> {
    Arc::new(Chunk::new(
        NAMESPACE,
        vec!["_id".to_string()],
        ChunkRange::new(min, max),
        Some(ShardName::new(format!("shard{:04}", index % 3))),
        Some(ShardVersion::new(1, index as u32)),
        vec![],
    ))
}

/// A valid snapshot distribution built by inserting the chunks in a
/// generator-chosen order.
fn distribution(cuts: &BTreeSet<i64>, order: u64) -> ChunkDistribution {
    let bounds = boundaries(cuts);
    let mut chunks: Vec<_> = bounds
        .windows(2)
        .enumerate()
        .map(|(i, pair)| chunk(pair[0].clone(), pair[1].clone(), i))
        .collect();

    // shuffle deterministically so insertion order varies with the seed
    let mut shuffled = Vec::with_capacity(chunks.len());
    let mut seed = order;
    while !chunks.is_empty() {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let at = (seed % chunks.len() as u64) as usize;
        shuffled.push(chunks.remove(at));
    }

    let mut dist = ChunkDistribution::new(NAMESPACE);
    for c in shuffled {
        dist.insert(c).unwrap();
    }
    dist
}

proptest! {
    /// Inserting a gap-free snapshot in any order yields a distribution that
    /// passes its integrity check.
    #[test]
    fn valid_snapshots_check_ok(
        cuts in prop::collection::btree_set(-1000i64..1000, 0..8),
        order in any::<u64>(),
    ) {
        let dist = distribution(&cuts, order);
        let report = dist.check();
        prop_assert!(report.is_ok(), "unexpected violations: {:?}", report.messages());
        prop_assert_eq!(dist.len(), cuts.len() + 1);
    }

    /// Removing any interior chunk produces exactly one discontinuity that
    /// names the removed chunk's boundaries.
    #[test]
    fn missing_chunks_are_named(
        cuts in prop::collection::btree_set(-1000i64..1000, 2..8),
        order in any::<u64>(),
        victim in any::<prop::sample::Index>(),
    ) {
        let mut dist = distribution(&cuts, order);
        // pick an interior chunk so both coverage ends stay intact
        let at = 1 + victim.index(dist.len() - 2);
        let removed = Arc::clone(&dist.chunks()[at]);
        dist.remove(removed.range()).unwrap();

        let report = dist.check();
        prop_assert!(!report.is_ok());
        let discontinuities: Vec<_> = report
            .messages()
            .iter()
            .filter(|m| m.contains("discontinuity"))
            .collect();
        prop_assert_eq!(discontinuities.len(), 1);
        let message = discontinuities[0];
        let min = removed.range().min.display_with(removed.key_fields()).to_string();
        let max = removed.range().max.display_with(removed.key_fields()).to_string();
        prop_assert!(message.contains(&min), "{} missing from `{}`", min, message);
        prop_assert!(message.contains(&max), "{} missing from `{}`", max, message);
    }

    /// A contradictory max on the last chunk is reported as missing
    /// MaxKey coverage.
    #[test]
    fn truncated_coverage_is_reported(
        cuts in prop::collection::btree_set(-1000i64..1000, 1..8),
        order in any::<u64>(),
    ) {
        let mut dist = distribution(&cuts, order);
        let last = Arc::clone(dist.chunks().last().unwrap());
        dist.remove(last.range()).unwrap();

        let report = dist.check();
        prop_assert!(!report.is_ok());
        prop_assert!(report
            .messages()
            .contains(&"chunk range does not end with MaxKey".to_string()));
    }
}
