//! Shared data types for auditing the shard-metadata of a sharded document
//! database: shard-key space with its ordering sentinels, chunk ranges and
//! versions, chunks, per-namespace chunk distributions and their history,
//! and the typed change-journal events.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

mod chunk;
mod distribution;
mod event;
mod history;
mod key;
mod shard;
mod time;

pub use chunk::{Chunk, SnapshotError};
pub use distribution::{CheckReport, ChunkDistribution, DistributionError};
pub use event::{ChangeEvent, ChunkSpec, MovePhase};
pub use history::History;
pub use key::{ChunkRange, KeyError, ShardKeyTuple, ShardKeyValue};
pub use shard::{ShardName, ShardVersion};
pub use time::DistributionTime;
