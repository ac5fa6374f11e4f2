//! Time-travel reconstruction of a sharded namespace's chunk distributions.
//!
//! The config catalog stores the *current* chunk layout; the change journal
//! records every split and move that produced it. This crate inverts those
//! events one by one, walking a namespace's layout backwards in time, and
//! compares the walks of several catalogs to find the last moment they
//! agreed.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod codec;
pub mod compare;
pub mod walk;

pub use codec::{decode_entry, DecodeError, JOURNAL_KINDS};
pub use compare::{CatalogComparator, CompareOutcome};
pub use walk::{
    build_history, current_distribution, DistributionWalker, MismatchPolicy, WalkError,
};
