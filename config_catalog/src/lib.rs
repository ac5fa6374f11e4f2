//! Access to the config catalog of a sharded document database: the
//! `collections`, `chunks` and `changelog` collections of its configuration
//! database.
//!
//! The [`ConfigCatalog`] trait is what the reconstruction core consumes;
//! [`MongoCatalog`] talks to a live catalog and [`MemCatalog`] backs tests
//! and fixtures.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod interface;
pub mod mem;
pub mod mongo;
pub mod uri;

pub use interface::{CollectionEntry, ConfigCatalog, Error};
pub use mem::MemCatalog;
pub use mongo::MongoCatalog;
pub use uri::{CatalogUri, UriError, DEFAULT_PORT, DEFAULT_URI};
