//! Traits and data types for config catalog access.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::Document;
use snafu::Snafu;

/// Errors reaching or querying a config catalog.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("config catalog unreachable at `{uri}`: {source}"))]
    Unreachable {
        uri: String,
        source: mongodb::error::Error,
    },

    #[snafu(display("config catalog query failed: {source}"))]
    Query { source: mongodb::error::Error },
}

/// One entry of the catalog's `collections` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    /// The sharded namespace, `database.collection`.
    pub namespace: String,
    /// Whether the collection has been dropped.
    pub dropped: bool,
}

/// Read access to one config catalog.
///
/// Implementations return raw documents; decoding them into typed chunks
/// and events is the caller's concern, so that every backend (live or
/// in-memory) serves exactly the same bytes to the reconstruction core.
#[async_trait]
pub trait ConfigCatalog: Debug + Send + Sync {
    /// All known sharded collections, dropped ones included.
    async fn collections(&self) -> Result<Vec<CollectionEntry>, Error>;

    /// The current chunk documents of `namespace`, in no particular order.
    async fn chunk_documents(&self, namespace: &str) -> Result<Vec<Document>, Error>;

    /// The journal entries of `namespace` whose `what` is one of `kinds`,
    /// ordered by `time` descending.
    async fn changelog_documents(
        &self,
        namespace: &str,
        kinds: &[&str],
    ) -> Result<Vec<Document>, Error>;
}
