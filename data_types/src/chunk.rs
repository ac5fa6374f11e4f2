//! Chunks: the smallest addressable unit of a sharded namespace.

use std::fmt;
use std::sync::{Arc, Weak};

use bson::Document;
use parking_lot::RwLock;
use snafu::{ResultExt, Snafu};

use crate::{ChunkRange, ChunkSpec, KeyError, ShardKeyTuple, ShardName, ShardVersion};

/// Errors constructing a [`Chunk`] from a catalog chunk document.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum SnapshotError {
    #[snafu(display("chunk document missing or invalid field `{field}`: {source}"))]
    Field {
        field: &'static str,
        source: bson::document::ValueAccessError,
    },

    #[snafu(display("chunk document has an invalid shard key in `{field}`: {source}"))]
    Key { field: &'static str, source: KeyError },

    #[snafu(display("chunk document min/max disagree on shard key fields"))]
    KeyFieldsDiffer,
}

/// A contiguous half-open range `[min, max)` of one namespace's shard-key
/// space, owned by one shard.
///
/// Identity attributes (`namespace`, `key_fields`, `range`, `shard`,
/// `version`) are immutable after construction; filling in an unknown shard
/// or version always allocates a new chunk. The provenance links record how
/// reconstruction derived chunks from one another: `children` is fixed at
/// construction, while `parent` is back-linked afterwards (weakly, so the
/// derivation graph holds no cycles). Provenance is excluded from equality.
pub struct Chunk {
    namespace: Arc<str>,
    key_fields: Vec<String>,
    range: ChunkRange,
    shard: Option<ShardName>,
    version: Option<ShardVersion>,
    children: Vec<Arc<Chunk>>,
    parent: RwLock<Weak<Chunk>>,
}

impl Chunk {
    /// Create a chunk from its parts.
    pub fn new(
        namespace: impl Into<Arc<str>>,
        key_fields: Vec<String>,
        range: ChunkRange,
        shard: Option<ShardName>,
        version: Option<ShardVersion>,
        children: Vec<Arc<Self>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key_fields,
            range,
            shard,
            version,
            children,
            parent: RwLock::new(Weak::new()),
        }
    }

    /// Construct a chunk from a catalog chunk document. Requires `min`,
    /// `max`, `ns`, `shard` and `lastmod`.
    pub fn from_snapshot(doc: &Document) -> Result<Self, SnapshotError> {
        let min_doc = doc.get_document("min").context(FieldSnafu { field: "min" })?;
        let max_doc = doc.get_document("max").context(FieldSnafu { field: "max" })?;
        let namespace = doc.get_str("ns").context(FieldSnafu { field: "ns" })?;
        let shard = doc.get_str("shard").context(FieldSnafu { field: "shard" })?;
        let lastmod = doc
            .get_timestamp("lastmod")
            .context(FieldSnafu { field: "lastmod" })?;

        let (key_fields, min) =
            ShardKeyTuple::from_document(min_doc).context(KeySnafu { field: "min" })?;
        let (max_fields, max) =
            ShardKeyTuple::from_document(max_doc).context(KeySnafu { field: "max" })?;
        if key_fields != max_fields {
            return KeyFieldsDifferSnafu.fail();
        }

        Ok(Self::new(
            namespace,
            key_fields,
            ChunkRange::new(min, max),
            Some(ShardName::from(shard)),
            Some(ShardVersion::from(lastmod)),
            vec![],
        ))
    }

    /// Construct a chunk from a decoded journal sub-record.
    ///
    /// Journal sub-records omit the owning shard; the caller supplies it
    /// (usually copied from the distribution under reconstruction).
    pub fn from_spec(
        namespace: impl Into<Arc<str>>,
        spec: &ChunkSpec,
        shard: Option<ShardName>,
    ) -> Self {
        Self::new(
            namespace,
            spec.key_fields.clone(),
            spec.range.clone(),
            shard,
            Some(spec.version),
            vec![],
        )
    }

    /// A copy of this chunk carrying `version` instead of its own.
    ///
    /// Used when a journal event is authoritative for the version a chunk
    /// had at the event's point in time; the copy keeps the provenance
    /// `children` but starts with no parent.
    pub fn with_version(&self, version: ShardVersion) -> Self {
        Self {
            namespace: Arc::clone(&self.namespace),
            key_fields: self.key_fields.clone(),
            range: self.range.clone(),
            shard: self.shard.clone(),
            version: Some(version),
            children: self.children.clone(),
            parent: RwLock::new(Weak::new()),
        }
    }

    /// The namespace this chunk belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Shard-key field names, in key order.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// The chunk's range.
    pub fn range(&self) -> &ChunkRange {
        &self.range
    }

    /// The owning shard, if known.
    pub fn shard(&self) -> Option<&ShardName> {
        self.shard.as_ref()
    }

    /// The chunk's shard version, if known.
    pub fn version(&self) -> Option<ShardVersion> {
        self.version
    }

    /// Chunks this chunk was reconstructed from.
    pub fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    /// The chunk this one was derived into during reconstruction, if it is
    /// still alive.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.read().upgrade()
    }

    /// Back-link this chunk to the chunk derived from it.
    pub fn set_parent(&self, parent: &Arc<Self>) {
        *self.parent.write() = Arc::downgrade(parent);
    }

    /// Whether two chunks describe the same layout: `(namespace, range,
    /// shard)`. This is the agreement notion used when comparing whole
    /// distributions across catalogs, where per-chunk versions may differ.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.range == other.range && self.shard == other.shard
    }
}

// Equality covers the identity attributes only; provenance links are
// metadata about how a chunk was reconstructed, not what it is.
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.same_layout(other)
            && self.version == other.version
            && self.key_fields == other.key_fields
    }
}

impl Eq for Chunk {}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("namespace", &self.namespace)
            .field("range", &self.range)
            .field("shard", &self.shard)
            .field("version", &self.version)
            .field("children", &self.children.len())
            .finish()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk(ns={}, range={}, version=", self.namespace, self.range)?;
        match self.version {
            Some(v) => write!(f, "{v}")?,
            None => write!(f, "unknown")?,
        }
        write!(f, ", shard=")?;
        match &self.shard {
            Some(s) => write!(f, "{s}")?,
            None => write!(f, "unknown")?,
        }
        write!(f, ")")
    }
}
