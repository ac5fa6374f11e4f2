//! In-memory config catalog, for testing.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;

use crate::interface::{CollectionEntry, ConfigCatalog, Error};

/// An in-memory [`ConfigCatalog`] fed by fixture builders.
///
/// Serves documents with the same contract as a live catalog: chunk
/// documents in insertion order, journal entries filtered by kind and
/// sorted by `time` descending.
#[derive(Debug, Default)]
pub struct MemCatalog {
    state: Mutex<MemState>,
}

#[derive(Debug, Default)]
struct MemState {
    collections: Vec<CollectionEntry>,
    chunks: HashMap<String, Vec<Document>>,
    changelog: HashMap<String, Vec<Document>>,
}

impl MemCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sharded collection.
    pub fn push_collection(&self, namespace: &str, dropped: bool) {
        self.state.lock().collections.push(CollectionEntry {
            namespace: namespace.to_string(),
            dropped,
        });
    }

    /// Add a chunk document to `namespace`'s current snapshot.
    pub fn push_chunk(&self, namespace: &str, doc: Document) {
        self.state
            .lock()
            .chunks
            .entry(namespace.to_string())
            .or_default()
            .push(doc);
    }

    /// Add a journal entry to `namespace`'s changelog.
    pub fn push_change(&self, namespace: &str, doc: Document) {
        self.state
            .lock()
            .changelog
            .entry(namespace.to_string())
            .or_default()
            .push(doc);
    }
}

#[async_trait]
impl ConfigCatalog for MemCatalog {
    async fn collections(&self) -> Result<Vec<CollectionEntry>, Error> {
        Ok(self.state.lock().collections.clone())
    }

    async fn chunk_documents(&self, namespace: &str) -> Result<Vec<Document>, Error> {
        Ok(self
            .state
            .lock()
            .chunks
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn changelog_documents(
        &self,
        namespace: &str,
        kinds: &[&str],
    ) -> Result<Vec<Document>, Error> {
        let mut entries: Vec<Document> = self
            .state
            .lock()
            .changelog
            .get(namespace)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| {
                        doc.get_str("what")
                            .map(|what| kinds.contains(&what))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // live catalogs serve the journal newest-first; a stable sort keeps
        // insertion order among entries sharing a timestamp
        entries.sort_by_key(|doc| {
            Reverse(
                doc.get_datetime("time")
                    .copied()
                    .unwrap_or(bson::DateTime::MIN),
            )
        });
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn changelog_filters_and_sorts_descending() {
        let catalog = MemCatalog::new();
        catalog.push_change(
            "db.coll",
            doc! { "what": "split", "time": bson::DateTime::from_millis(100) },
        );
        catalog.push_change(
            "db.coll",
            doc! { "what": "dropCollection", "time": bson::DateTime::from_millis(300) },
        );
        catalog.push_change(
            "db.coll",
            doc! { "what": "moveChunk.commit", "time": bson::DateTime::from_millis(200) },
        );

        let entries = catalog
            .changelog_documents("db.coll", &["split", "moveChunk.commit"])
            .await
            .unwrap();
        let kinds: Vec<_> = entries
            .iter()
            .map(|doc| doc.get_str("what").unwrap())
            .collect();
        assert_eq!(kinds, ["moveChunk.commit", "split"]);

        let none = catalog
            .changelog_documents("other.coll", &["split"])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn collections_and_chunks_round_trip() {
        let catalog = MemCatalog::new();
        catalog.push_collection("db.coll", false);
        catalog.push_collection("db.dropped", true);
        catalog.push_chunk("db.coll", doc! { "ns": "db.coll" });

        let collections = catalog.collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert!(collections[1].dropped);

        assert_eq!(catalog.chunk_documents("db.coll").await.unwrap().len(), 1);
        assert!(catalog.chunk_documents("db.other").await.unwrap().is_empty());
    }
}
