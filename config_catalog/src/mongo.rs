//! Live config catalog access over the database driver.

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Database};
use observability_deps::tracing::{debug, info, warn};
use snafu::ResultExt;

use crate::interface::{CollectionEntry, ConfigCatalog, Error, QuerySnafu, UnreachableSnafu};
use crate::uri::CatalogUri;

/// How long to wait for a server before declaring the catalog unreachable.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`ConfigCatalog`] served by a live configuration database.
#[derive(Debug)]
pub struct MongoCatalog {
    database: Database,
    uri: CatalogUri,
}

impl MongoCatalog {
    /// Connect to the catalog at `uri` and verify it is reachable.
    ///
    /// The driver connects lazily, so reachability is probed with a `ping`
    /// here; an unreachable catalog must fail at connect time rather than
    /// on the first query.
    pub async fn connect(uri: &CatalogUri) -> Result<Self, Error> {
        let mut options = ClientOptions::parse(uri.connection_string())
            .await
            .context(UnreachableSnafu { uri: uri.short() })?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some("shardcheck".to_string());

        let client = Client::with_options(options).context(UnreachableSnafu { uri: uri.short() })?;
        let database = client.database(uri.database());
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context(UnreachableSnafu { uri: uri.short() })?;

        info!(catalog = %uri.short(), "connected to config catalog");
        Ok(Self {
            database,
            uri: uri.clone(),
        })
    }

    /// The URI this catalog was reached at.
    pub fn uri(&self) -> &CatalogUri {
        &self.uri
    }
}

#[async_trait]
impl ConfigCatalog for MongoCatalog {
    async fn collections(&self) -> Result<Vec<CollectionEntry>, Error> {
        let mut cursor = self
            .database
            .collection::<Document>("collections")
            .find(None, None)
            .await
            .context(QuerySnafu)?;

        let mut entries = vec![];
        while let Some(doc) = cursor.try_next().await.context(QuerySnafu)? {
            let namespace = match doc.get_str("_id") {
                Ok(namespace) => namespace.to_string(),
                Err(_) => {
                    warn!(catalog = %self.uri.short(), "collections entry without _id, skipping");
                    continue;
                }
            };
            let dropped = doc.get_bool("dropped").unwrap_or(false);
            entries.push(CollectionEntry { namespace, dropped });
        }
        Ok(entries)
    }

    async fn chunk_documents(&self, namespace: &str) -> Result<Vec<Document>, Error> {
        let cursor = self
            .database
            .collection::<Document>("chunks")
            .find(doc! { "ns": namespace }, None)
            .await
            .context(QuerySnafu)?;
        let chunks: Vec<Document> = cursor.try_collect().await.context(QuerySnafu)?;
        debug!(
            catalog = %self.uri.short(),
            namespace,
            n = chunks.len(),
            "fetched chunk snapshot"
        );
        Ok(chunks)
    }

    async fn changelog_documents(
        &self,
        namespace: &str,
        kinds: &[&str],
    ) -> Result<Vec<Document>, Error> {
        let kinds: Vec<Bson> = kinds.iter().map(|k| Bson::String(k.to_string())).collect();
        let options = FindOptions::builder().sort(doc! { "time": -1 }).build();
        let cursor = self
            .database
            .collection::<Document>("changelog")
            .find(
                doc! { "ns": namespace, "what": { "$in": kinds } },
                options,
            )
            .await
            .context(QuerySnafu)?;
        let entries: Vec<Document> = cursor.try_collect().await.context(QuerySnafu)?;
        debug!(
            catalog = %self.uri.short(),
            namespace,
            n = entries.len(),
            "fetched journal window"
        );
        Ok(entries)
    }
}
