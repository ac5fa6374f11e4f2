//! Implementation of the `check` subcommand.

use std::collections::{BTreeMap, BTreeSet};

use config_catalog::{CatalogUri, ConfigCatalog, MongoCatalog, DEFAULT_URI};
use futures::future::try_join_all;
use observability_deps::tracing::debug;
use reconstruct::{current_distribution, CatalogComparator, CompareOutcome, DistributionWalker};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid catalog URI: {0}")]
    Uri(#[from] config_catalog::UriError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] config_catalog::Error),
}

#[derive(Debug, clap::Parser)]
#[clap(
    about = "Performs a health check on config catalogs and compares them for inconsistencies",
    long_about = "Performs a health check on config catalogs and compares them for \
    inconsistencies.\n\nEach catalog is checked on its own: every sharded namespace must be \
    covered by a gap-free, overlap-free chunk range from MinKey to MaxKey. Given more than one \
    catalog, their collections and chunk layouts are compared, and for every disagreement the \
    change journals are walked backwards to the last moment the catalogs agreed."
)]
pub struct Config {
    /// URIs of the config catalogs to check,
    /// [scheme://][user:pass@]host[:port]/database
    #[clap(value_parser, default_value = DEFAULT_URI)]
    uris: Vec<String>,
}

pub async fn command(config: Config) -> Result<(), Error> {
    let uris = config
        .uris
        .iter()
        .map(|uri| uri.parse::<CatalogUri>())
        .collect::<Result<Vec<_>, _>>()?;

    let catalogs = try_join_all(uris.iter().map(MongoCatalog::connect)).await?;
    debug!(n = catalogs.len(), "connected to all config catalogs");

    println!();
    println!(">> individual health checks on all config catalogs");
    println!("   (verifies that for each namespace, the chunk ranges reach from MinKey to MaxKey without gaps or overlaps)");
    println!();
    for (uri, catalog) in uris.iter().zip(&catalogs) {
        println!("{}", uri.short());
        health_check(catalog).await?;
        println!();
    }

    if catalogs.len() > 1 {
        println!();
        println!(">> comparing the collections entries of each config catalog");
        println!("   (verifies that they agree on the state of each collection)");
        println!();
        let namespaces = compare_collections(&uris, &catalogs).await?;

        println!();
        println!(">> comparing the chunks entries of each config catalog");
        println!("   (verifies that they agree on chunk ranges for each namespace and finds the deviation point)");
        println!();
        compare_chunks(&catalogs, &namespaces).await;
    }

    Ok(())
}

/// Check every non-dropped namespace of one catalog. Namespace-level
/// failures are reported and do not stop the run.
async fn health_check(catalog: &MongoCatalog) -> Result<(), Error> {
    let collections = catalog.collections().await?;
    for entry in collections.iter().filter(|entry| !entry.dropped) {
        match current_distribution(catalog, &entry.namespace).await {
            Ok(distribution) => {
                let report = distribution.check();
                if report.is_ok() {
                    println!("     {}  ok", entry.namespace);
                } else {
                    println!("     {}  failed", entry.namespace);
                    for message in report.messages() {
                        println!("       ! {message}");
                    }
                }
            }
            Err(e) => {
                println!("     {}  failed", entry.namespace);
                println!("       ! {e}");
            }
        }
    }
    Ok(())
}

/// Compare which collections each catalog knows and whether they agree on
/// the dropped state. Returns the union of all namespaces for the chunk
/// comparison.
async fn compare_collections(
    uris: &[CatalogUri],
    catalogs: &[MongoCatalog],
) -> Result<BTreeSet<String>, Error> {
    let mut views: Vec<BTreeMap<String, bool>> = Vec::with_capacity(catalogs.len());
    for catalog in catalogs {
        let view = catalog
            .collections()
            .await?
            .into_iter()
            .map(|entry| (entry.namespace, entry.dropped))
            .collect();
        views.push(view);
    }

    let namespaces: BTreeSet<String> = views
        .iter()
        .flat_map(|view| view.keys().cloned())
        .collect();

    let uri_width = uris.iter().map(|uri| uri.short().len()).max().unwrap_or(0);
    let namespace_width = namespaces.iter().map(String::len).max().unwrap_or(0);
    let label_width = (namespace_width + 4).max("! collections differ".len());

    let mut header_printed = false;
    for namespace in &namespaces {
        let all_known = views.iter().all(|view| view.contains_key(namespace));
        let all_agree = all_known
            && views
                .iter()
                .all(|view| view.get(namespace) == views[0].get(namespace));
        if all_agree {
            continue;
        }

        if !header_printed {
            print!("{:<label_width$}", "! collections differ");
            for uri in uris {
                print!("{:^uri_width$}   ", uri.short());
            }
            println!();
            println!();
            header_printed = true;
        }

        print!("{namespace:<label_width$}");
        for view in &views {
            let word = match view.get(namespace) {
                Some(true) => "dropped",
                Some(false) => "sharded",
                None => "missing",
            };
            print!("{:^uri_width$}   ", word);
        }
        println!();
    }
    if !header_printed {
        println!("all collections agree");
    }
    println!();

    Ok(namespaces)
}

/// Compare the chunk layout of every namespace across the catalogs; when
/// layouts differ, walk the journals backwards to find the last common
/// moment. Reconstruction problems end the affected namespace only.
async fn compare_chunks(catalogs: &[MongoCatalog], namespaces: &BTreeSet<String>) {
    for namespace in namespaces {
        println!("{namespace}");

        let mut current = Vec::with_capacity(catalogs.len());
        let mut failed = false;
        for catalog in catalogs {
            match current_distribution(catalog, namespace).await {
                Ok(distribution) => current.push(distribution),
                Err(e) => {
                    println!("    ! skipping: {e}");
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }

        if current.iter().all(|distribution| distribution == &current[0]) {
            println!("    chunks match");
            continue;
        }
        println!("    ! chunks differ");

        let walks = match try_join_all(
            catalogs
                .iter()
                .map(|catalog| DistributionWalker::load(catalog as &dyn ConfigCatalog, namespace)),
        )
        .await
        {
            Ok(walks) => walks,
            Err(e) => {
                println!("    ! cannot walk the journals: {e}");
                continue;
            }
        };

        match CatalogComparator::new(walks).run() {
            Ok(CompareOutcome::Agreement { time, .. }) => {
                println!("    metadata was identical last on {time}");
            }
            Ok(CompareOutcome::NoCommonHistory) => {
                println!("    no common point in history found");
            }
            Err(e) => {
                println!("    ! reconstruction failed: {e}");
            }
        }
    }
}
