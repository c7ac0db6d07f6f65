
use anyhow::{anyhow, Context};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::data_types::gene_region::{GeneRegion, GeneTarget};
use crate::parsing::gene_metadata::{GeneMetadataProvider, GeneTable};
use crate::util::json_io::{load_json, save_json};

/// A line of the user gene list; coordinates are optional since only the symbol is required
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneListEntry {
    /// Gene symbol, 4th column
    symbol: String,
    /// Location from the first three columns, if they parsed
    region: Option<GeneRegion>
}

impl GeneListEntry {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn region(&self) -> Option<&GeneRegion> {
        self.region.as_ref()
    }
}

/// Loads a tab-delimited gene list with the columns `chrom start stop symbol`.
/// Lines starting with '#' are ignored, duplicate symbols are dropped keeping the first.
/// Coordinates are read as 1-based inclusive.
/// # Arguments
/// * `filename` - the gene list to parse
pub fn load_gene_list(filename: &Path) -> anyhow::Result<Vec<GeneListEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let mut observed: BTreeSet<String> = Default::default();
    let mut entries = vec![];
    for result in csv_reader.records() {
        let row = result.with_context(|| format!("Error while reading {filename:?}"))?;
        let symbol = row.get(3)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(anyhow!("Missing gene symbol (column 4) on row: {row:?}"))?;

        if !observed.insert(symbol.to_string()) {
            warn!("Ignoring duplicate gene {symbol} in {filename:?}");
            continue;
        }

        let chrom = row.get(0).map(|c| c.trim().to_string());
        let start = row.get(1).and_then(|v| v.trim().parse::<u64>().ok());
        let stop = row.get(2).and_then(|v| v.trim().parse::<u64>().ok());
        let region = match (chrom, start, stop) {
            (Some(c), Some(s), Some(e)) if !c.is_empty() && s <= e => {
                Some(GeneRegion::new(symbol.to_string(), c, s, e, None))
            },
            _ => None
        };

        entries.push(GeneListEntry {
            symbol: symbol.to_string(),
            region
        });
    }

    Ok(entries)
}

/// Builds a provider from the coordinates in the gene list itself
pub fn gene_list_table(entries: &[GeneListEntry]) -> GeneTable {
    GeneTable::from_regions(
        entries.iter()
            .filter_map(|e| e.region.clone())
            .collect()
    )
}

/// Resolves every gene list entry through the provider.
/// Unresolvable symbols are kept with no region so they still get a column in the outputs.
/// # Arguments
/// * `entries` - the loaded gene list
/// * `provider` - the metadata source
pub fn resolve_gene_targets(entries: &[GeneListEntry], provider: &dyn GeneMetadataProvider) -> Vec<GeneTarget> {
    entries.iter()
        .map(|entry| {
            let region = match provider.resolve_gene(entry.symbol()) {
                Ok(r) => {
                    debug!("Resolved {r}");
                    Some(r)
                },
                Err(e) => {
                    warn!("Skipping gene {}, it will be reported as None: {e}", entry.symbol());
                    None
                }
            };
            GeneTarget::new(entry.symbol().to_string(), region)
        })
        .collect()
}

/// On-disk cache of resolved gene targets, tied to the gene list it came from
#[derive(Debug, Deserialize, Serialize)]
struct GeneCache {
    /// The symbols in gene list order, used to detect a stale cache
    symbols: Vec<String>,
    /// Fingerprint of the provider the targets were resolved with
    #[serde(default)]
    source: String,
    /// The resolved targets
    targets: Vec<GeneTarget>
}

/// Default cache location: `<gene list>.regions.json`
pub fn default_cache_path(gene_list: &Path) -> PathBuf {
    let mut cache_fn = gene_list.to_owned().into_os_string();
    cache_fn.push(".regions.json");
    PathBuf::from(cache_fn)
}

/// Loads resolved targets from the cache if it matches the gene list, otherwise resolves and saves a fresh cache.
/// # Arguments
/// * `entries` - the loaded gene list
/// * `provider` - the metadata source used on a cache miss
/// * `cache_fn` - where the cache lives
/// * `refresh` - if true, any existing cache is ignored
pub fn load_or_resolve_targets(
    entries: &[GeneListEntry],
    provider: &dyn GeneMetadataProvider,
    cache_fn: &Path,
    refresh: bool
) -> anyhow::Result<Vec<GeneTarget>> {
    let symbols: Vec<String> = entries.iter()
        .map(|e| e.symbol().to_string())
        .collect();

    let source = provider.fingerprint();

    if !refresh && cache_fn.exists() {
        match load_json::<GeneCache>(cache_fn) {
            Ok(cache) if cache.symbols == symbols && cache.source == source => {
                info!("Loaded {} resolved genes from cache {cache_fn:?}", cache.targets.len());
                return Ok(cache.targets);
            },
            Ok(cache) if cache.symbols == symbols => {
                info!("Gene cache {cache_fn:?} was resolved from different gene coordinates, re-resolving...");
            },
            Ok(_cache) => {
                info!("Gene cache {cache_fn:?} does not match the gene list, re-resolving...");
            },
            Err(e) => {
                warn!("Ignoring unreadable gene cache: {e:#}");
            }
        }
    }

    let targets = resolve_gene_targets(entries, provider);
    let cache = GeneCache {
        symbols,
        source,
        targets
    };
    save_json(&cache, cache_fn)
        .with_context(|| format!("Error while saving gene cache to {cache_fn:?}:"))?;
    info!("Saved resolved genes to {cache_fn:?}");
    Ok(cache.targets)
}
