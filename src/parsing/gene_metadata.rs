
use anyhow::Context;
use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::data_types::gene_region::GeneRegion;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GeneMetadataError {
    #[error("gene symbol {symbol:?} was not found")]
    NotFound { symbol: String },
    #[error("gene {symbol:?} has no canonical transcript")]
    NoCanonicalTranscript { symbol: String }
}

/// Resolves gene symbols into locations and canonical transcripts.
/// Implementations must be shareable across worker threads.
pub trait GeneMetadataProvider: Sync {
    /// Looks up the location of a gene
    /// # Errors
    /// * `GeneMetadataError::NotFound` if the symbol is unknown
    fn resolve_gene(&self, symbol: &str) -> Result<GeneRegion, GeneMetadataError>;

    /// Stable identifier of the data behind this provider; it changes whenever any lookup result could change
    fn fingerprint(&self) -> String;

    /// Looks up the canonical transcript of a gene
    /// # Errors
    /// * `GeneMetadataError::NotFound` if the symbol is unknown
    /// * `GeneMetadataError::NoCanonicalTranscript` if the gene is known but has no transcript on record
    fn canonical_transcript(&self, symbol: &str) -> Result<String, GeneMetadataError> {
        let region = self.resolve_gene(symbol)?;
        region.canonical_transcript()
            .map(|t| t.to_string())
            .ok_or(GeneMetadataError::NoCanonicalTranscript { symbol: symbol.to_string() })
    }
}

/// One row of the metadata TSV
#[derive(Debug, Deserialize)]
struct MetadataRow {
    symbol: String,
    chrom: String,
    start: u64,
    stop: u64,
    canonical_transcript: Option<String>
}

/// In-memory gene table, the default provider.
#[derive(Clone, Debug, Default)]
pub struct GeneTable {
    /// Symbol -> region, in load order
    genes: IndexMap<String, GeneRegion>
}

impl GeneTable {
    /// Builds a table from already resolved regions; later duplicates replace earlier ones
    pub fn from_regions(regions: Vec<GeneRegion>) -> Self {
        let genes = regions.into_iter()
            .map(|r| (r.symbol().to_string(), r))
            .collect();
        Self { genes }
    }

    /// Loads a tab-delimited metadata export with the header `symbol chrom start stop canonical_transcript`.
    /// Coordinates are 1-based inclusive, the transcript column may be left empty.
    /// # Arguments
    /// * `filename` - the TSV file to load
    pub fn from_metadata_tsv(filename: &Path) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .from_path(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;

        let mut regions = vec![];
        for result in csv_reader.deserialize() {
            let row: MetadataRow = result.with_context(|| format!("Error while parsing {filename:?}:"))?;
            let canonical_transcript = row.canonical_transcript
                .filter(|t| !t.is_empty());
            regions.push(GeneRegion::new(row.symbol, row.chrom, row.start, row.stop, canonical_transcript));
        }
        debug!("Loaded {} gene definitions from {filename:?}", regions.len());
        Ok(Self::from_regions(regions))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

impl GeneMetadataProvider for GeneTable {
    fn resolve_gene(&self, symbol: &str) -> Result<GeneRegion, GeneMetadataError> {
        self.genes.get(symbol)
            .cloned()
            .ok_or(GeneMetadataError::NotFound { symbol: symbol.to_string() })
    }

    fn fingerprint(&self) -> String {
        // FxHasher is unseeded, so this is stable across runs
        let mut hasher = FxHasher::default();
        self.genes.len().hash(&mut hasher);
        for region in self.genes.values() {
            region.hash(&mut hasher);
        }
        format!("gene_table:{:016x}", hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_gene_table() {
        let table = GeneTable::from_regions(vec![
            GeneRegion::new("KRAS".to_string(), "12".to_string(), 25357723, 25403870, Some("ENST00000256078".to_string())),
            GeneRegion::new("TP53".to_string(), "17".to_string(), 7565097, 7590856, None)
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve_gene("KRAS").unwrap().chrom(), "12");
        assert_eq!(table.canonical_transcript("KRAS").unwrap(), "ENST00000256078");
        assert_eq!(table.canonical_transcript("TP53"), Err(GeneMetadataError::NoCanonicalTranscript { symbol: "TP53".to_string() }));
        assert_eq!(table.resolve_gene("BRAF"), Err(GeneMetadataError::NotFound { symbol: "BRAF".to_string() }));
    }

    #[test]
    fn test_fingerprint() {
        let kras = GeneRegion::new("KRAS".to_string(), "12".to_string(), 25357723, 25403870, None);
        let table = GeneTable::from_regions(vec![kras.clone()]);
        assert_eq!(table.fingerprint(), GeneTable::from_regions(vec![kras]).fingerprint());

        // any coordinate or transcript change is visible
        let moved = GeneTable::from_regions(vec![
            GeneRegion::new("KRAS".to_string(), "12".to_string(), 100, 200, None)
        ]);
        assert_ne!(table.fingerprint(), moved.fingerprint());
        let with_transcript = GeneTable::from_regions(vec![
            GeneRegion::new("KRAS".to_string(), "12".to_string(), 25357723, 25403870, Some("ENST00000256078".to_string()))
        ]);
        assert_ne!(table.fingerprint(), with_transcript.fingerprint());
        assert_ne!(table.fingerprint(), GeneTable::default().fingerprint());
    }

    #[test]
    fn test_metadata_tsv() {
        let filename = std::env::temp_dir().join(format!("driver_profile_metadata_{}.tsv", std::process::id()));
        {
            let mut fp = std::fs::File::create(&filename).unwrap();
            writeln!(fp, "symbol\tchrom\tstart\tstop\tcanonical_transcript").unwrap();
            writeln!(fp, "PIK3CA\t3\t178866311\t178952497\tENST00000263967").unwrap();
            writeln!(fp, "TP53\t17\t7565097\t7590856\t").unwrap();
        }
        let table = GeneTable::from_metadata_tsv(&filename).unwrap();
        std::fs::remove_file(&filename).unwrap();

        let pik3ca = table.resolve_gene("PIK3CA").unwrap();
        assert_eq!(pik3ca.start(), 178866311);
        assert_eq!(pik3ca.stop(), 178952497);
        assert_eq!(pik3ca.canonical_transcript(), Some("ENST00000263967"));
        assert_eq!(table.resolve_gene("TP53").unwrap().canonical_transcript(), None);
    }
}
