
use serde::{Deserialize, Serialize};

/// Flanking bases added on both sides of a gene when querying variants
pub const GENE_PADDING: u64 = 20;

/// Location of a gene of interest, resolved once per run by a metadata provider.
/// Coordinates are 1-based and inclusive.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct GeneRegion {
    /// Gene symbol, e.g. "KRAS"
    symbol: String,
    /// Chromosome name as written in the VCF files
    chrom: String,
    /// First base of the gene
    start: u64,
    /// Last base of the gene
    stop: u64,
    /// Canonical transcript identifier, if the provider knows it
    canonical_transcript: Option<String>
}

impl GeneRegion {
    /// Constructor
    pub fn new(symbol: String, chrom: String, start: u64, stop: u64, canonical_transcript: Option<String>) -> Self {
        Self {
            symbol, chrom, start, stop, canonical_transcript
        }
    }

    /// Returns the padded 1-based inclusive query interval, start is clamped at 1
    /// # Arguments
    /// * `padding` - the number of flanking bases on either side
    pub fn query_interval(&self, padding: u64) -> (u64, u64) {
        let start = self.start.saturating_sub(padding).max(1);
        let stop = self.stop + padding;
        (start, stop)
    }

    // getters
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> u64 {
        self.stop
    }

    pub fn canonical_transcript(&self) -> Option<&str> {
        self.canonical_transcript.as_deref()
    }
}

impl std::fmt::Display for GeneRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}:{}-{})", self.symbol, self.chrom, self.start, self.stop)
    }
}

/// A gene from the gene list; `region` is None when the symbol could not be resolved
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GeneTarget {
    /// Symbol as provided by the user
    symbol: String,
    /// Resolved location
    region: Option<GeneRegion>
}

impl GeneTarget {
    pub fn new(symbol: String, region: Option<GeneRegion>) -> Self {
        Self { symbol, region }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn region(&self) -> Option<&GeneRegion> {
        self.region.as_ref()
    }
}
