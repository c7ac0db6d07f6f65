
use crate::data_types::variant_record::VariantRecord;

/// Anything that can hand out the records overlapping a genomic interval for a fixed set of samples.
pub trait VariantSource {
    /// The sample names, in the order they appear in every returned record
    fn sample_names(&self) -> &[String];

    /// Returns all records whose POS falls in the interval, in file order.
    /// `Ok(None)` means the interval cannot be queried in this source (e.g., unknown chromosome), which callers treat as missing data.
    /// # Arguments
    /// * `chrom` - chromosome name
    /// * `start` - first position, 1-based inclusive
    /// * `end` - last position, 1-based inclusive
    /// # Errors
    /// * if the underlying data cannot be read or decoded
    fn query(&mut self, chrom: &str, start: u64, end: u64) -> anyhow::Result<Option<Vec<VariantRecord>>>;

    /// Short label for logging
    fn label(&self) -> String {
        format!("{:?}", self.sample_names())
    }
}

/// A source backed by records held in memory; records must be sorted by position within a chromosome.
#[derive(Clone, Debug, Default)]
pub struct MemoryVariantSource {
    /// Sample names
    sample_names: Vec<String>,
    /// The records available to queries
    records: Vec<VariantRecord>
}

impl MemoryVariantSource {
    pub fn new(sample_names: Vec<String>, records: Vec<VariantRecord>) -> Self {
        Self { sample_names, records }
    }
}

impl VariantSource for MemoryVariantSource {
    fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    fn query(&mut self, chrom: &str, start: u64, end: u64) -> anyhow::Result<Option<Vec<VariantRecord>>> {
        if !self.records.iter().any(|r| r.chrom() == chrom) {
            return Ok(None);
        }

        let overlaps = self.records.iter()
            .filter(|r| r.chrom() == chrom && (start..=end).contains(&r.position()))
            .cloned()
            .collect();
        Ok(Some(overlaps))
    }

    fn label(&self) -> String {
        "in-memory".to_string()
    }
}
