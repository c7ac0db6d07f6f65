/*!
# Record Filter
Per-sample, per-position QC gate.
Stages are evaluated in order and short-circuit: genotype data present, depth, variant allele fraction, population frequency, and cohort frequency.
Any position that clears the depth stage is "depth qualified" and later contributes a `clean` slot for the gene, even if a later stage fails.

## Example usage
```rust
use driver_profile::data_types::variant_record::{FieldValue, SampleData, VariantRecord};
use driver_profile::record_filter::{FilterConfigBuilder, FilterOutcome, GenotypeLayout, RecordFilter};

let config = FilterConfigBuilder::default()
    .min_depth(10)
    .layout(GenotypeLayout::Gatk)
    .build().unwrap();
let filter = RecordFilter::new(&config);

let sample = SampleData::new(None)
    .with_field("AD", Some(FieldValue::List(vec![8, 2])));
let record = VariantRecord::new("1".to_string(), 100, "A".to_string(), vec!["T".to_string()]);
let outcome = filter.evaluate(&record, &sample);
assert_eq!(outcome, FilterOutcome::LowVaf);
assert!(outcome.is_depth_qualified());
assert!(!outcome.is_pass());
```
*/
use derive_builder::Builder;
use serde::Serialize;

use crate::data_types::variant_record::{SampleData, VariantRecord};

/// Population frequency fields checked by default (dbNSFP ExAC and GoNL annotations)
pub const DEFAULT_POP_FREQ_FIELDS: [&str; 4] = ["dbNSFP_ExAC_AF", "dbNSFP_ExAC_Adj_AF", "GoNLv5_Freq", "GoNLv5_AF"];
/// Cohort frequency field written by GATK joint calling
pub const DEFAULT_COHORT_FREQ_FIELD: &str = "MLEAF";

/// Selects which FORMAT fields carry depth and allele support.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, strum_macros::Display, strum_macros::EnumString, clap::ValueEnum)]
pub enum GenotypeLayout {
    /// Depth and support both come from the per-allele AD list
    #[default]
    #[strum(ascii_case_insensitive, serialize = "gatk")]
    #[clap(name = "gatk")]
    Gatk,
    /// Depth comes from the scalar DP, support from the per-allele DPR list
    #[strum(ascii_case_insensitive, serialize = "freebayes")]
    #[clap(name = "freebayes")]
    Freebayes
}

impl GenotypeLayout {
    /// FORMAT key for total depth
    pub fn depth_key(&self) -> &'static str {
        match self {
            GenotypeLayout::Gatk => "AD",
            GenotypeLayout::Freebayes => "DP"
        }
    }

    /// FORMAT key for per-allele support
    pub fn support_key(&self) -> &'static str {
        match self {
            GenotypeLayout::Gatk => "AD",
            GenotypeLayout::Freebayes => "DPR"
        }
    }

    /// Reads depth and alt support through this layout, None if either field is absent or null
    pub fn read_support(&self, sample: &SampleData) -> Option<ReadSupport> {
        let depth = sample.field(self.depth_key())?;
        let support = sample.field(self.support_key())?;
        Some(ReadSupport::new(depth.total(), support.alt_total()))
    }
}

/// Uniform view over depth and alt support, regardless of layout
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReadSupport {
    /// Total depth at the position
    total_depth: u64,
    /// Sum of all non-reference allele support
    alt_support: u64
}

impl ReadSupport {
    pub fn new(total_depth: u64, alt_support: u64) -> Self {
        Self { total_depth, alt_support }
    }

    pub fn total_depth(&self) -> u64 {
        self.total_depth
    }

    pub fn alt_support(&self) -> u64 {
        self.alt_support
    }

    /// Variant allele fraction; 0.0 when there is no depth
    pub fn vaf(&self) -> f64 {
        if self.total_depth == 0 {
            0.0
        } else {
            self.alt_support as f64 / self.total_depth as f64
        }
    }
}

/// Thresholds for the QC gate
#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct FilterConfig {
    /// Minimum total depth for a position to be considered reliable
    min_depth: u64,
    /// Minimum variant allele fraction
    min_vaf: f64,
    /// Maximum population frequency across `pop_freq_fields`
    max_pop_freq: f64,
    /// Maximum cohort frequency in `cohort_freq_field`
    max_cohort_freq: f64,
    /// Which FORMAT fields hold depth and support
    layout: GenotypeLayout,
    /// INFO fields with population frequencies
    pop_freq_fields: Vec<String>,
    /// INFO field with the pooled cohort frequency
    cohort_freq_field: String
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_depth: 10,
            min_vaf: 0.25,
            max_pop_freq: 0.05,
            max_cohort_freq: 0.10,
            layout: GenotypeLayout::default(),
            pop_freq_fields: DEFAULT_POP_FREQ_FIELDS.iter().map(|f| f.to_string()).collect(),
            cohort_freq_field: DEFAULT_COHORT_FREQ_FIELD.to_string()
        }
    }
}

impl FilterConfig {
    // getters
    pub fn min_depth(&self) -> u64 {
        self.min_depth
    }

    pub fn min_vaf(&self) -> f64 {
        self.min_vaf
    }

    pub fn max_pop_freq(&self) -> f64 {
        self.max_pop_freq
    }

    pub fn max_cohort_freq(&self) -> f64 {
        self.max_cohort_freq
    }

    pub fn layout(&self) -> GenotypeLayout {
        self.layout
    }

    pub fn pop_freq_fields(&self) -> &[String] {
        &self.pop_freq_fields
    }

    pub fn cohort_freq_field(&self) -> &str {
        &self.cohort_freq_field
    }
}

/// The stage at which a record stopped, or `Pass`
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::AsRefStr)]
pub enum FilterOutcome {
    /// Depth or support field missing/null, the sample is ignored at this position
    #[strum(serialize = "NO_DATA")]
    NoData,
    /// Total depth below the minimum
    #[strum(serialize = "LOW_DEPTH")]
    LowDepth,
    /// Depth is fine but the VAF is too low, position counts as clean
    #[strum(serialize = "LOW_VAF")]
    LowVaf,
    /// Too common in the population
    #[strum(serialize = "POP_FREQ")]
    PopulationFrequency,
    /// Too common in the cohort
    #[strum(serialize = "COHORT_FREQ")]
    CohortFrequency,
    /// All stages passed
    #[strum(serialize = "PASS")]
    Pass
}

impl FilterOutcome {
    /// True if the position cleared the depth stage
    pub fn is_depth_qualified(&self) -> bool {
        match self {
            FilterOutcome::NoData |
            FilterOutcome::LowDepth => false,

            FilterOutcome::LowVaf |
            FilterOutcome::PopulationFrequency |
            FilterOutcome::CohortFrequency |
            FilterOutcome::Pass => true
        }
    }

    pub fn is_pass(&self) -> bool {
        *self == FilterOutcome::Pass
    }
}

/// Applies a `FilterConfig` to records; the layout adapter is picked once here.
#[derive(Clone, Copy, Debug)]
pub struct RecordFilter<'a> {
    config: &'a FilterConfig
}

impl<'a> RecordFilter<'a> {
    pub fn new(config: &'a FilterConfig) -> Self {
        Self { config }
    }

    /// Runs the ordered QC gate for one sample at one record.
    /// # Arguments
    /// * `record` - the record, used for INFO-level frequencies
    /// * `sample` - the genotype block of the sample
    pub fn evaluate(&self, record: &VariantRecord, sample: &SampleData) -> FilterOutcome {
        let support = match self.config.layout.read_support(sample) {
            Some(s) => s,
            None => return FilterOutcome::NoData
        };
        self.evaluate_support(record, &support)
    }

    /// Same as `evaluate(...)` but with pre-extracted read support
    pub fn evaluate_support(&self, record: &VariantRecord, support: &ReadSupport) -> FilterOutcome {
        if support.total_depth() < self.config.min_depth {
            return FilterOutcome::LowDepth;
        }

        if support.vaf() < self.config.min_vaf {
            return FilterOutcome::LowVaf;
        }

        if self.population_frequency(record) > self.config.max_pop_freq {
            return FilterOutcome::PopulationFrequency;
        }

        if self.cohort_frequency(record) > self.config.max_cohort_freq {
            return FilterOutcome::CohortFrequency;
        }

        FilterOutcome::Pass
    }

    /// Maximum over all configured population frequency fields, missing fields and null values count as 0.0
    pub fn population_frequency(&self, record: &VariantRecord) -> f64 {
        self.config.pop_freq_fields.iter()
            .map(|field| max_frequency(record, field))
            .fold(0.0, f64::max)
    }

    /// Maximum of the cohort frequency field, 0.0 if missing
    pub fn cohort_frequency(&self, record: &VariantRecord) -> f64 {
        max_frequency(record, &self.config.cohort_freq_field)
    }

    pub fn config(&self) -> &FilterConfig {
        self.config
    }
}

/// Max value in an INFO field, treating missing fields and '.' entries as 0.0
fn max_frequency(record: &VariantRecord, field: &str) -> f64 {
    match record.info_values(field) {
        Some(values) => values.iter()
            .map(|v| v.unwrap_or(0.0))
            .fold(0.0, f64::max),
        None => 0.0
    }
}
