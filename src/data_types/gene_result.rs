
use crate::data_types::variant_record::VariantRecord;
use crate::data_types::vocabulary::{CLEAN_TERM, NONE_TERM};

/// Tri-state classification of a gene in one sample
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GeneCall {
    /// No informative positions, written as "None"
    NotAssessed,
    /// Well covered but no reportable effect, written as "clean"
    Clean,
    /// The worst reportable effect term
    Mutated(String)
}

impl std::fmt::Display for GeneCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneCall::NotAssessed => write!(f, "{NONE_TERM}"),
            GeneCall::Clean => write!(f, "{CLEAN_TERM}"),
            GeneCall::Mutated(effect) => write!(f, "{effect}")
        }
    }
}

/// The variant behind a `GeneCall::Mutated`, kept for the detail chart
#[derive(Clone, Debug, PartialEq)]
pub struct RetainedVariant {
    /// The record that produced the worst effect
    record: VariantRecord,
    /// The worst effect term
    effect: String,
    /// The ALT sequence called by the sample
    called_allele: String,
    /// Variant allele fraction of the sample at this record
    vaf: f64
}

impl RetainedVariant {
    pub fn new(record: VariantRecord, effect: String, called_allele: String, vaf: f64) -> Self {
        Self {
            record, effect, called_allele, vaf
        }
    }

    // getters
    pub fn record(&self) -> &VariantRecord {
        &self.record
    }

    pub fn effect(&self) -> &str {
        &self.effect
    }

    pub fn called_allele(&self) -> &str {
        &self.called_allele
    }

    pub fn vaf(&self) -> f64 {
        self.vaf
    }
}

/// Finalized result for one (sample, gene) pair
#[derive(Clone, Debug, PartialEq)]
pub struct GeneResult {
    /// Overall classification
    call: GeneCall,
    /// Number of reportable effects seen across the gene
    reportable_count: u64,
    /// The variant behind the call, only for reportable calls
    retained: Option<RetainedVariant>
}

impl GeneResult {
    pub fn new(call: GeneCall, reportable_count: u64, retained: Option<RetainedVariant>) -> Self {
        Self {
            call, reportable_count, retained
        }
    }

    /// Result for genes that could not be assessed at all
    pub fn not_assessed() -> Self {
        Self::new(GeneCall::NotAssessed, 0, None)
    }

    // getters
    pub fn call(&self) -> &GeneCall {
        &self.call
    }

    pub fn reportable_count(&self) -> u64 {
        self.reportable_count
    }

    pub fn retained(&self) -> Option<&RetainedVariant> {
        self.retained.as_ref()
    }
}
