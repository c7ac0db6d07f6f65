/*!
# Effect vocabulary
Static ranking of functional consequence terms (SnpEff/Sequence Ontology names) to severity scores.
The vocabulary is built once at startup and then shared read-only by every component.

## Example usage
```rust
use driver_profile::data_types::vocabulary::Vocabulary;

let vocabulary = Vocabulary::default().with_min_effect(1.5);
assert!(vocabulary.severity_of("stop_gained") > vocabulary.severity_of("missense_variant"));
assert!(vocabulary.is_reportable("missense_variant"));
assert!(!vocabulary.is_reportable("synonymous_variant"));
assert!(!vocabulary.is_known("made_up_variant"));
```
*/
use anyhow::Context;
use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::data_types::mutation_type::MutationType;

/// Sentinel for "no usable annotation", ranked below every real effect
pub const NONE_TERM: &str = "None";
/// Sentinel for "sufficiently covered, nothing found"
pub const CLEAN_TERM: &str = "clean";
/// Severity of the `None` sentinel
pub const NONE_SEVERITY: f64 = -1.0;
/// Severity of the `clean` sentinel
pub const CLEAN_SEVERITY: f64 = 0.0;
/// Default minimum severity for an effect to be reportable
pub const DEFAULT_MIN_EFFECT: f64 = 1.5;

/// Built-in severity table for SnpEff consequence terms
const DEFAULT_SEVERITIES: [(&str, f64); 19] = [
    ("sequence_feature", 0.0),
    ("intron_variant", 0.0),
    ("3_prime_UTR_variant", 0.0),
    ("5_prime_UTR_variant", 0.0),
    ("non_coding_exon_variant", 0.0),
    ("TF_binding_site_variant", 0.5),
    ("splice_region_variant", 0.5),
    ("synonymous_variant", 1.0),
    ("missense_variant", 1.5),
    ("splice_donor_variant", 2.0),
    ("splice_acceptor_variant", 2.0),
    ("inframe_deletion", 2.1),
    ("inframe_insertion", 2.1),
    ("disruptive_inframe_deletion", 2.5),
    ("disruptive_inframe_insertion", 2.5),
    ("5_prime_UTR_premature_start_codon_gain_variant", 3.0),
    ("stop_gained", 4.0),
    ("nonsense_mediated_decay", 4.0),
    ("frameshift_variant", 4.0)
];

/// Built-in MAF names for the reportable terms
const DEFAULT_MUTATION_TYPES: [(&str, MutationType); 12] = [
    ("synonymous_variant", MutationType::Silent),
    ("missense_variant", MutationType::MissenseMutation),
    ("splice_donor_variant", MutationType::SpliceSite),
    ("splice_acceptor_variant", MutationType::SpliceSite),
    ("inframe_deletion", MutationType::InFrameDel),
    ("inframe_insertion", MutationType::InFrameIns),
    ("disruptive_inframe_deletion", MutationType::FrameShiftDel),
    ("disruptive_inframe_insertion", MutationType::FrameShiftIns),
    ("5_prime_UTR_premature_start_codon_gain_variant", MutationType::NonsenseMutation),
    ("stop_gained", MutationType::NonsenseMutation),
    ("nonsense_mediated_decay", MutationType::NonsenseMutation),
    ("frameshift_variant", MutationType::FrameShift)
];

#[derive(thiserror::Error, Debug)]
pub enum VocabularyError {
    #[error("line {line}: expected at least 2 columns (term, severity)")]
    MissingColumn { line: usize },
    #[error("line {line}: severity {value:?} for {term:?} is not a finite number")]
    InvalidSeverity { line: usize, term: String, value: String },
    #[error("line {line}: unknown mutation type {value:?} for {term:?}, expected one of: {expected}")]
    InvalidMutationType { line: usize, term: String, value: String, expected: String },
    #[error("line {line}: effect term {term:?} is defined more than once")]
    DuplicateTerm { line: usize, term: String },
    #[error("line {line}: {term:?} is a reserved sentinel and cannot be redefined")]
    ReservedTerm { line: usize, term: String }
}

/// A consequence term paired with its severity.
/// Unknown terms carry `None` for severity and never win a severity comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectTerm {
    /// The term as written in the annotation
    name: String,
    /// Severity from the vocabulary, None if the term is unknown
    severity: Option<f64>
}

impl EffectTerm {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_known(&self) -> bool {
        self.severity.is_some()
    }

    /// Returns the severity, or negative infinity for unknown terms
    pub fn severity(&self) -> f64 {
        self.severity.unwrap_or(f64::NEG_INFINITY)
    }

    /// True if this is the `None` sentinel
    pub fn is_none_sentinel(&self) -> bool {
        self.name == NONE_TERM
    }

    /// True if this is the `clean` sentinel
    pub fn is_clean_sentinel(&self) -> bool {
        self.name == CLEAN_TERM
    }
}

impl std::fmt::Display for EffectTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Immutable term -> severity mapping with the derived reportable threshold.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    /// Severity per term, in definition order; always contains the two sentinels
    severities: IndexMap<String, f64>,
    /// Optional MAF naming for terms
    mutation_types: HashMap<String, MutationType>,
    /// Terms with severity >= this value are reportable
    min_effect: f64
}

impl Default for Vocabulary {
    fn default() -> Self {
        let severities = DEFAULT_SEVERITIES.iter()
            .map(|&(t, s)| (t.to_string(), s));
        let mutation_types = DEFAULT_MUTATION_TYPES.iter()
            .map(|&(t, m)| (t.to_string(), m))
            .collect();
        Self::from_parts(severities, mutation_types, DEFAULT_MIN_EFFECT)
    }
}

impl Vocabulary {
    /// Shared constructor that guarantees the sentinels are in place
    fn from_parts(
        severities: impl Iterator<Item = (String, f64)>,
        mutation_types: HashMap<String, MutationType>,
        min_effect: f64
    ) -> Self {
        let mut all_severities: IndexMap<String, f64> = IndexMap::new();
        all_severities.insert(NONE_TERM.to_string(), NONE_SEVERITY);
        all_severities.insert(CLEAN_TERM.to_string(), CLEAN_SEVERITY);
        all_severities.extend(severities);
        Self {
            severities: all_severities,
            mutation_types,
            min_effect
        }
    }

    /// Loads a custom vocabulary from a tab-delimited file without header.
    /// Columns are `term`, `severity`, and an optional MAF mutation type (e.g., `Missense_Mutation`).
    /// Lines starting with '#' are ignored.
    /// # Arguments
    /// * `filename` - the TSV to load
    /// * `min_effect` - the reportable threshold
    pub fn from_tsv(filename: &Path, min_effect: f64) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;

        let mut severities: IndexMap<String, f64> = Default::default();
        let mut mutation_types: HashMap<String, MutationType> = Default::default();
        for (row_index, result) in csv_reader.records().enumerate() {
            let line = row_index + 1;
            let row = result.with_context(|| format!("Error while reading {filename:?}"))?;
            let (term, raw_severity) = match (row.get(0), row.get(1)) {
                (Some(t), Some(s)) => (t.trim(), s.trim()),
                _ => return Err(VocabularyError::MissingColumn { line }.into())
            };

            if term == NONE_TERM || term == CLEAN_TERM {
                return Err(VocabularyError::ReservedTerm { line, term: term.to_string() }.into());
            }
            if severities.contains_key(term) {
                return Err(VocabularyError::DuplicateTerm { line, term: term.to_string() }.into());
            }

            let severity: f64 = match raw_severity.parse::<f64>() {
                Ok(s) if s.is_finite() => s,
                _ => return Err(VocabularyError::InvalidSeverity {
                    line, term: term.to_string(), value: raw_severity.to_string()
                }.into())
            };
            severities.insert(term.to_string(), severity);

            if let Some(raw_type) = row.get(2).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                let mutation_type = MutationType::from_str(raw_type)
                    .map_err(|_e| VocabularyError::InvalidMutationType {
                        line, term: term.to_string(), value: raw_type.to_string(),
                        expected: MutationType::valid_names()
                    })?;
                mutation_types.insert(term.to_string(), mutation_type);
            }
        }

        Ok(Self::from_parts(severities.into_iter(), mutation_types, min_effect))
    }

    /// Returns a copy with a different reportable threshold
    pub fn with_min_effect(mut self, min_effect: f64) -> Self {
        self.min_effect = min_effect;
        self
    }

    /// Severity of a term; unknown terms get negative infinity so they are never selected
    pub fn severity_of(&self, term: &str) -> f64 {
        self.severities.get(term).copied().unwrap_or(f64::NEG_INFINITY)
    }

    pub fn is_known(&self, term: &str) -> bool {
        self.severities.contains_key(term)
    }

    /// True if the term meets the minimum effect threshold
    pub fn is_reportable(&self, term: &str) -> bool {
        match self.severities.get(term) {
            Some(&severity) => severity >= self.min_effect,
            None => false
        }
    }

    /// Builds an `EffectTerm`, marking it unknown if it is not in the vocabulary
    pub fn term(&self, name: &str) -> EffectTerm {
        EffectTerm {
            name: name.to_string(),
            severity: self.severities.get(name).copied()
        }
    }

    /// The `None` sentinel term
    pub fn none_term(&self) -> EffectTerm {
        self.term(NONE_TERM)
    }

    /// The `clean` sentinel term
    pub fn clean_term(&self) -> EffectTerm {
        self.term(CLEAN_TERM)
    }

    /// All reportable terms, in definition order
    pub fn reportable_terms(&self) -> Vec<&str> {
        self.severities.iter()
            .filter(|(_t, &s)| s >= self.min_effect)
            .map(|(t, _s)| t.as_str())
            .collect()
    }

    /// Reportable terms that have no MAF name, these will fail if they end up in the detail chart
    pub fn unmapped_reportable_terms(&self) -> Vec<&str> {
        self.reportable_terms().into_iter()
            .filter(|t| *t != NONE_TERM && *t != CLEAN_TERM && !self.mutation_types.contains_key(*t))
            .collect()
    }

    /// MAF naming for a term, if one is defined
    pub fn mutation_type(&self, term: &str) -> Option<MutationType> {
        self.mutation_types.get(term).copied()
    }

    pub fn min_effect(&self) -> f64 {
        self.min_effect
    }

    pub fn len(&self) -> usize {
        self.severities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.severities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sentinel_ordering() {
        let vocabulary = Vocabulary::default();
        assert!(vocabulary.severity_of(NONE_TERM) < vocabulary.severity_of(CLEAN_TERM));
        assert_eq!(vocabulary.severity_of(CLEAN_TERM), 0.0);
        for (term, _s) in DEFAULT_SEVERITIES.iter() {
            assert!(vocabulary.severity_of(term) >= vocabulary.severity_of(CLEAN_TERM), "{term}");
        }
    }

    #[test]
    fn test_unknown_terms() {
        let vocabulary = Vocabulary::default();
        assert_eq!(vocabulary.severity_of("unheard_of_variant"), f64::NEG_INFINITY);
        assert!(vocabulary.severity_of("unheard_of_variant") < vocabulary.severity_of(NONE_TERM));
        assert!(!vocabulary.is_reportable("unheard_of_variant"));

        let term = vocabulary.term("unheard_of_variant");
        assert!(!term.is_known());
        assert_eq!(term.name(), "unheard_of_variant");
    }

    #[test]
    fn test_reportable_threshold() {
        let vocabulary = Vocabulary::default();
        let reportable = vocabulary.reportable_terms();
        assert!(reportable.contains(&"missense_variant"));
        assert!(reportable.contains(&"frameshift_variant"));
        assert!(!reportable.contains(&"synonymous_variant"));
        assert!(!reportable.contains(&CLEAN_TERM));

        let strict = Vocabulary::default().with_min_effect(4.0);
        assert!(!strict.is_reportable("missense_variant"));
        assert!(strict.is_reportable("stop_gained"));

        let lax = Vocabulary::default().with_min_effect(1.0);
        assert!(lax.is_reportable("synonymous_variant"));
    }

    #[test]
    fn test_default_has_all_mappings() {
        // the default vocabulary should never fail in the detail chart
        let vocabulary = Vocabulary::default().with_min_effect(0.5);
        let unmapped = vocabulary.unmapped_reportable_terms();
        assert_eq!(unmapped, vec!["TF_binding_site_variant", "splice_region_variant"]);
        assert!(Vocabulary::default().unmapped_reportable_terms().is_empty());
    }

    #[test]
    fn test_from_tsv() {
        let filename = std::env::temp_dir().join(format!("driver_profile_vocab_{}.tsv", std::process::id()));
        {
            let mut fp = std::fs::File::create(&filename).unwrap();
            writeln!(fp, "# custom table").unwrap();
            writeln!(fp, "missense_variant\t2.0\tMissense_Mutation").unwrap();
            writeln!(fp, "stop_lost\t3.5").unwrap();
        }
        let vocabulary = Vocabulary::from_tsv(&filename, 1.5).unwrap();
        std::fs::remove_file(&filename).unwrap();

        assert_eq!(vocabulary.len(), 4);
        assert_eq!(vocabulary.severity_of("missense_variant"), 2.0);
        assert_eq!(vocabulary.severity_of(NONE_TERM), NONE_SEVERITY);
        assert!(!vocabulary.is_known("stop_gained"));
        assert_eq!(vocabulary.mutation_type("missense_variant"), Some(MutationType::MissenseMutation));
        assert_eq!(vocabulary.unmapped_reportable_terms(), vec!["stop_lost"]);
    }

    #[test]
    fn test_from_tsv_errors() {
        let filename = std::env::temp_dir().join(format!("driver_profile_badvocab_{}.tsv", std::process::id()));
        {
            let mut fp = std::fs::File::create(&filename).unwrap();
            writeln!(fp, "missense_variant\thigh").unwrap();
        }
        let result = Vocabulary::from_tsv(&filename, 1.5);
        std::fs::remove_file(&filename).unwrap();
        let error = result.unwrap_err();
        assert!(matches!(error.downcast_ref::<VocabularyError>(), Some(VocabularyError::InvalidSeverity { line: 1, .. })));
    }
}
