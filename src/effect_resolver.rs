/*!
# Effect Resolver
Given a record that passed the QC gate and the ALT allele called by a sample, this finds the single most severe known effect term among the record's annotations.
Annotations for other alleles are ignored, and in canonical mode so are annotations on non-canonical transcripts.
Terms missing from the vocabulary are collected as diagnostics and never selected.
*/
use log::{debug, trace, warn};
use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::data_types::annotation::Annotation;
use crate::data_types::variant_record::VariantRecord;
use crate::data_types::vocabulary::{EffectTerm, Vocabulary};
use crate::parsing::gene_metadata::GeneMetadataProvider;

/// Run-scoped memo of canonical transcripts keyed by gene symbol.
/// Lookups go to the metadata provider at most once per symbol, failures are cached as None.
pub struct TranscriptCache<'a> {
    /// Where canonical transcripts come from
    provider: &'a dyn GeneMetadataProvider,
    /// Symbol -> canonical transcript
    cache: Mutex<HashMap<String, Option<String>>>
}

impl<'a> TranscriptCache<'a> {
    pub fn new(provider: &'a dyn GeneMetadataProvider) -> Self {
        Self {
            provider,
            cache: Default::default()
        }
    }

    /// Returns the canonical transcript for a gene symbol, resolving it on first use.
    /// # Arguments
    /// * `symbol` - the gene symbol from the annotation
    pub fn canonical_transcript(&self, symbol: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = cache.get(symbol) {
            return entry.clone();
        }

        let transcript = match self.provider.canonical_transcript(symbol) {
            Ok(t) => {
                debug!("Canonical transcript for {symbol}: {t}");
                Some(t)
            },
            Err(e) => {
                warn!("No canonical transcript for {symbol}, its annotations will be ignored in canonical mode: {e}");
                None
            }
        };
        cache.insert(symbol.to_string(), transcript.clone());
        transcript
    }

    /// Number of symbols resolved so far
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks the most severe known effect for a record/allele pair.
pub struct EffectResolver<'a> {
    /// Severity ranking
    vocabulary: &'a Vocabulary,
    /// Set when only canonical transcripts should be considered
    canonical: Option<&'a TranscriptCache<'a>>,
    /// Terms seen in annotations that are not in the vocabulary
    unknown_terms: Mutex<BTreeSet<String>>
}

impl<'a> EffectResolver<'a> {
    /// Constructor
    /// # Arguments
    /// * `vocabulary` - the shared severity ranking
    /// * `canonical` - if Some, only annotations on canonical transcripts are used
    pub fn new(vocabulary: &'a Vocabulary, canonical: Option<&'a TranscriptCache<'a>>) -> Self {
        Self {
            vocabulary,
            canonical,
            unknown_terms: Default::default()
        }
    }

    /// Returns the most severe known effect term for the called allele, or the `None` sentinel if no annotation is usable.
    /// Ties keep the first term encountered.
    /// # Arguments
    /// * `record` - a record that passed the QC gate
    /// * `called_allele` - the ALT sequence the sample carries
    pub fn resolve(&self, record: &VariantRecord, called_allele: &str) -> EffectTerm {
        let mut max_effect = self.vocabulary.none_term();
        for raw in record.annotations().iter() {
            let annotation = Annotation::parse(raw);
            if annotation.allele() != called_allele {
                trace!("Skipping annotation for allele {:?}, sample carries {called_allele:?}", annotation.allele());
                continue;
            }

            if let Some(cache) = self.canonical {
                if !self.is_canonical(cache, &annotation) {
                    continue;
                }
            }

            for term in annotation.effect_terms() {
                if !self.vocabulary.is_known(term) {
                    self.record_unknown(term, raw);
                    continue;
                }

                let severity = self.vocabulary.severity_of(term);
                if severity > max_effect.severity() {
                    max_effect = self.vocabulary.term(term);
                }
            }
        }
        trace!("{}:{} {called_allele} -> {max_effect}", record.chrom(), record.position());
        max_effect
    }

    /// Checks an annotation against the canonical transcript of its gene
    fn is_canonical(&self, cache: &TranscriptCache, annotation: &Annotation) -> bool {
        let symbol = annotation.gene_symbol();
        if symbol.len() <= 1 {
            // intergenic or otherwise gene-less annotation
            return false;
        }
        match cache.canonical_transcript(symbol) {
            Some(transcript) => transcript == annotation.transcript_id(),
            None => false
        }
    }

    /// Saves an unrecognized term, logging it the first time it shows up
    fn record_unknown(&self, term: &str, raw: &str) {
        let mut unknown = self.unknown_terms.lock().unwrap_or_else(|e| e.into_inner());
        if unknown.insert(term.to_string()) {
            warn!("New mutation effect identified: {term:?}, it will be ignored");
            debug!("\tSource annotation: {raw}");
        }
    }

    /// All unrecognized terms observed so far, sorted
    pub fn unknown_terms(&self) -> Vec<String> {
        self.unknown_terms.lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter().cloned().collect()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.vocabulary
    }
}
