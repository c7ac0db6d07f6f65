/*!
# Gene Aggregator
Reduces the effect slots collected for one (sample, gene) pair into a single `GeneResult`.
Each depth-qualified position contributes exactly one slot: `clean`, or the resolved effect when the position passed every QC stage.
*/
use log::trace;

use crate::data_types::gene_result::{GeneCall, GeneResult, RetainedVariant};
use crate::data_types::vocabulary::{EffectTerm, Vocabulary};

/// One observation for a gene in one sample
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSlot {
    /// `clean`, `None` (passed QC but no usable annotation), or a real effect
    term: EffectTerm,
    /// The variant behind a reportable effect
    retained: Option<RetainedVariant>
}

impl EffectSlot {
    /// Slot for a position that passed the depth stage only
    pub fn clean(vocabulary: &Vocabulary) -> Self {
        Self {
            term: vocabulary.clean_term(),
            retained: None
        }
    }

    /// Slot for a position that passed all stages and went through the resolver
    pub fn called(term: EffectTerm, retained: Option<RetainedVariant>) -> Self {
        Self { term, retained }
    }

    pub fn term(&self) -> &EffectTerm {
        &self.term
    }

    pub fn retained(&self) -> Option<&RetainedVariant> {
        self.retained.as_ref()
    }
}

/// Ordered slots for one (sample, gene) pair, filled while scanning the gene's positions
#[derive(Clone, Debug, Default)]
pub struct GeneTally {
    slots: Vec<EffectSlot>
}

impl GeneTally {
    pub fn push(&mut self, slot: EffectSlot) {
        self.slots.push(slot);
    }

    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Applies the gene-level classification rules
#[derive(Clone, Copy, Debug)]
pub struct GeneAggregator<'a> {
    vocabulary: &'a Vocabulary
}

impl<'a> GeneAggregator<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// True if a slot term counts toward the mutation count; the sentinels never do
    fn is_reportable(&self, term: &EffectTerm) -> bool {
        !term.is_none_sentinel() && !term.is_clean_sentinel() && self.vocabulary.is_reportable(term.name())
    }

    /// Finalizes a gene for one sample.
    /// # Arguments
    /// * `tally` - the slots in genomic order
    /// * `annotated_positions` - the number of positions annotated with this gene, shared by all samples
    pub fn aggregate(&self, tally: GeneTally, annotated_positions: u64) -> GeneResult {
        let slots = tally.slots;
        if slots.is_empty() {
            return GeneResult::not_assessed();
        }

        let reportable_count = slots.iter()
            .filter(|s| self.is_reportable(&s.term))
            .count() as u64;

        // arg-max with strict comparison, so the earliest position wins ties
        let mut best_index = 0;
        for (i, slot) in slots.iter().enumerate().skip(1) {
            if slot.term.severity() > slots[best_index].term.severity() {
                best_index = i;
            }
        }

        let num_slots = slots.len() as u64;
        let best = slots.into_iter().nth(best_index);
        match best {
            Some(slot) if self.is_reportable(&slot.term) => {
                trace!("\tWorst effect {} with {reportable_count} reportable", slot.term);
                GeneResult::new(GeneCall::Mutated(slot.term.name().to_string()), reportable_count, slot.retained)
            },
            _ => {
                // every slot is at least a clean observation
                let call = if 2 * num_slots >= annotated_positions {
                    GeneCall::Clean
                } else {
                    GeneCall::NotAssessed
                };
                trace!("\t{call} from {num_slots} clean / {annotated_positions} annotated");
                GeneResult::new(call, reportable_count, None)
            }
        }
    }
}
