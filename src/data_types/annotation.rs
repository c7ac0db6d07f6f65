
/// Field positions inside a SnpEff ANN entry
const ALLELE_FIELD: usize = 0;
const EFFECT_FIELD: usize = 1;
const GENE_SYMBOL_FIELD: usize = 3;
const GENE_ID_FIELD: usize = 4;
const TRANSCRIPT_FIELD: usize = 6;
const PROTEIN_CHANGE_FIELD: usize = 10;

/// Borrowed view over one pipe-delimited annotation entry, e.g.
/// `T|missense_variant|MODERATE|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.35G>A|p.Gly12Asp|...`.
/// Missing trailing fields read as empty strings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Annotation<'a> {
    /// The raw string, kept for diagnostics
    raw: &'a str,
    /// Fields split on '|'
    allele: &'a str,
    effects: &'a str,
    gene_symbol: &'a str,
    gene_id: &'a str,
    transcript_id: &'a str,
    protein_change: &'a str
}

impl<'a> Annotation<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let fields: Vec<&str> = raw.split('|').collect();
        let get = |i: usize| fields.get(i).copied().unwrap_or_default();
        Self {
            raw,
            allele: get(ALLELE_FIELD),
            effects: get(EFFECT_FIELD),
            gene_symbol: get(GENE_SYMBOL_FIELD),
            gene_id: get(GENE_ID_FIELD),
            transcript_id: get(TRANSCRIPT_FIELD),
            protein_change: get(PROTEIN_CHANGE_FIELD)
        }
    }

    /// Individual consequence terms, multiple terms are joined with '&'
    pub fn effect_terms(&self) -> impl Iterator<Item = &'a str> {
        self.effects.split('&')
            .filter(|t| !t.is_empty())
    }

    /// True if any of the consequence terms equals `term`
    pub fn has_effect(&self, term: &str) -> bool {
        self.effect_terms().any(|t| t == term)
    }

    // getters
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn allele(&self) -> &'a str {
        self.allele
    }

    pub fn gene_symbol(&self) -> &'a str {
        self.gene_symbol
    }

    pub fn gene_id(&self) -> &'a str {
        self.gene_id
    }

    pub fn transcript_id(&self) -> &'a str {
        self.transcript_id
    }

    pub fn protein_change(&self) -> &'a str {
        self.protein_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_annotation() {
        let raw = "T|missense_variant&splice_region_variant|MODERATE|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.35G>A|p.Gly12Asp|35/1119|35/570|12/189||";
        let annotation = Annotation::parse(raw);
        assert_eq!(annotation.allele(), "T");
        assert_eq!(annotation.effect_terms().collect::<Vec<_>>(), vec!["missense_variant", "splice_region_variant"]);
        assert!(annotation.has_effect("splice_region_variant"));
        assert!(!annotation.has_effect("missense"));
        assert_eq!(annotation.gene_symbol(), "KRAS");
        assert_eq!(annotation.gene_id(), "ENSG00000133703");
        assert_eq!(annotation.transcript_id(), "ENST00000256078");
        assert_eq!(annotation.protein_change(), "p.Gly12Asp");
        assert_eq!(annotation.raw(), raw);
    }

    #[test]
    fn test_truncated_annotation() {
        let annotation = Annotation::parse("A|intron_variant");
        assert_eq!(annotation.allele(), "A");
        assert_eq!(annotation.gene_symbol(), "");
        assert_eq!(annotation.protein_change(), "");

        let annotation = Annotation::parse("");
        assert_eq!(annotation.effect_terms().count(), 0);
    }
}
