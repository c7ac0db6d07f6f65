
use rustc_hash::FxHashMap as HashMap;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GenotypeError {
    #[error("empty genotype string")]
    Empty,
    #[error("invalid allele {allele:?} in genotype {genotype:?}")]
    InvalidAllele { genotype: String, allele: String }
}

/// A decoded genotype; alleles are indices into [REF, ALT1, ALT2, ...], None for missing ('.')
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Genotype {
    /// Allele indices in the order they were written
    alleles: Vec<Option<usize>>,
    /// True if any separator was '|'
    phased: bool
}

impl FromStr for Genotype {
    type Err = GenotypeError;

    /// Parses "0/1", "1|2", "./.", or haploid "1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(GenotypeError::Empty);
        }

        let phased = s.contains('|');
        let alleles = s.split(['/', '|'])
            .map(|a| {
                if a == "." {
                    Ok(None)
                } else {
                    a.parse::<usize>()
                        .map(Some)
                        .map_err(|_e| GenotypeError::InvalidAllele { genotype: s.to_string(), allele: a.to_string() })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alleles, phased })
    }
}

impl Genotype {
    /// Constructor from already decoded allele indices
    pub fn new(alleles: Vec<Option<usize>>, phased: bool) -> Self {
        Self { alleles, phased }
    }

    /// Returns the index of the non-reference allele that represents this call.
    /// For multiple ALT alleles (e.g., 1/2) the last one wins, for hom-ref or no-calls this is None.
    pub fn called_alt_index(&self) -> Option<usize> {
        self.alleles.iter()
            .rev()
            .find_map(|a| a.filter(|&i| i > 0))
    }

    pub fn alleles(&self) -> &[Option<usize>] {
        &self.alleles
    }

    pub fn is_phased(&self) -> bool {
        self.phased
    }
}

/// Integer FORMAT values that can carry read depth or allele support.
/// Callers disagree on shape; GATK writes AD as a list, freebayes writes DP as a scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(u64),
    List(Vec<u64>)
}

impl FieldValue {
    /// Sum of the value(s)
    pub fn total(&self) -> u64 {
        match self {
            FieldValue::Scalar(v) => *v,
            FieldValue::List(values) => values.iter().sum()
        }
    }

    /// Sum of everything after the first (reference) entry; scalars carry no per-allele breakdown
    pub fn alt_total(&self) -> u64 {
        match self {
            FieldValue::Scalar(_v) => 0,
            FieldValue::List(values) => values.iter().skip(1).sum()
        }
    }
}

/// The per-sample genotype block of a record
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleData {
    /// Decoded GT, if present
    genotype: Option<Genotype>,
    /// Numeric FORMAT fields; a key mapping to None was present but null ('.')
    fields: HashMap<String, Option<FieldValue>>
}

impl SampleData {
    pub fn new(genotype: Option<Genotype>) -> Self {
        Self {
            genotype,
            fields: Default::default()
        }
    }

    /// Builder-style setter for a FORMAT field
    pub fn with_field(mut self, key: &str, value: Option<FieldValue>) -> Self {
        self.insert_field(key, value);
        self
    }

    pub fn insert_field(&mut self, key: &str, value: Option<FieldValue>) {
        self.fields.insert(key.to_string(), value);
    }

    /// Returns the field only if it is both present and non-null
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).and_then(|v| v.as_ref())
    }

    pub fn genotype(&self) -> Option<&Genotype> {
        self.genotype.as_ref()
    }
}

/// A variant record reduced to what the profiling needs.
/// Produced by a `VariantSource`, consumed read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantRecord {
    /// Chromosome name
    chrom: String,
    /// The POS column, 1-based
    position: u64,
    /// REF allele
    reference: String,
    /// ALT alleles in file order
    alternates: Vec<String>,
    /// Numeric INFO fields by key, individual entries are None when written as '.'
    info_values: HashMap<String, Vec<Option<f64>>>,
    /// Raw annotation entries (one per transcript/allele combination), still pipe-delimited
    annotations: Vec<String>,
    /// One entry per sample in the source, None if the sample has no genotype block
    samples: Vec<Option<SampleData>>
}

impl VariantRecord {
    /// Constructor with the core columns
    /// # Arguments
    /// * `chrom` - chromosome name
    /// * `position` - 1-based POS
    /// * `reference` - REF allele
    /// * `alternates` - ALT alleles
    pub fn new(chrom: String, position: u64, reference: String, alternates: Vec<String>) -> Self {
        Self {
            chrom,
            position,
            reference,
            alternates,
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn with_annotations(mut self, annotations: Vec<String>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_info_values(mut self, key: &str, values: Vec<Option<f64>>) -> Self {
        self.info_values.insert(key.to_string(), values);
        self
    }

    pub fn with_sample(mut self, sample: Option<SampleData>) -> Self {
        self.samples.push(sample);
        self
    }

    /// Numeric INFO values for a key, None if the key is absent from the record
    pub fn info_values(&self, key: &str) -> Option<&[Option<f64>]> {
        self.info_values.get(key).map(|v| v.as_slice())
    }

    /// Genotype block for the sample at `index`
    pub fn sample(&self, index: usize) -> Option<&SampleData> {
        self.samples.get(index).and_then(|s| s.as_ref())
    }

    /// Resolves the ALT sequence that a sample's genotype calls.
    /// Returns None if there is no genotype, no non-reference allele, or the index is out of range.
    pub fn called_allele(&self, sample_index: usize) -> Option<&str> {
        let alt_index = self.sample(sample_index)?
            .genotype()?
            .called_alt_index()?;
        self.alternates.get(alt_index - 1).map(|a| a.as_str())
    }

    // getters
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genotype() {
        let gt = Genotype::from_str("0/1").unwrap();
        assert_eq!(gt.alleles(), &[Some(0), Some(1)]);
        assert!(!gt.is_phased());
        assert_eq!(gt.called_alt_index(), Some(1));

        let gt = Genotype::from_str("2|0").unwrap();
        assert!(gt.is_phased());
        assert_eq!(gt.called_alt_index(), Some(2));

        let gt = Genotype::from_str("1/2").unwrap();
        assert_eq!(gt.called_alt_index(), Some(2));

        assert_eq!(Genotype::from_str("0/0").unwrap().called_alt_index(), None);
        assert_eq!(Genotype::from_str("./.").unwrap().called_alt_index(), None);
        assert_eq!(Genotype::from_str("1").unwrap().called_alt_index(), Some(1));
    }

    #[test]
    fn test_parse_genotype_errors() {
        assert_eq!(Genotype::from_str(""), Err(GenotypeError::Empty));
        assert!(matches!(Genotype::from_str("0/x"), Err(GenotypeError::InvalidAllele { .. })));
    }

    #[test]
    fn test_field_values() {
        assert_eq!(FieldValue::Scalar(12).total(), 12);
        assert_eq!(FieldValue::Scalar(12).alt_total(), 0);
        assert_eq!(FieldValue::List(vec![5, 15]).total(), 20);
        assert_eq!(FieldValue::List(vec![5, 15, 2]).alt_total(), 17);
        assert_eq!(FieldValue::List(vec![]).total(), 0);
    }

    #[test]
    fn test_sample_fields() {
        let sample = SampleData::new(None)
            .with_field("AD", Some(FieldValue::List(vec![3, 4])))
            .with_field("DP", None);
        assert_eq!(sample.field("AD"), Some(&FieldValue::List(vec![3, 4])));
        assert_eq!(sample.field("DP"), None);
        assert_eq!(sample.field("DPR"), None);
    }

    #[test]
    fn test_called_allele() {
        let record = VariantRecord::new("chr1".to_string(), 100, "A".to_string(), vec!["C".to_string(), "AGT".to_string()])
            .with_sample(Some(SampleData::new(Some(Genotype::from_str("0/2").unwrap()))))
            .with_sample(Some(SampleData::new(Some(Genotype::from_str("0/0").unwrap()))))
            .with_sample(None)
            .with_sample(Some(SampleData::new(Some(Genotype::from_str("0/3").unwrap()))));
        assert_eq!(record.num_samples(), 4);
        assert_eq!(record.called_allele(0), Some("AGT"));
        assert_eq!(record.called_allele(1), None);
        assert_eq!(record.called_allele(2), None);
        assert_eq!(record.called_allele(3), None);
        assert_eq!(record.called_allele(4), None);
    }
}
