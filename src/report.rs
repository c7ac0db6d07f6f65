/*!
# Report
Collects the finalized per-sample gene results and shapes them into the three output tables:
the effect matrix, the count matrix, and the per-variant detail chart.
*/
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;

use crate::data_types::annotation::Annotation;
use crate::data_types::gene_result::{GeneCall, GeneResult};
use crate::data_types::vocabulary::Vocabulary;

/// Column with the sample names in both matrices
pub const SAMPLE_COLUMN: &str = "Sample";
/// Trailing column of the count matrix
pub const TOTAL_COUNT_COLUMN: &str = "TotMutCount";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ReportError {
    #[error("reportable effect {effect:?} ({gene} in {sample}) has no mutation type mapping")]
    MissingMutationType { gene: String, sample: String, effect: String },
    #[error("sample {sample} has {found} gene results, expected {expected}")]
    GeneCountMismatch { sample: String, found: usize, expected: usize },
    #[error("cannot merge reports with different gene lists")]
    GeneListMismatch
}

/// A simple in-memory table, first row is the header
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>
}

impl TsvTable {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// One row of the lollipop-style detail chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailRow {
    #[serde(rename = "Hugo_Symbol")]
    pub gene: String,
    #[serde(rename = "Sample_ID")]
    pub sample: String,
    #[serde(rename = "Protein_Change")]
    pub protein_change: String,
    #[serde(rename = "Mutation_Type")]
    pub mutation_type: String,
    #[serde(rename = "Chromosome")]
    pub chrom: String,
    #[serde(rename = "Start_Position")]
    pub start: u64,
    #[serde(rename = "End_Position")]
    pub end: u64,
    #[serde(rename = "Reference_Allele")]
    pub reference: String,
    #[serde(rename = "Variant_Allele")]
    pub allele: String,
    #[serde(rename = "VAF")]
    pub vaf: f64
}

/// All finalized results, samples in insertion order and genes in gene-list order
#[derive(Clone, Debug, Default)]
pub struct MutationReport {
    /// Gene symbols, the column order of every table
    genes: Vec<String>,
    /// Sample -> one result per gene, aligned with `genes`
    samples: IndexMap<String, Vec<GeneResult>>
}

impl MutationReport {
    pub fn new(genes: Vec<String>) -> Self {
        Self {
            genes,
            samples: Default::default()
        }
    }

    /// Adds the results for a sample. A sample that is already present is replaced.
    /// # Errors
    /// * if the number of results does not match the number of genes
    pub fn insert_sample(&mut self, sample: String, results: Vec<GeneResult>) -> Result<(), ReportError> {
        if results.len() != self.genes.len() {
            return Err(ReportError::GeneCountMismatch { sample, found: results.len(), expected: self.genes.len() });
        }
        if self.samples.contains_key(&sample) {
            warn!("Sample {sample} was seen in multiple inputs, keeping the last one");
        }
        self.samples.insert(sample, results);
        Ok(())
    }

    /// Absorbs the samples of another report built from the same gene list
    pub fn merge(&mut self, other: MutationReport) -> Result<(), ReportError> {
        if self.genes != other.genes {
            return Err(ReportError::GeneListMismatch);
        }
        for (sample, results) in other.samples.into_iter() {
            self.insert_sample(sample, results)?;
        }
        Ok(())
    }

    /// Builds the effect matrix: `Sample`, then the call for each gene
    pub fn effect_table(&self) -> TsvTable {
        let header = self.header_with(&[]);
        let rows = self.samples.iter()
            .map(|(sample, results)| {
                std::iter::once(sample.clone())
                    .chain(results.iter().map(|r| r.call().to_string()))
                    .collect()
            })
            .collect();
        TsvTable { header, rows }
    }

    /// Builds the count matrix: `Sample`, the reportable count for each gene, and the total
    pub fn count_table(&self) -> TsvTable {
        let header = self.header_with(&[TOTAL_COUNT_COLUMN]);
        let rows = self.samples.iter()
            .map(|(sample, results)| {
                let total: u64 = results.iter().map(|r| r.reportable_count()).sum();
                std::iter::once(sample.clone())
                    .chain(results.iter().map(|r| r.reportable_count().to_string()))
                    .chain(std::iter::once(total.to_string()))
                    .collect()
            })
            .collect();
        TsvTable { header, rows }
    }

    fn header_with(&self, trailing: &[&str]) -> Vec<String> {
        std::iter::once(SAMPLE_COLUMN.to_string())
            .chain(self.genes.iter().cloned())
            .chain(trailing.iter().map(|t| t.to_string()))
            .collect()
    }

    /// Builds one detail row per mutated (sample, gene) with a retained variant.
    /// # Arguments
    /// * `vocabulary` - provides the MAF mutation type names
    /// # Errors
    /// * `ReportError::MissingMutationType` if a reported effect has no mutation type
    pub fn detail_rows(&self, vocabulary: &Vocabulary) -> Result<Vec<DetailRow>, ReportError> {
        let mut rows = vec![];
        for (sample, results) in self.samples.iter() {
            for (gene, result) in self.genes.iter().zip(results.iter()) {
                if !matches!(result.call(), GeneCall::Mutated(_)) {
                    continue;
                }
                let retained = match result.retained() {
                    Some(r) => r,
                    None => continue
                };

                let record = retained.record();
                let effect = retained.effect();
                let allele = retained.called_allele();
                let mutation_type = vocabulary.mutation_type(effect)
                    .ok_or_else(|| ReportError::MissingMutationType {
                        gene: gene.clone(),
                        sample: sample.clone(),
                        effect: effect.to_string()
                    })?
                    .resolve(record.reference(), allele);

                let protein_change = record.annotations().iter()
                    .map(|raw| Annotation::parse(raw))
                    .find(|a| a.allele() == allele && a.has_effect(effect))
                    .map(|a| a.protein_change().to_string())
                    .unwrap_or_default();

                rows.push(DetailRow {
                    gene: gene.clone(),
                    sample: sample.clone(),
                    protein_change,
                    mutation_type: mutation_type.to_string(),
                    chrom: record.chrom().to_string(),
                    start: record.position(),
                    end: record.position() + allele.len() as u64,
                    reference: record.reference().to_string(),
                    allele: allele.to_string(),
                    vaf: (retained.vaf() * 100.0).round() / 100.0
                });
            }
        }
        Ok(rows)
    }

    // getters
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn sample_results(&self, sample: &str) -> Option<&[GeneResult]> {
        self.samples.get(sample).map(|r| r.as_slice())
    }

    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(|s| s.as_str())
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::gene_result::RetainedVariant;
    use crate::data_types::variant_record::VariantRecord;

    fn mutated(effect: &str, reference: &str, allele: &str, annotation: &str, count: u64) -> GeneResult {
        let record = VariantRecord::new("12".to_string(), 25398284, reference.to_string(), vec![allele.to_string()])
            .with_annotation(annotation);
        let retained = RetainedVariant::new(record, effect.to_string(), allele.to_string(), 2.0 / 3.0);
        GeneResult::new(GeneCall::Mutated(effect.to_string()), count, Some(retained))
    }

    fn example_report() -> MutationReport {
        let mut report = MutationReport::new(vec!["KRAS".to_string(), "TP53".to_string()]);
        report.insert_sample("S1".to_string(), vec![
            mutated(
                "missense_variant", "C", "T",
                "T|missense_variant|MODERATE|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.35G>A|p.Gly12Asp",
                2
            ),
            GeneResult::new(GeneCall::Clean, 0, None)
        ]).unwrap();
        report.insert_sample("S2".to_string(), vec![
            GeneResult::not_assessed(),
            GeneResult::new(GeneCall::Clean, 0, None)
        ]).unwrap();
        report
    }

    #[test]
    fn test_effect_and_count_tables() {
        let report = example_report();
        let effects = report.effect_table();
        assert_eq!(effects.header(), &["Sample", "KRAS", "TP53"]);
        assert_eq!(effects.rows(), &[
            vec!["S1".to_string(), "missense_variant".to_string(), "clean".to_string()],
            vec!["S2".to_string(), "None".to_string(), "clean".to_string()]
        ]);

        let counts = report.count_table();
        assert_eq!(counts.header(), &["Sample", "KRAS", "TP53", "TotMutCount"]);
        assert_eq!(counts.rows()[0], vec!["S1", "2", "0", "2"]);
        assert_eq!(counts.rows()[1], vec!["S2", "0", "0", "0"]);
    }

    #[test]
    fn test_detail_rows() {
        let report = example_report();
        let rows = report.detail_rows(&Vocabulary::default()).unwrap();
        assert_eq!(rows, vec![DetailRow {
            gene: "KRAS".to_string(),
            sample: "S1".to_string(),
            protein_change: "p.Gly12Asp".to_string(),
            mutation_type: "Missense_Mutation".to_string(),
            chrom: "12".to_string(),
            start: 25398284,
            end: 25398285,
            reference: "C".to_string(),
            allele: "T".to_string(),
            vaf: 0.67
        }]);
    }

    #[test]
    fn test_frameshift_direction() {
        let mut report = MutationReport::new(vec!["KRAS".to_string()]);
        report.insert_sample("S1".to_string(), vec![mutated(
            "frameshift_variant", "CAG", "C",
            "C|frameshift_variant|HIGH|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.34_35del|p.Gly12fs",
            1
        )]).unwrap();
        let rows = report.detail_rows(&Vocabulary::default()).unwrap();
        assert_eq!(rows[0].mutation_type, "Frame_Shift_Del");
        assert_eq!(rows[0].end, 25398285);
        assert_eq!(rows[0].protein_change, "p.Gly12fs");
    }

    #[test]
    fn test_missing_mutation_type() {
        let mut report = MutationReport::new(vec!["KRAS".to_string()]);
        report.insert_sample("S1".to_string(), vec![mutated(
            "made_up_variant", "C", "T",
            "T|made_up_variant|HIGH|KRAS|||||||",
            1
        )]).unwrap();
        let result = report.detail_rows(&Vocabulary::default());
        assert_eq!(result, Err(ReportError::MissingMutationType {
            gene: "KRAS".to_string(),
            sample: "S1".to_string(),
            effect: "made_up_variant".to_string()
        }));
    }

    #[test]
    fn test_merge() {
        let mut report = example_report();
        let mut other = MutationReport::new(vec!["KRAS".to_string(), "TP53".to_string()]);
        other.insert_sample("S3".to_string(), vec![GeneResult::not_assessed(), GeneResult::not_assessed()]).unwrap();
        other.insert_sample("S1".to_string(), vec![GeneResult::not_assessed(), GeneResult::not_assessed()]).unwrap();
        report.merge(other).unwrap();

        assert_eq!(report.num_samples(), 3);
        assert_eq!(report.sample_names().collect::<Vec<&str>>(), vec!["S1", "S2", "S3"]);
        // the later copy of S1 replaced the first
        assert_eq!(report.sample_results("S1").unwrap()[0].call(), &GeneCall::NotAssessed);

        let bad = MutationReport::new(vec!["KRAS".to_string()]);
        assert_eq!(report.merge(bad), Err(ReportError::GeneListMismatch));
        assert!(matches!(
            report.insert_sample("S4".to_string(), vec![]),
            Err(ReportError::GeneCountMismatch { .. })
        ));
    }
}
