/*!
# Mutation profiler
Drives the per-source pipeline: for every gene, query the padded region, run the QC gate on every (position, sample) pair, resolve the effect of passing calls, and aggregate the slots into one result per sample.
*/
use itertools::Itertools;
use log::{debug, trace};

use crate::data_types::gene_region::{GeneTarget, GENE_PADDING};
use crate::data_types::gene_result::{GeneResult, RetainedVariant};
use crate::data_types::annotation::Annotation;
use crate::data_types::variant_record::VariantRecord;
use crate::effect_resolver::EffectResolver;
use crate::gene_aggregator::{EffectSlot, GeneAggregator, GeneTally};
use crate::parsing::variant_source::VariantSource;
use crate::record_filter::RecordFilter;
use crate::report::MutationReport;

/// Bundles the three core stages for one run
pub struct MutationProfiler<'a> {
    /// QC gate
    filter: RecordFilter<'a>,
    /// Worst effect per record
    resolver: &'a EffectResolver<'a>,
    /// Gene-level reduction
    aggregator: GeneAggregator<'a>,
    /// Flanking bases added to each gene query
    padding: u64
}

impl<'a> MutationProfiler<'a> {
    /// Constructor, uses the default gene padding
    pub fn new(filter: RecordFilter<'a>, resolver: &'a EffectResolver<'a>, aggregator: GeneAggregator<'a>) -> Self {
        Self {
            filter,
            resolver,
            aggregator,
            padding: GENE_PADDING
        }
    }

    /// Overrides the flanking padding
    pub fn with_padding(mut self, padding: u64) -> Self {
        self.padding = padding;
        self
    }

    /// Profiles every gene for every sample in a source.
    /// # Arguments
    /// * `source` - the variant source, queried once per resolved gene
    /// * `genes` - the genes of interest, in output order
    /// # Errors
    /// * if the source fails while reading records
    pub fn profile_source(&self, source: &mut dyn VariantSource, genes: &[GeneTarget]) -> anyhow::Result<MutationReport> {
        let sample_names = source.sample_names().to_vec();
        let num_samples = sample_names.len();
        debug!("Profiling {} genes for {num_samples} samples in {}", genes.len(), source.label());

        // gene-major, then transposed into sample-major for the report
        let mut gene_results: Vec<Vec<GeneResult>> = Vec::with_capacity(genes.len());
        for gene in genes.iter() {
            let results = self.profile_gene(source, gene, &sample_names)?;
            gene_results.push(results);
        }

        let gene_names: Vec<String> = genes.iter().map(|g| g.symbol().to_string()).collect();
        let mut report = MutationReport::new(gene_names);
        for (sample_index, sample_name) in sample_names.into_iter().enumerate() {
            let sample_results: Vec<GeneResult> = gene_results.iter_mut()
                .map(|per_sample| std::mem::replace(&mut per_sample[sample_index], GeneResult::not_assessed()))
                .collect();
            report.insert_sample(sample_name, sample_results)?;
        }
        Ok(report)
    }

    /// Profiles one gene for all samples of a source, returning one result per sample.
    /// # Arguments
    /// * `source` - the variant source
    /// * `gene` - the gene of interest
    /// * `sample_names` - the samples in the source, in record order
    fn profile_gene(&self, source: &mut dyn VariantSource, gene: &GeneTarget, sample_names: &[String]) -> anyhow::Result<Vec<GeneResult>> {
        let num_samples = sample_names.len();
        let not_assessed = || vec![GeneResult::not_assessed(); num_samples];
        let region = match gene.region() {
            Some(r) => r,
            None => {
                debug!("{} is unresolved, marking None for all samples", gene.symbol());
                return Ok(not_assessed());
            }
        };

        let (start, end) = region.query_interval(self.padding);
        let records = match source.query(region.chrom(), start, end)? {
            Some(r) => r,
            None => return Ok(not_assessed())
        };
        if records.is_empty() {
            debug!("No records found for {region}, marking None for all samples");
            return Ok(not_assessed());
        }

        let mut tallies: Vec<GeneTally> = vec![GeneTally::default(); num_samples];
        let mut annotated_positions: u64 = 0;
        for record in records.iter() {
            if record.annotations().is_empty() {
                trace!("\t{}:{} has no annotations, skipping", record.chrom(), record.position());
                continue;
            }

            let annotates_gene = record.annotations().iter()
                .any(|raw| Annotation::parse(raw).gene_symbol() == gene.symbol());
            if !annotates_gene {
                continue;
            }
            annotated_positions += 1;

            for (sample_index, tally) in tallies.iter_mut().enumerate() {
                if let Some(slot) = self.evaluate_position(record, sample_index) {
                    tally.push(slot);
                }
            }
        }

        let mut results: Vec<GeneResult> = Vec::with_capacity(num_samples);
        for (sample_name, tally) in sample_names.iter().zip(tallies) {
            let effects = tally.slots().iter()
                .map(|slot| slot.term().name())
                .join(",");
            let result = self.aggregator.aggregate(tally, annotated_positions);
            debug!(
                "{} {sample_name}: {} count={} positions={annotated_positions} effects=[{effects}]",
                gene.symbol(), result.call(), result.reportable_count()
            );
            results.push(result);
        }
        Ok(results)
    }

    /// Runs one sample at one position through the QC gate and, if it passes, the resolver.
    /// Returns None when the position is not depth qualified for the sample.
    fn evaluate_position(&self, record: &VariantRecord, sample_index: usize) -> Option<EffectSlot> {
        let sample = record.sample(sample_index)?;
        let support = self.filter.config().layout().read_support(sample)?;
        let outcome = self.filter.evaluate_support(record, &support);
        trace!("\t{}:{} sample #{sample_index} {}", record.chrom(), record.position(), outcome.as_ref());

        if !outcome.is_depth_qualified() {
            return None;
        }

        let vocabulary = self.resolver.vocabulary();
        if !outcome.is_pass() {
            return Some(EffectSlot::clean(vocabulary));
        }

        let called_allele = match record.called_allele(sample_index) {
            Some(a) => a,
            // passing reads but no ALT in the genotype
            None => return Some(EffectSlot::clean(vocabulary))
        };

        let effect = self.resolver.resolve(record, called_allele);
        let retained = if vocabulary.is_reportable(effect.name()) && !effect.is_none_sentinel() && !effect.is_clean_sentinel() {
            Some(RetainedVariant::new(record.clone(), effect.name().to_string(), called_allele.to_string(), support.vaf()))
        } else {
            None
        };
        Some(EffectSlot::called(effect, retained))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::gene_region::GeneRegion;
    use crate::data_types::gene_result::GeneCall;
    use crate::data_types::variant_record::{FieldValue, Genotype, SampleData};
    use crate::data_types::vocabulary::Vocabulary;
    use crate::parsing::variant_source::MemoryVariantSource;
    use crate::record_filter::FilterConfig;
    use std::str::FromStr;

    const MISSENSE: &str = "T|missense_variant|MODERATE|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.35G>A|p.Gly12Asp";
    const SYNONYMOUS: &str = "T|synonymous_variant|LOW|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.36G>A|p.Gly12Gly";

    fn sample(gt: &str, ad: Vec<u64>) -> Option<SampleData> {
        Some(
            SampleData::new(Some(Genotype::from_str(gt).unwrap()))
                .with_field("AD", Some(FieldValue::List(ad)))
        )
    }

    fn kras() -> GeneTarget {
        GeneTarget::new(
            "KRAS".to_string(),
            Some(GeneRegion::new("KRAS".to_string(), "12".to_string(), 25357723, 25403870, None))
        )
    }

    fn record(position: u64, annotation: &str) -> VariantRecord {
        VariantRecord::new("12".to_string(), position, "C".to_string(), vec!["T".to_string()])
            .with_annotation(annotation)
            .with_info_values("MLEAF", vec![Some(0.02)])
    }

    fn run(records: Vec<VariantRecord>, samples: &[&str], genes: &[GeneTarget]) -> MutationReport {
        let vocabulary = Vocabulary::default();
        let config = FilterConfig::default();
        let filter = RecordFilter::new(&config);
        let resolver = EffectResolver::new(&vocabulary, None);
        let aggregator = GeneAggregator::new(&vocabulary);
        let profiler = MutationProfiler::new(filter, &resolver, aggregator);

        let sample_names = samples.iter().map(|s| s.to_string()).collect();
        let mut source = MemoryVariantSource::new(sample_names, records);
        profiler.profile_source(&mut source, genes).unwrap()
    }

    #[test]
    fn test_missense_call() {
        // AD=[5,15] passes everything, MLEAF=0.02
        let records = vec![
            record(25398284, MISSENSE).with_sample(sample("0/1", vec![5, 15]))
        ];
        let report = run(records, &["S1"], &[kras()]);
        let result = &report.sample_results("S1").unwrap()[0];
        assert_eq!(result.call(), &GeneCall::Mutated("missense_variant".to_string()));
        assert_eq!(result.reportable_count(), 1);

        let retained = result.retained().unwrap();
        assert_eq!(retained.called_allele(), "T");
        assert_eq!(retained.record().position(), 25398284);
        assert_eq!(retained.vaf(), 0.75);
    }

    #[test]
    fn test_clean_and_none() {
        let records = vec![
            // S1 clean (low VAF), S2 low depth
            record(25398280, SYNONYMOUS)
                .with_sample(sample("0/0", vec![20, 0]))
                .with_sample(sample("0/1", vec![3, 4])),
            // S1 passes but synonymous, S2 has no AD
            record(25398284, SYNONYMOUS)
                .with_sample(sample("0/1", vec![10, 10]))
                .with_sample(Some(SampleData::new(None)))
        ];
        let report = run(records, &["S1", "S2"], &[kras()]);
        assert_eq!(report.sample_results("S1").unwrap()[0].call(), &GeneCall::Clean);
        assert_eq!(report.sample_results("S2").unwrap()[0].call(), &GeneCall::NotAssessed);
    }

    #[test]
    fn test_cohort_frequency_blocks_call() {
        let records = vec![
            record(25398284, MISSENSE)
                .with_info_values("MLEAF", vec![Some(0.5)])
                .with_sample(sample("0/1", vec![5, 15]))
        ];
        let report = run(records, &["S1"], &[kras()]);
        let result = &report.sample_results("S1").unwrap()[0];
        assert_eq!(result.call(), &GeneCall::Clean);
        assert_eq!(result.reportable_count(), 0);
    }

    #[test]
    fn test_other_gene_positions_ignored() {
        let other = "T|missense_variant|MODERATE|OTHER|ENSG0|transcript|ENST0|protein_coding|1/1|c.1A>T|p.Met1Leu";
        let records = vec![
            record(25398284, other).with_sample(sample("0/1", vec![5, 15])),
            VariantRecord::new("12".to_string(), 25398290, "C".to_string(), vec!["T".to_string()])
                .with_sample(sample("0/1", vec![5, 15]))
        ];
        let report = run(records, &["S1"], &[kras()]);
        assert_eq!(report.sample_results("S1").unwrap()[0].call(), &GeneCall::NotAssessed);
    }

    #[test]
    fn test_unresolved_and_unqueryable_genes() {
        let records = vec![
            record(25398284, MISSENSE).with_sample(sample("0/1", vec![5, 15]))
        ];
        let genes = vec![
            GeneTarget::new("MISSING".to_string(), None),
            GeneTarget::new(
                "TP53".to_string(),
                Some(GeneRegion::new("TP53".to_string(), "17".to_string(), 7565097, 7590856, None))
            ),
            kras()
        ];
        let report = run(records, &["S1", "S2"], &genes);
        assert_eq!(report.genes(), &["MISSING".to_string(), "TP53".to_string(), "KRAS".to_string()]);

        let s1 = report.sample_results("S1").unwrap();
        assert_eq!(s1[0].call(), &GeneCall::NotAssessed);
        assert_eq!(s1[1].call(), &GeneCall::NotAssessed);
        assert_eq!(s1[2].call(), &GeneCall::Mutated("missense_variant".to_string()));

        // S2 has no genotype block at all
        let s2 = report.sample_results("S2").unwrap();
        assert_eq!(s2[2].call(), &GeneCall::NotAssessed);
    }

    #[test]
    fn test_indexed_vcf_with_malformed_sample() {
        use crate::parsing::noodles_helper::{IndexedVcfSource, RecordFields};
        use crate::writers::noodles_idx::ensure_indexed;
        use std::io::Write;

        // S1 is a clean missense call, S2 has an unreadable genotype
        let vcf_fn = std::env::temp_dir().join(format!("driver_profile_profiler_{}.vcf", std::process::id()));
        {
            let mut fp = std::fs::File::create(&vcf_fn).unwrap();
            writeln!(fp, "##fileformat=VCFv4.2").unwrap();
            writeln!(fp, "##contig=<ID=12,length=133275309>").unwrap();
            writeln!(fp, "##INFO=<ID=ANN,Number=.,Type=String,Description=\"Functional annotations\">").unwrap();
            writeln!(fp, "##INFO=<ID=MLEAF,Number=A,Type=Float,Description=\"Maximum likelihood allele frequency\">").unwrap();
            writeln!(fp, "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">").unwrap();
            writeln!(fp, "##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">").unwrap();
            writeln!(fp, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2").unwrap();
            writeln!(fp, "12\t25398280\t.\tC\tT\t.\tPASS\tANN={SYNONYMOUS};MLEAF=0.02\tGT:AD\t0/0:20,0\t0/0:20,0").unwrap();
            writeln!(fp, "12\t25398284\t.\tC\tT\t.\tPASS\tANN={MISSENSE};MLEAF=0.02\tGT:AD\t0/1:5,15\t0/x:20,0").unwrap();
        }
        let gz_fn = ensure_indexed(&vcf_fn, 1).unwrap();

        let vocabulary = Vocabulary::default();
        let config = FilterConfig::default();
        let resolver = EffectResolver::new(&vocabulary, None);
        let profiler = MutationProfiler::new(RecordFilter::new(&config), &resolver, GeneAggregator::new(&vocabulary));
        let fields = RecordFields::new("ANN".to_string(), vec!["MLEAF".to_string()], vec!["AD".to_string()]);
        let mut source = IndexedVcfSource::new(&gz_fn, fields).unwrap();
        let report = profiler.profile_source(&mut source, &[kras()]).unwrap();

        let mut tbi_fn = gz_fn.clone().into_os_string();
        tbi_fn.push(".tbi");
        for f in [vcf_fn, gz_fn, std::path::PathBuf::from(tbi_fn)] {
            std::fs::remove_file(f).unwrap();
        }

        let s1 = &report.sample_results("S1").unwrap()[0];
        assert_eq!(s1.call(), &GeneCall::Mutated("missense_variant".to_string()));
        assert_eq!(s1.reportable_count(), 1);

        // the malformed position is left out for S2, the other position still counts as clean
        let s2 = &report.sample_results("S2").unwrap()[0];
        assert_eq!(s2.call(), &GeneCall::Clean);
        assert_eq!(s2.reportable_count(), 0);
    }

    #[test]
    fn test_padding() {
        // 10 bases before the gene start is inside the default padding
        let records = vec![
            record(25357713, MISSENSE).with_sample(sample("0/1", vec![5, 15]))
        ];
        let report = run(records.clone(), &["S1"], &[kras()]);
        assert!(matches!(report.sample_results("S1").unwrap()[0].call(), GeneCall::Mutated(_)));

        let vocabulary = Vocabulary::default();
        let config = FilterConfig::default();
        let resolver = EffectResolver::new(&vocabulary, None);
        let profiler = MutationProfiler::new(RecordFilter::new(&config), &resolver, GeneAggregator::new(&vocabulary))
            .with_padding(0);
        let mut source = MemoryVariantSource::new(vec!["S1".to_string()], records);
        let report = profiler.profile_source(&mut source, &[kras()]).unwrap();
        assert_eq!(report.sample_results("S1").unwrap()[0].call(), &GeneCall::NotAssessed);
    }
}
