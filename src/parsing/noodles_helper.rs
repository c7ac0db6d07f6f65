use anyhow::{Context, anyhow};
use log::{debug, trace, warn};
use noodles::core::{Position, Region};
use noodles::vcf;
use noodles::vcf::variant::record::samples::Sample as LazySample;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use noodles::vcf::variant::record::samples::series::Value as LazyValue;
use noodles::vcf::variant::record::samples::series::value::Array as LazyArray;
use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;
use noodles::vcf::variant::record_buf::info::field::value::Array as InfoArray;
use noodles::vcf::variant::record_buf::samples::sample::Value as SampleValue;
use noodles::vcf::variant::record_buf::samples::sample::value::Array as SampleArray;
use noodles_util::variant::io::IndexedReader as VcfReader;
use noodles_util::variant::io::indexed_reader::Builder as VcfBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::data_types::variant_record::{FieldValue, Genotype, SampleData, VariantRecord};
use crate::parsing::variant_source::VariantSource;

/// Which parts of each record to keep when converting out of noodles
#[derive(Clone, Debug, Default)]
pub struct RecordFields {
    /// INFO key holding the functional annotations, e.g. "ANN"
    annotation_key: String,
    /// Numeric INFO keys to keep (population and cohort frequencies)
    info_keys: Vec<String>,
    /// Integer FORMAT keys to keep (depth and allele support)
    format_keys: Vec<String>
}

impl RecordFields {
    pub fn new(annotation_key: String, info_keys: Vec<String>, format_keys: Vec<String>) -> Self {
        Self { annotation_key, info_keys, format_keys }
    }
}

/// A bgzip + tabix (or CSI) indexed VCF file opened for region queries
pub struct IndexedVcfSource {
    /// Path, kept for messages
    filename: PathBuf,
    /// The indexed reader
    vcf_reader: VcfReader<noodles::bgzf::Reader<File>>,
    /// Pre-loaded header
    vcf_header: vcf::Header,
    /// Sample names from the header
    sample_names: Vec<String>,
    /// What to extract from each record
    fields: RecordFields
}

impl IndexedVcfSource {
    /// Opens the VCF and its index and reads the header.
    /// # Arguments
    /// * `vcf_fn` - the indexed VCF file
    /// * `fields` - the INFO/FORMAT keys to retain
    pub fn new(vcf_fn: &Path, fields: RecordFields) -> anyhow::Result<Self> {
        let mut vcf_reader = VcfBuilder::default()
            .build_from_path(vcf_fn)
            .with_context(|| format!("Error while opening {vcf_fn:?} (or associated index):"))?;

        let vcf_header = vcf_reader.read_header()
            .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

        let sample_names: Vec<String> = vcf_header.sample_names().iter().cloned().collect();
        if !vcf_header.infos().contains_key(fields.annotation_key.as_str()) {
            warn!("INFO field {:?} is not declared in the header of {vcf_fn:?}", fields.annotation_key);
        }

        Ok(Self {
            filename: vcf_fn.to_path_buf(),
            vcf_reader,
            vcf_header,
            sample_names,
            fields
        })
    }
}

impl VariantSource for IndexedVcfSource {
    fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    fn query(&mut self, chrom: &str, start: u64, end: u64) -> anyhow::Result<Option<Vec<VariantRecord>>> {
        let start_pos = Position::try_from(start as usize)?;
        let end_pos = Position::try_from(end as usize)?;
        let region = Region::new(chrom, start_pos..=end_pos); // Position here is 1-based

        let vcf_header = &self.vcf_header;
        let query = match self.vcf_reader.query(vcf_header, &region) {
            Ok(q) => q,
            Err(e) => {
                warn!("Unable to query {region} in {:?}: {e}", self.filename);
                return Ok(None);
            }
        };

        let mut ret = vec![];
        for result in query {
            // only a failure to read the file itself stops the run
            let record: Box<dyn vcf::variant::Record> = result
                .with_context(|| format!("Error while reading {region} in {:?}:", self.filename))?;
            let converted = match vcf::variant::RecordBuf::try_from_variant_record(vcf_header, record.as_ref()) {
                Ok(record_buf) => convert_record(&record_buf, &self.sample_names, &self.fields),
                Err(e) => {
                    debug!("Decoding samples one at a time in {region} of {:?}: {e}", self.filename);
                    convert_record_by_sample(vcf_header, record.as_ref(), &self.sample_names, &self.fields)
                }
            };
            match converted {
                Ok(c) => {
                    trace!("\tFound {}:{} {} {:?}", c.chrom(), c.position(), c.reference(), c.alternates());
                    ret.push(c);
                },
                Err(e) => warn!("Skipping malformed record in {region} of {:?}: {e:#}", self.filename)
            }
        }
        Ok(Some(ret))
    }

    fn label(&self) -> String {
        format!("{:?}", self.filename)
    }
}

/// Presents only the site columns of a record, so they can still be decoded when a sample column cannot
struct SiteColumns<'r> {
    record: &'r dyn vcf::variant::Record,
    no_samples: vcf::variant::record_buf::Samples
}

impl<'r> SiteColumns<'r> {
    fn new(record: &'r dyn vcf::variant::Record) -> Self {
        Self {
            record,
            no_samples: Default::default()
        }
    }
}

impl vcf::variant::Record for SiteColumns<'_> {
    fn reference_sequence_name<'a, 'h: 'a>(&'a self, header: &'h vcf::Header) -> std::io::Result<&'a str> {
        self.record.reference_sequence_name(header)
    }

    fn variant_start(&self) -> Option<std::io::Result<Position>> {
        self.record.variant_start()
    }

    fn ids(&self) -> Box<dyn vcf::variant::record::Ids + '_> {
        self.record.ids()
    }

    fn reference_bases(&self) -> Box<dyn vcf::variant::record::ReferenceBases + '_> {
        self.record.reference_bases()
    }

    fn alternate_bases(&self) -> Box<dyn vcf::variant::record::AlternateBases + '_> {
        self.record.alternate_bases()
    }

    fn quality_score(&self) -> Option<std::io::Result<f32>> {
        self.record.quality_score()
    }

    fn filters(&self) -> Box<dyn vcf::variant::record::Filters + '_> {
        self.record.filters()
    }

    fn info(&self) -> Box<dyn vcf::variant::record::Info + '_> {
        self.record.info()
    }

    fn samples(&self) -> std::io::Result<Box<dyn vcf::variant::record::Samples + '_>> {
        Ok(Box::new(&self.no_samples))
    }
}

/// Converts a decoded record into our reduced representation
/// # Arguments
/// * `record` - the decoded record
/// * `sample_names` - the samples declared in the header
/// * `fields` - which INFO/FORMAT keys to keep
fn convert_record(record: &vcf::variant::RecordBuf, sample_names: &[String], fields: &RecordFields) -> anyhow::Result<VariantRecord> {
    let mut variant_record = convert_site(record, fields)?;

    let all_samples = record.samples();
    for (sample_index, sample_name) in sample_names.iter().enumerate() {
        let sample_data = all_samples.get_index(sample_index)
            .and_then(|sample| {
                let genotype = match sample.get(vcf_key::GENOTYPE) {
                    Some(Some(gt)) => match parse_genotype(gt) {
                        Ok(g) => g,
                        Err(e) => {
                            warn!("{}:{} {sample_name} has no usable genotype data: {e:#}", variant_record.chrom(), variant_record.position());
                            return None;
                        }
                    },
                    _ => None
                };
                let mut sample_data = SampleData::new(genotype);
                for key in fields.format_keys.iter() {
                    if let Some(opt_value) = sample.get(key.as_str()) {
                        sample_data.insert_field(key, opt_value.and_then(parse_sample_integers));
                    }
                }
                Some(sample_data)
            });
        variant_record = variant_record.with_sample(sample_data);
    }

    Ok(variant_record)
}

/// Converts a record whose samples could not all be decoded together.
/// Each sample is read on its own, and a sample with an unreadable GT or FORMAT field gets no genotype block.
/// # Arguments
/// * `header` - the VCF header
/// * `record` - the raw record
/// * `sample_names` - the samples declared in the header
/// * `fields` - which INFO/FORMAT keys to keep
/// # Errors
/// * if the site columns (CHROM through INFO) cannot be decoded
fn convert_record_by_sample(
    header: &vcf::Header, record: &dyn vcf::variant::Record, sample_names: &[String], fields: &RecordFields
) -> anyhow::Result<VariantRecord> {
    let site = vcf::variant::RecordBuf::try_from_variant_record(header, &SiteColumns::new(record))
        .context("Error while decoding site columns:")?;
    let mut variant_record = convert_site(&site, fields)?;
    let location = format!("{}:{}", variant_record.chrom(), variant_record.position());

    let samples = match record.samples() {
        Ok(s) => s,
        Err(e) => {
            warn!("{location} has unreadable sample columns: {e}");
            for _ in sample_names.iter() {
                variant_record = variant_record.with_sample(None);
            }
            return Ok(variant_record);
        }
    };

    let mut sample_iter = samples.iter();
    for sample_name in sample_names.iter() {
        let sample_data = sample_iter.next()
            .and_then(|sample| match convert_lazy_sample(header, &*sample, fields) {
                Ok(sd) => Some(sd),
                Err(e) => {
                    warn!("{location} {sample_name} has no usable genotype data: {e:#}");
                    None
                }
            });
        variant_record = variant_record.with_sample(sample_data);
    }

    Ok(variant_record)
}

/// Site-level conversion: coordinates, alleles, annotations, and the numeric INFO values we track
fn convert_site(record: &vcf::variant::RecordBuf, fields: &RecordFields) -> anyhow::Result<VariantRecord> {
    let chrom = record.reference_sequence_name().to_string();
    let pos = record.variant_start().ok_or(anyhow!("Missing POS"))?; // 1-based
    let ref_seq = record.reference_bases().to_string();
    let alts = record.alternate_bases().as_ref().to_vec();

    let info = record.info();
    let annotations = match info.get(fields.annotation_key.as_str()) {
        Some(Some(value)) => parse_annotations(value),
        _ => vec![]
    };

    let mut variant_record = VariantRecord::new(chrom, pos.get() as u64, ref_seq, alts)
        .with_annotations(annotations);
    for key in fields.info_keys.iter() {
        if let Some(Some(value)) = info.get(key.as_str()) {
            variant_record = variant_record.with_info_values(key, parse_info_numbers(value));
        }
    }
    Ok(variant_record)
}

/// Reads GT and the integer FORMAT fields of a single undecoded sample
fn convert_lazy_sample(header: &vcf::Header, sample: &dyn LazySample, fields: &RecordFields) -> anyhow::Result<SampleData> {
    let genotype = match sample.get(header, vcf_key::GENOTYPE).transpose().context("unreadable GT")? {
        Some(Some(value)) => parse_lazy_genotype(&value).context("unreadable GT")?,
        _ => None
    };

    let mut sample_data = SampleData::new(genotype);
    for key in fields.format_keys.iter() {
        let opt_value = sample.get(header, key.as_str())
            .transpose()
            .with_context(|| format!("unreadable {key}"))?;
        if let Some(opt_value) = opt_value {
            let value = match opt_value {
                Some(v) => parse_lazy_integers(&v).with_context(|| format!("unreadable {key}"))?,
                None => None
            };
            sample_data.insert_field(key, value);
        }
    }
    Ok(sample_data)
}

/// Splits the annotation INFO value into one entry per annotation
fn parse_annotations(value: &InfoValue) -> Vec<String> {
    match value {
        InfoValue::Array(InfoArray::String(values)) => {
            values.iter()
                .flatten()
                .map(|v| v.to_string())
                .collect()
        },
        // declared as Number=1, so the commas were not split for us
        InfoValue::String(s) => {
            s.split(',')
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .collect()
        },
        _ => vec![]
    }
}

/// Converts a numeric INFO value into a list of floats; anything non-numeric becomes None
fn parse_info_numbers(value: &InfoValue) -> Vec<Option<f64>> {
    match value {
        InfoValue::Float(v) => vec![Some(*v as f64)],
        InfoValue::Integer(v) => vec![Some(*v as f64)],
        InfoValue::Array(InfoArray::Float(values)) => {
            values.iter().map(|v| v.map(|f| f as f64)).collect()
        },
        InfoValue::Array(InfoArray::Integer(values)) => {
            values.iter().map(|v| v.map(|i| i as f64)).collect()
        },
        InfoValue::String(s) => {
            s.split(',').map(|v| v.parse::<f64>().ok()).collect()
        },
        InfoValue::Array(InfoArray::String(values)) => {
            values.iter()
                .map(|v| v.as_ref().and_then(|s| s.parse::<f64>().ok()))
                .collect()
        },
        _ => vec![]
    }
}

/// Converts an integer FORMAT value; missing list entries count as 0 reads, negatives are clamped
fn parse_sample_integers(value: &SampleValue) -> Option<FieldValue> {
    match value {
        SampleValue::Integer(v) => Some(FieldValue::Scalar((*v).max(0) as u64)),
        SampleValue::Array(SampleArray::Integer(values)) => {
            Some(FieldValue::List(
                values.iter()
                    .map(|v| v.unwrap_or(0).max(0) as u64)
                    .collect()
            ))
        },
        _ => None
    }
}

/// Parses the GT field of a sample into allele indices.
/// # Arguments
/// * `gt` - the GT field from the record
fn parse_genotype(gt: &SampleValue) -> anyhow::Result<Option<Genotype>> {
    use vcf::variant::record::samples::series::value::genotype::Phasing;

    match gt {
        SampleValue::Genotype(genotype) => {
            let alleles = genotype.as_ref();
            let phased = alleles.iter().any(|a| a.phasing() == Phasing::Phased);
            let indices = alleles.iter().map(|a| a.position()).collect();
            Ok(Some(Genotype::new(indices, phased)))
        },
        SampleValue::String(s) => {
            let genotype = Genotype::from_str(s)
                .with_context(|| format!("Error while parsing genotype {s:?}:"))?;
            Ok(Some(genotype))
        },
        // it's not a Genotype, treat it as not called
        _ => Ok(None)
    }
}

/// Same as `parse_genotype`, but over an undecoded GT value
fn parse_lazy_genotype(gt: &LazyValue<'_>) -> anyhow::Result<Option<Genotype>> {
    use vcf::variant::record::samples::series::value::genotype::Phasing;

    match gt {
        LazyValue::Genotype(genotype) => {
            let alleles = genotype.iter().collect::<std::io::Result<Vec<(Option<usize>, Phasing)>>>()?;
            let phased = alleles.iter().any(|(_, phasing)| *phasing == Phasing::Phased);
            let indices = alleles.into_iter().map(|(position, _)| position).collect();
            Ok(Some(Genotype::new(indices, phased)))
        },
        LazyValue::String(s) => {
            let genotype = Genotype::from_str(s)
                .with_context(|| format!("Error while parsing genotype {s:?}:"))?;
            Ok(Some(genotype))
        },
        _ => Ok(None)
    }
}

/// Same as `parse_sample_integers`, but over an undecoded value; a bad list entry is an error
fn parse_lazy_integers(value: &LazyValue<'_>) -> std::io::Result<Option<FieldValue>> {
    match value {
        LazyValue::Integer(v) => Ok(Some(FieldValue::Scalar((*v).max(0) as u64))),
        LazyValue::Array(LazyArray::Integer(values)) => {
            let counts = values.iter()
                .map(|v| v.map(|n| n.unwrap_or(0).max(0) as u64))
                .collect::<std::io::Result<Vec<u64>>>()?;
            Ok(Some(FieldValue::List(counts)))
        },
        _ => Ok(None)
    }
}

/// This will open a VCF file and retrieve all sample names in header order
/// # Arguments
/// * `vcf_fn` - the VCF filename to open
pub fn get_vcf_sample_names(vcf_fn: &Path) -> anyhow::Result<Vec<String>> {
    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?} (or associated index):"))?;

    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

    Ok(vcf_header.sample_names().iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::noodles_idx::ensure_indexed;
    use std::io::Write;

    const MISSENSE: &str = "T|missense_variant|MODERATE|KRAS|ENSG00000133703|transcript|ENST00000256078|protein_coding|2/6|c.35G>A|p.Gly12Asp";

    /// Writes a two sample VCF with a single KRAS record, returns the plain file path
    fn write_two_sample_vcf(label: &str, s2_column: &str) -> PathBuf {
        let vcf_fn = std::env::temp_dir().join(format!("driver_profile_source_{label}_{}.vcf", std::process::id()));
        let mut fp = File::create(&vcf_fn).unwrap();
        writeln!(fp, "##fileformat=VCFv4.2").unwrap();
        writeln!(fp, "##contig=<ID=12,length=133275309>").unwrap();
        writeln!(fp, "##INFO=<ID=ANN,Number=.,Type=String,Description=\"Functional annotations\">").unwrap();
        writeln!(fp, "##INFO=<ID=MLEAF,Number=A,Type=Float,Description=\"Maximum likelihood allele frequency\">").unwrap();
        writeln!(fp, "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">").unwrap();
        writeln!(fp, "##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">").unwrap();
        writeln!(fp, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2").unwrap();
        writeln!(fp, "12\t25398284\t.\tC\tT\t.\tPASS\tANN={MISSENSE};MLEAF=0.02\tGT:AD\t0/1:5,15\t{s2_column}").unwrap();
        vcf_fn
    }

    fn query_kras(label: &str, s2_column: &str) -> Vec<VariantRecord> {
        let vcf_fn = write_two_sample_vcf(label, s2_column);
        let gz_fn = ensure_indexed(&vcf_fn, 1).unwrap();
        let fields = RecordFields::new("ANN".to_string(), vec!["MLEAF".to_string()], vec!["AD".to_string()]);
        let mut source = IndexedVcfSource::new(&gz_fn, fields).unwrap();
        assert_eq!(source.sample_names(), &["S1".to_string(), "S2".to_string()]);
        let records = source.query("12", 25357703, 25403890).unwrap().unwrap();

        let mut tbi_fn = gz_fn.clone().into_os_string();
        tbi_fn.push(".tbi");
        for f in [vcf_fn, gz_fn, PathBuf::from(tbi_fn)] {
            std::fs::remove_file(f).unwrap();
        }
        records
    }

    fn assert_s1_called(record: &VariantRecord) {
        let s1 = record.sample(0).unwrap();
        assert_eq!(s1.genotype().unwrap().called_alt_index(), Some(1));
        assert_eq!(s1.field("AD"), Some(&FieldValue::List(vec![5, 15])));
    }

    #[test]
    fn test_indexed_source() {
        let records = query_kras("valid", "0/0:20,0");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.position(), 25398284);
        assert_eq!(record.annotations(), &[MISSENSE.to_string()]);
        assert_eq!(record.info_values("MLEAF"), Some([Some(0.02f32 as f64)].as_slice()));
        assert_s1_called(record);
        assert_eq!(record.sample(1).unwrap().field("AD"), Some(&FieldValue::List(vec![20, 0])));
    }

    #[test]
    fn test_malformed_sample_is_no_data() {
        // bad GT in the second sample
        let records = query_kras("bad_gt", "0/x:20,0");
        assert_eq!(records.len(), 1);
        assert_s1_called(&records[0]);
        assert!(records[0].sample(1).is_none());
        assert_eq!(records[0].annotations().len(), 1);

        // bad AD in the second sample
        let records = query_kras("bad_ad", "0/1:a,b");
        assert_eq!(records.len(), 1);
        assert_s1_called(&records[0]);
        assert!(records[0].sample(1).is_none());
    }

    #[test]
    fn test_parse_annotations() {
        let value = InfoValue::Array(InfoArray::String(vec![
            Some("C|missense_variant|MODERATE|KRAS".to_string()),
            None,
            Some("C|intron_variant|MODIFIER|KRAS".to_string())
        ]));
        assert_eq!(parse_annotations(&value), vec![
            "C|missense_variant|MODERATE|KRAS".to_string(),
            "C|intron_variant|MODIFIER|KRAS".to_string()
        ]);

        let value = InfoValue::String("C|a|b|X,T|c|d|Y".to_string());
        assert_eq!(parse_annotations(&value).len(), 2);
        assert!(parse_annotations(&InfoValue::Flag).is_empty());
    }

    #[test]
    fn test_parse_info_numbers() {
        assert_eq!(parse_info_numbers(&InfoValue::Float(0.5)), vec![Some(0.5)]);
        assert_eq!(parse_info_numbers(&InfoValue::Integer(1)), vec![Some(1.0)]);
        assert_eq!(
            parse_info_numbers(&InfoValue::Array(InfoArray::Float(vec![Some(0.25), None]))),
            vec![Some(0.25), None]
        );
        assert_eq!(
            parse_info_numbers(&InfoValue::String("0.5,.".to_string())),
            vec![Some(0.5), None]
        );
    }

    #[test]
    fn test_parse_sample_integers() {
        assert_eq!(parse_sample_integers(&SampleValue::Integer(12)), Some(FieldValue::Scalar(12)));
        assert_eq!(
            parse_sample_integers(&SampleValue::Array(SampleArray::Integer(vec![Some(3), None, Some(7)]))),
            Some(FieldValue::List(vec![3, 0, 7]))
        );
        assert_eq!(parse_sample_integers(&SampleValue::String("x".to_string())), None);
    }

    #[test]
    fn test_parse_string_genotype() {
        let gt = parse_genotype(&SampleValue::String("0|1".to_string())).unwrap().unwrap();
        assert_eq!(gt.called_alt_index(), Some(1));
        assert!(gt.is_phased());
        assert!(parse_genotype(&SampleValue::String("0/z".to_string())).is_err());
        assert_eq!(parse_genotype(&SampleValue::Integer(1)).unwrap(), None);
    }
}
