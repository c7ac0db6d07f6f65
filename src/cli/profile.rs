
use anyhow::{Context, bail};
use clap::Args;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::vocabulary::DEFAULT_MIN_EFFECT;
use crate::record_filter::{GenotypeLayout, DEFAULT_COHORT_FREQ_FIELD, DEFAULT_POP_FREQ_FIELDS};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct ProfileSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    driver_profile_version: String,

    /// Directory of annotated VCF files (*.vcf, *.vcf.gz)
    #[clap(short = 'd')]
    #[clap(long = "vcf-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vcf_dir: Option<PathBuf>,

    /// Annotated VCF file, can be specified multiple times
    #[clap(short = 'i')]
    #[clap(long = "vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vcf_filenames: Vec<PathBuf>,

    /// Gene list with the columns chrom, start, stop, symbol
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genes")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub gene_list: PathBuf,

    /// Gene metadata table (symbol, chrom, start, stop, canonical_transcript) [default: gene list coordinates]
    #[clap(short = 'm')]
    #[clap(long = "gene-metadata")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub gene_metadata: Option<PathBuf>,

    /// Custom effect vocabulary (term, severity, optional MAF type) [default: built-in SnpEff ranking]
    #[clap(long = "vocabulary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vocabulary: Option<PathBuf>,

    /// Output directory for the mutation tables
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = "./DriverProfile")]
    pub output_folder: PathBuf,

    /// Ignore any cached gene locations and resolve them again
    #[clap(long = "refresh-gene-cache")]
    #[clap(help_heading = Some("Input/Output"))]
    pub refresh_gene_cache: bool,

    /// Minimum read depth to consider a position reliable
    #[clap(long = "min-depth")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Filters"))]
    #[clap(default_value = "10")]
    pub min_depth: u64,

    /// Minimum variant allele fraction
    #[clap(long = "min-vaf")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Filters"))]
    #[clap(default_value = "0.25")]
    pub min_vaf: f64,

    /// Maximum population frequency
    #[clap(long = "max-pop-freq")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Filters"))]
    #[clap(default_value = "0.05")]
    pub max_pop_freq: f64,

    /// Maximum cohort frequency
    #[clap(long = "max-cohort-freq")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Filters"))]
    #[clap(default_value = "0.10")]
    pub max_cohort_freq: f64,

    /// Minimum effect severity for a mutation to be reported
    #[clap(long = "min-effect")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Filters"))]
    #[clap(default_value_t = DEFAULT_MIN_EFFECT)]
    pub min_effect: f64,

    /// Only consider annotations on the canonical transcript of each gene (requires --gene-metadata)
    #[clap(long = "canonical")]
    #[clap(help_heading = Some("Filters"))]
    pub canonical: bool,

    /// Variant caller FORMAT layout for depth and allele support
    #[clap(long = "format")]
    #[clap(value_name = "FORMAT")]
    #[clap(help_heading = Some("VCF fields"))]
    #[clap(value_enum, default_value_t = GenotypeLayout::Gatk)]
    pub layout: GenotypeLayout,

    /// INFO field with a population frequency, can be specified multiple times [default: dbNSFP ExAC and GoNL fields]
    #[clap(long = "pop-freq-field")]
    #[clap(value_name = "KEY")]
    #[clap(help_heading = Some("VCF fields"))]
    pub pop_freq_fields: Vec<String>,

    /// INFO field with the cohort frequency
    #[clap(long = "cohort-freq-field")]
    #[clap(value_name = "KEY")]
    #[clap(help_heading = Some("VCF fields"))]
    #[clap(default_value = DEFAULT_COHORT_FREQ_FIELD)]
    pub cohort_freq_field: String,

    /// INFO field with the functional annotations
    #[clap(long = "annotation-field")]
    #[clap(value_name = "KEY")]
    #[clap(help_heading = Some("VCF fields"))]
    #[clap(default_value = "ANN")]
    pub annotation_field: String,

    /// Number of threads to use, VCF files are processed in parallel
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// True if the file looks like a VCF we can profile
fn is_vcf_filename(filename: &Path) -> bool {
    let name = filename.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.ends_with(".vcf") || name.ends_with(".vcf.gz")
}

/// Lists the VCF files in a directory, sorted by name.
/// When both `x.vcf` and `x.vcf.gz` exist, only the compressed one is kept.
/// # Arguments
/// * `vcf_dir` - the directory to scan
pub fn find_vcf_files(vcf_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut found: BTreeSet<PathBuf> = Default::default();
    let dir_iter = std::fs::read_dir(vcf_dir)
        .with_context(|| format!("Error while reading directory {vcf_dir:?}:"))?;
    for entry in dir_iter {
        let path = entry
            .with_context(|| format!("Error while reading directory {vcf_dir:?}:"))?
            .path();
        if path.is_file() && is_vcf_filename(&path) {
            found.insert(path);
        }
    }

    let ret = found.iter()
        .filter(|path| {
            let mut gz_fn = path.as_os_str().to_owned();
            gz_fn.push(".gz");
            !found.contains(&PathBuf::from(gz_fn))
        })
        .cloned()
        .collect();
    Ok(ret)
}

/// Drops repeated VCF inputs, keeping the first occurrence.
/// A plain file and its compressed copy (`x.vcf` and `x.vcf.gz`) count as the same input.
/// # Arguments
/// * `vcf_filenames` - the inputs, which must already exist
pub fn dedup_vcf_files(vcf_filenames: Vec<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    let mut observed: BTreeSet<PathBuf> = Default::default();
    let mut ret = vec![];
    for vcf_fn in vcf_filenames.into_iter() {
        let full_path = vcf_fn.canonicalize()
            .with_context(|| format!("Error while resolving {vcf_fn:?}:"))?;
        let key = match full_path.to_str().and_then(|s| s.strip_suffix(".gz")) {
            Some(stem) => PathBuf::from(stem),
            None => full_path.clone()
        };
        if observed.insert(key) {
            ret.push(vcf_fn);
        } else {
            warn!("Ignoring repeated VCF input {vcf_fn:?}");
        }
    }
    Ok(ret)
}

pub fn check_profile_settings(mut settings: ProfileSettings) -> anyhow::Result<ProfileSettings> {
    // hard code the version in
    settings.driver_profile_version = FULL_VERSION.clone();
    info!("driver-profile version: {:?}", &settings.driver_profile_version);
    info!("Sub-command: profile");
    info!("Inputs:");

    // gather the VCF inputs
    if let Some(vcf_dir) = settings.vcf_dir.as_deref() {
        check_required_filename(vcf_dir, "VCF directory")?;
        let dir_files = find_vcf_files(vcf_dir)?;
        info!("\tVCF directory: {vcf_dir:?} ({} files)", dir_files.len());
        settings.vcf_filenames.extend(dir_files);
    }
    if settings.vcf_filenames.is_empty() {
        bail!("No VCF files were provided, use --vcf-dir and/or --vcf");
    }
    for vcf_fn in settings.vcf_filenames.iter() {
        check_required_filename(vcf_fn, "VCF")?;
    }
    settings.vcf_filenames = dedup_vcf_files(std::mem::take(&mut settings.vcf_filenames))?;
    for vcf_fn in settings.vcf_filenames.iter() {
        info!("\tVCF: {vcf_fn:?}");
    }

    check_required_filename(&settings.gene_list, "Gene list")?;
    info!("\tGene list: {:?}", &settings.gene_list);
    check_optional_filename(settings.gene_metadata.as_deref(), "Gene metadata")?;
    if let Some(metadata_fn) = settings.gene_metadata.as_deref() {
        info!("\tGene metadata: {metadata_fn:?}");
    } else {
        info!("\tGene metadata: gene list coordinates");
    }
    check_optional_filename(settings.vocabulary.as_deref(), "Vocabulary")?;
    if let Some(vocab_fn) = settings.vocabulary.as_deref() {
        info!("\tVocabulary: {vocab_fn:?}");
    } else {
        info!("\tVocabulary: built-in");
    }

    // outputs
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);

    // filters
    info!("Filters:");
    info!("\tMinimum depth: {}", settings.min_depth);
    info!("\tMinimum VAF: {}", settings.min_vaf);
    info!("\tMaximum population frequency: {}", settings.max_pop_freq);
    info!("\tMaximum cohort frequency: {}", settings.max_cohort_freq);
    info!("\tMinimum effect: {}", settings.min_effect);
    if settings.canonical && settings.gene_metadata.is_none() {
        bail!("--canonical requires --gene-metadata with canonical transcripts");
    }
    info!("\tCanonical transcripts only: {}", if settings.canonical { "ENABLED" } else { "DISABLED" });

    // VCF fields
    if settings.pop_freq_fields.is_empty() {
        settings.pop_freq_fields = DEFAULT_POP_FREQ_FIELDS.iter().map(|f| f.to_string()).collect();
    }
    info!("VCF fields:");
    info!("\tFormat: {} (depth={}, support={})", settings.layout, settings.layout.depth_key(), settings.layout.support_key());
    info!("\tPopulation frequency: {:?}", settings.pop_freq_fields);
    info!("\tCohort frequency: {:?}", settings.cohort_freq_field);
    info!("\tAnnotation: {:?}", settings.annotation_field);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_vcf_files() {
        let vcf_dir = std::env::temp_dir().join(format!("driver_profile_vcf_dir_{}", std::process::id()));
        std::fs::create_dir_all(&vcf_dir).unwrap();
        for name in ["b.vcf", "a.vcf", "a.vcf.gz", "a.vcf.gz.tbi", "notes.txt"] {
            std::fs::write(vcf_dir.join(name), "").unwrap();
        }

        let found = find_vcf_files(&vcf_dir).unwrap();
        std::fs::remove_dir_all(&vcf_dir).unwrap();
        assert_eq!(found, vec![vcf_dir.join("a.vcf.gz"), vcf_dir.join("b.vcf")]);
    }

    #[test]
    fn test_canonical_requires_metadata() {
        let gene_list = std::env::temp_dir().join(format!("driver_profile_settings_genes_{}.tsv", std::process::id()));
        std::fs::write(&gene_list, "12\t25357723\t25403870\tKRAS\n").unwrap();
        let settings = ProfileSettings {
            vcf_filenames: vec![gene_list.clone()],
            gene_list: gene_list.clone(),
            canonical: true,
            threads: 0,
            ..Default::default()
        };
        assert!(check_profile_settings(settings.clone()).is_err());

        let checked = check_profile_settings(ProfileSettings { canonical: false, ..settings }).unwrap();
        std::fs::remove_file(&gene_list).unwrap();
        assert_eq!(checked.threads, 1);
        assert_eq!(checked.pop_freq_fields.len(), DEFAULT_POP_FREQ_FIELDS.len());
    }

    #[test]
    fn test_dedup_vcf_files() {
        let vcf_dir = std::env::temp_dir().join(format!("driver_profile_vcf_dedup_{}", std::process::id()));
        std::fs::create_dir_all(&vcf_dir).unwrap();
        for name in ["a.vcf", "a.vcf.gz", "b.vcf"] {
            std::fs::write(vcf_dir.join(name), "").unwrap();
        }

        let inputs = vec![
            vcf_dir.join("a.vcf"),
            vcf_dir.join("b.vcf"),
            vcf_dir.join(".").join("a.vcf"),
            vcf_dir.join("a.vcf.gz")
        ];
        let deduped = dedup_vcf_files(inputs).unwrap();
        assert_eq!(deduped, vec![vcf_dir.join("a.vcf"), vcf_dir.join("b.vcf")]);

        // --vcf plus a --vcf-dir that holds the same file
        let gene_list = vcf_dir.join("genes.tsv");
        std::fs::write(&gene_list, "12\t25357723\t25403870\tKRAS\n").unwrap();
        let settings = ProfileSettings {
            vcf_dir: Some(vcf_dir.clone()),
            vcf_filenames: vec![vcf_dir.join("b.vcf")],
            gene_list,
            ..Default::default()
        };
        let checked = check_profile_settings(settings).unwrap();
        std::fs::remove_dir_all(&vcf_dir).unwrap();
        assert_eq!(checked.vcf_filenames, vec![vcf_dir.join("b.vcf"), vcf_dir.join("a.vcf.gz")]);
    }

    #[test]
    fn test_no_inputs() {
        assert!(check_profile_settings(ProfileSettings::default()).is_err());
    }
}
