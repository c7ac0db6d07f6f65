
use anyhow::bail;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::cli::profile::{dedup_vcf_files, find_vcf_files};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct IndexSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    driver_profile_version: String,

    /// Directory of VCF files (*.vcf, *.vcf.gz)
    #[clap(short = 'd')]
    #[clap(long = "vcf-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vcf_dir: Option<PathBuf>,

    /// VCF file, can be specified multiple times
    #[clap(short = 'i')]
    #[clap(long = "vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub vcf_filenames: Vec<PathBuf>,

    /// Number of threads to use
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

pub fn check_index_settings(mut settings: IndexSettings) -> anyhow::Result<IndexSettings> {
    // hard code the version in
    settings.driver_profile_version = FULL_VERSION.clone();
    info!("driver-profile version: {:?}", &settings.driver_profile_version);
    info!("Sub-command: index");
    info!("Inputs:");

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

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
