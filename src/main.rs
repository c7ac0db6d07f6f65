
use indicatif::ParallelProgressIterator;
use log::{LevelFilter, debug, error, info, warn};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use driver_profile::cli::core::{Commands, get_cli};
use driver_profile::cli::index::{IndexSettings, check_index_settings};
use driver_profile::cli::profile::{ProfileSettings, check_profile_settings};
use driver_profile::data_types::vocabulary::Vocabulary;
use driver_profile::effect_resolver::{EffectResolver, TranscriptCache};
use driver_profile::gene_aggregator::GeneAggregator;
use driver_profile::mutation_profiler::MutationProfiler;
use driver_profile::parsing::gene_list::{default_cache_path, gene_list_table, load_gene_list, load_or_resolve_targets};
use driver_profile::parsing::gene_metadata::GeneTable;
use driver_profile::parsing::noodles_helper::{IndexedVcfSource, RecordFields};
use driver_profile::record_filter::{FilterConfigBuilder, RecordFilter};
use driver_profile::report::MutationReport;
use driver_profile::util::json_io::save_json;
use driver_profile::util::progress_bar::get_progress_style;
use driver_profile::writers::noodles_idx::ensure_indexed;
use driver_profile::writers::table::{write_detail_rows, write_table};

const OVERVIEW_FILENAME: &str = "MutationOverview.txt";
const COUNTS_FILENAME: &str = "MutationCounts.txt";
const CHART_FILENAME: &str = "MutationChart.txt";

/// Sets up logging, must be called before the settings are checked
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Builds the global rayon pool or exits
fn init_thread_pool(threads: usize) {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };
}

/// Compresses and indexes any inputs that need it, returning the indexed paths
fn prepare_vcfs(vcf_filenames: &[PathBuf], threads: usize) -> Vec<PathBuf> {
    let style = get_progress_style("VCFs");
    let results: Vec<anyhow::Result<PathBuf>> = vcf_filenames.par_iter()
        .map(|vcf_fn| ensure_indexed(vcf_fn, threads))
        .progress_with_style(style)
        .collect();

    let mut ret = vec![];
    for result in results.into_iter() {
        match result {
            Ok(gz_fn) => ret.push(gz_fn),
            Err(e) => {
                error!("Error while preparing VCF: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }
    }
    ret
}

fn run_profile(settings: ProfileSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_profile_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    init_thread_pool(settings.threads);

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // save the CLI options
    let cli_json = settings.output_folder.join("cli_settings.json");
    info!("Saving CLI options to {cli_json:?}...");
    if let Err(e) = save_json(&settings, &cli_json) {
        error!("Error while saving CLI options: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    // load the vocabulary
    let vocabulary = match settings.vocabulary.as_deref() {
        Some(vocab_fn) => {
            info!("Loading vocabulary from {vocab_fn:?}...");
            match Vocabulary::from_tsv(vocab_fn, settings.min_effect) {
                Ok(v) => v,
                Err(e) => {
                    error!("Error while loading vocabulary: {e:#}");
                    std::process::exit(exitcode::CONFIG);
                }
            }
        },
        None => Vocabulary::default().with_min_effect(settings.min_effect)
    };
    info!("Vocabulary: {} terms, {} reportable", vocabulary.len(), vocabulary.reportable_terms().len());
    let unmapped = vocabulary.unmapped_reportable_terms();
    if !unmapped.is_empty() {
        warn!("Reportable terms without a mutation type, these cannot be written to the detail chart: {unmapped:?}");
    }

    // load the genes and resolve their locations
    info!("Loading gene list...");
    let gene_entries = match load_gene_list(&settings.gene_list) {
        Ok(g) => g,
        Err(e) => {
            error!("Error while loading gene list: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let gene_table = match settings.gene_metadata.as_deref() {
        Some(metadata_fn) => {
            info!("Loading gene metadata...");
            match GeneTable::from_metadata_tsv(metadata_fn) {
                Ok(gt) => gt,
                Err(e) => {
                    error!("Error while loading gene metadata: {e:#}");
                    std::process::exit(exitcode::IOERR);
                }
            }
        },
        None => gene_list_table(&gene_entries)
    };
    let cache_fn = default_cache_path(&settings.gene_list);
    let gene_targets = match load_or_resolve_targets(&gene_entries, &gene_table, &cache_fn, settings.refresh_gene_cache) {
        Ok(gt) => gt,
        Err(e) => {
            error!("Error while resolving genes: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let num_resolved = gene_targets.iter().filter(|g| g.region().is_some()).count();
    info!("Resolved {num_resolved} / {} genes.", gene_targets.len());

    // make sure every input can be queried
    info!("Checking VCF indices...");
    let vcf_filenames = prepare_vcfs(&settings.vcf_filenames, settings.threads);

    // build our filter configuration
    let filter_config = match FilterConfigBuilder::default()
        .min_depth(settings.min_depth)
        .min_vaf(settings.min_vaf)
        .max_pop_freq(settings.max_pop_freq)
        .max_cohort_freq(settings.max_cohort_freq)
        .layout(settings.layout)
        .pop_freq_fields(settings.pop_freq_fields.clone())
        .cohort_freq_field(settings.cohort_freq_field.clone())
        .build() {
        Ok(fc) => fc,
        Err(e) => {
            error!("Error while building filter config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    // the fields we need out of each record
    let mut info_keys = settings.pop_freq_fields.clone();
    info_keys.push(settings.cohort_freq_field.clone());
    let mut format_keys = vec![settings.layout.depth_key().to_string()];
    if settings.layout.support_key() != settings.layout.depth_key() {
        format_keys.push(settings.layout.support_key().to_string());
    }
    let record_fields = RecordFields::new(settings.annotation_field.clone(), info_keys, format_keys);

    // core components, shared by all workers
    let transcript_cache = TranscriptCache::new(&gene_table);
    let canonical = if settings.canonical { Some(&transcript_cache) } else { None };
    let resolver = EffectResolver::new(&vocabulary, canonical);
    let profiler = MutationProfiler::new(
        RecordFilter::new(&filter_config),
        &resolver,
        GeneAggregator::new(&vocabulary)
    );

    // each VCF is an independent problem
    let style = get_progress_style("VCFs");
    info!("Profiling {} VCF files...", vcf_filenames.len());
    let all_results: Vec<anyhow::Result<MutationReport>> = vcf_filenames.par_iter()
        .map(|vcf_fn| {
            debug!("Opening {vcf_fn:?}...");
            let mut source = IndexedVcfSource::new(vcf_fn, record_fields.clone())?;
            profiler.profile_source(&mut source, &gene_targets)
        })
        .progress_with_style(style)
        .collect();

    // merge in input order
    let gene_names: Vec<String> = gene_targets.iter().map(|g| g.symbol().to_string()).collect();
    let mut full_report = MutationReport::new(gene_names);
    for (vcf_fn, result) in vcf_filenames.iter().zip(all_results.into_iter()) {
        let report = match result {
            Ok(r) => r,
            Err(e) => {
                error!("Error while profiling {vcf_fn:?}: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        };
        if let Err(e) = full_report.merge(report) {
            error!("Error while merging results from {vcf_fn:?}: {e:#}");
            std::process::exit(exitcode::SOFTWARE);
        }
    }
    info!("Profiled {} samples.", full_report.num_samples());

    let unknown_terms = resolver.unknown_terms();
    if !unknown_terms.is_empty() {
        warn!("{} unrecognized effect terms were ignored: {unknown_terms:?}", unknown_terms.len());
    }
    if settings.canonical {
        debug!("Canonical transcripts resolved for {} genes", transcript_cache.len());
    }

    // now write things
    let overview_fn = settings.output_folder.join(OVERVIEW_FILENAME);
    info!("Saving mutation overview to {overview_fn:?}...");
    if let Err(e) = write_table(&full_report.effect_table(), &overview_fn) {
        error!("Error while saving mutation overview: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let counts_fn = settings.output_folder.join(COUNTS_FILENAME);
    info!("Saving mutation counts to {counts_fn:?}...");
    if let Err(e) = write_table(&full_report.count_table(), &counts_fn) {
        error!("Error while saving mutation counts: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let detail_rows = match full_report.detail_rows(&vocabulary) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Error while building mutation chart: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    let chart_fn = settings.output_folder.join(CHART_FILENAME);
    info!("Saving mutation chart with {} rows to {chart_fn:?}...", detail_rows.len());
    if let Err(e) = write_detail_rows(&detail_rows, &chart_fn) {
        error!("Error while saving mutation chart: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Profiling completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_index(settings: IndexSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_index_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    init_thread_pool(settings.threads);

    info!("Indexing {} VCF files...", settings.vcf_filenames.len());
    let indexed = prepare_vcfs(&settings.vcf_filenames, 1);
    for gz_fn in indexed.iter() {
        debug!("\t{gz_fn:?}");
    }

    info!("Indexing completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Profile(settings) => {
            run_profile(*settings);
        },
        Commands::Index(settings) => {
            run_index(*settings);
        }
    }

    info!("Process finished successfully.");
}
