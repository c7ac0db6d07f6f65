/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Picks the worst known effect of a record for a called allele
pub mod effect_resolver;
/// Reduces per-position effects into one call per sample and gene
pub mod gene_aggregator;
/// Runs the filter, resolver, and aggregator over a variant source
pub mod mutation_profiler;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Per-sample QC gate for variant records
pub mod record_filter;
/// Assembles the output tables from the finalized results
pub mod report;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
