/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Loads the gene list and caches the resolved gene locations
pub mod gene_list;
/// Gene location and canonical transcript lookups
pub mod gene_metadata;
/// Helper functions for noodles, including the indexed VCF source
pub mod noodles_helper;
/// The interface for querying variant records by region
pub mod variant_source;
