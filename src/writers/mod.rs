/*!
# Writers module
Contains the logic for writing the output tables and for preparing indexed inputs.
*/
/// Helper functions for compressing and indexing VCF files
pub mod noodles_idx;
/// Writes the effect, count, and detail tables
pub mod table;
