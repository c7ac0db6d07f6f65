/// Borrowed view over pipe-delimited effect annotations
pub mod annotation;
/// Gene locations and the gene list targets
pub mod gene_region;
/// Per (sample, gene) classifications and the retained variants for reporting
pub mod gene_result;
/// MAF mutation type naming
pub mod mutation_type;
/// Variant records, genotype blocks, and FORMAT field shapes
pub mod variant_record;
/// Effect term severity ranking
pub mod vocabulary;
