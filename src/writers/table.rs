
use std::fs::File;
use std::path::Path;

use crate::report::{DetailRow, TsvTable};

/// Column names of the detail chart, matching the serde names of `DetailRow`
pub const DETAIL_COLUMNS: [&str; 10] = [
    "Hugo_Symbol", "Sample_ID", "Protein_Change", "Mutation_Type", "Chromosome",
    "Start_Position", "End_Position", "Reference_Allele", "Variant_Allele", "VAF"
];

/// Opens a delimited writer; the delimiter is "," if the file ends with .csv and tab otherwise
fn open_writer(filename: &Path) -> csv::Result<csv::Writer<File>> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(filename)
}

/// Writes a matrix table (header + rows) to a file
/// # Arguments
/// * `table` - the table to write
/// * `filename` - the output path (tsv/csv)
pub fn write_table(table: &TsvTable, filename: &Path) -> csv::Result<()> {
    let mut csv_writer = open_writer(filename)?;
    csv_writer.write_record(table.header())?;
    for row in table.rows().iter() {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the detail chart; the header is always present, even with no rows
/// # Arguments
/// * `rows` - the detail rows
/// * `filename` - the output path (tsv/csv)
pub fn write_detail_rows(rows: &[DetailRow], filename: &Path) -> csv::Result<()> {
    let mut csv_writer = open_writer(filename)?;
    csv_writer.write_record(DETAIL_COLUMNS)?;
    for row in rows.iter() {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
