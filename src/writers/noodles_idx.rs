use anyhow::Context;
use log::{debug, info};
use noodles::bgzf;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Appends an extension to a path, e.g. "a.vcf" -> "a.vcf.gz"
fn append_extension(filename: &Path, extension: &str) -> PathBuf {
    let mut new_fn = filename.to_owned().into_os_string();
    new_fn.push(extension);
    PathBuf::from(new_fn)
}

/// Compresses a plain VCF file with BGZF, generating a .gz file next to it.
/// # Arguments
/// * `vcf_fn` - the uncompressed VCF
/// * `threads` - number of compression workers
pub fn bgzip_vcf(vcf_fn: &Path, threads: usize) -> anyhow::Result<PathBuf> {
    let gz_fn = append_extension(vcf_fn, ".gz");
    debug!("Compressing {vcf_fn:?} to {gz_fn:?}...");

    let mut in_file = File::open(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?}:"))?;
    let out_file = File::create(&gz_fn)
        .with_context(|| format!("Error while creating {gz_fn:?}:"))?;

    let w_threads = std::num::NonZeroUsize::new(threads.clamp(1, 4)).unwrap_or(std::num::NonZeroUsize::MIN);
    let mut bgzf_writer = bgzf::io::MultithreadedWriter::with_worker_count(w_threads, out_file);
    std::io::copy(&mut in_file, &mut bgzf_writer)
        .with_context(|| format!("Error while compressing {vcf_fn:?}:"))?;
    bgzf_writer.finish()
        .with_context(|| format!("Error while finishing {gz_fn:?}:"))?;

    Ok(gz_fn)
}

/// Wrapper that indexes a VCF file using noodles indexer, generating a .tbi file.
/// # Arguments
/// * `vcf_fn` - the filename to index
pub fn index_vcf(vcf_fn: &Path) -> anyhow::Result<()> {
    // first, build the index
    let index = noodles::vcf::fs::index(vcf_fn)
        .with_context(|| format!("Error while indexing {vcf_fn:?}:"))?;

    // add the .tbi extension to the filename
    let tbi_fn = append_extension(vcf_fn, ".tbi");

    // write the index out to file
    noodles::tabix::fs::write(&tbi_fn, &index)
        .with_context(|| format!("Error while writing {tbi_fn:?}:"))?;

    Ok(())
}

/// Makes sure a VCF is bgzipped and indexed, doing whatever work is missing.
/// Returns the path of the compressed file.
/// # Arguments
/// * `vcf_fn` - a .vcf or .vcf.gz file
/// * `threads` - number of compression workers
pub fn ensure_indexed(vcf_fn: &Path, threads: usize) -> anyhow::Result<PathBuf> {
    let gz_fn = if vcf_fn.extension().unwrap_or_default() == "gz" {
        vcf_fn.to_path_buf()
    } else {
        let gz_fn = append_extension(vcf_fn, ".gz");
        if gz_fn.exists() {
            debug!("Found existing {gz_fn:?}");
            gz_fn
        } else {
            info!("Compressing {vcf_fn:?}...");
            bgzip_vcf(vcf_fn, threads)?
        }
    };

    let tbi_fn = append_extension(&gz_fn, ".tbi");
    let csi_fn = append_extension(&gz_fn, ".csi");
    if tbi_fn.exists() || csi_fn.exists() {
        debug!("Found existing index for {gz_fn:?}");
    } else {
        info!("Indexing {gz_fn:?}...");
        index_vcf(&gz_fn)?;
    }
    Ok(gz_fn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ensure_indexed() {
        let vcf_fn = std::env::temp_dir().join(format!("driver_profile_index_{}.vcf", std::process::id()));
        {
            let mut fp = File::create(&vcf_fn).unwrap();
            writeln!(fp, "##fileformat=VCFv4.2").unwrap();
            writeln!(fp, "##contig=<ID=12,length=133275309>").unwrap();
            writeln!(fp, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
            writeln!(fp, "12\t25398284\t.\tC\tT\t.\tPASS\t.").unwrap();
        }

        let gz_fn = ensure_indexed(&vcf_fn, 1).unwrap();
        assert_eq!(gz_fn, append_extension(&vcf_fn, ".gz"));
        assert!(gz_fn.exists());
        let tbi_fn = append_extension(&gz_fn, ".tbi");
        assert!(tbi_fn.exists());

        // second call is a no-op
        assert_eq!(ensure_indexed(&vcf_fn, 1).unwrap(), gz_fn);

        for f in [vcf_fn, gz_fn, tbi_fn] {
            std::fs::remove_file(f).unwrap();
        }
    }
}
