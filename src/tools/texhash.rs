use std::path::PathBuf;

use clap::Parser;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    error::Result,
    hash::{ContentHash, hash_file, write_hash_list},
    logging::init_logging,
    registry::CorpusIndex,
};

/// Writes a hash list for every texture under a directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "texhash", version)]
pub struct TexhashArgs {
    /// Texture directory to hash.
    pub textures: PathBuf,

    /// Hash list to write.
    pub output: PathBuf,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Default)]
pub struct HashListReport {
    pub entries: Vec<(ContentHash, String)>,
    pub skipped: usize,
}

/// Hashes every texture in `corpus`, in key order. Unreadable or unsupported
/// files are skipped.
pub fn hash_corpus(corpus: &CorpusIndex) -> HashListReport {
    let results: Vec<_> = corpus
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(_, entry)| (entry, hash_file(&entry.file)))
        .collect();

    let mut report = HashListReport::default();
    for (entry, result) in results {
        match result {
            Ok((_, hash)) => report.entries.push((hash, entry.asset.clone())),
            Err(err) => {
                warn!("skipping {}: {err}", entry.asset);
                report.skipped += 1;
            }
        }
    }
    report
}

pub fn run_cli(args: &TexhashArgs) -> Result<HashListReport> {
    init_logging(args.verbose);
    let corpus = CorpusIndex::build(&args.textures)?;
    let report = hash_corpus(&corpus);
    write_hash_list(&args.output, &report.entries)?;
    info!(
        "wrote {} hashes to {} ({} skipped)",
        report.entries.len(),
        args.output.display(),
        report.skipped
    );
    println!("Hashed {} textures", report.entries.len());
    Ok(report)
}
