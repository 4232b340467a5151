use std::path::PathBuf;

use clap::Parser;

use crate::{
    config::GenConfig,
    error::Result,
    logging::init_logging,
    registry::{PipelineOptions, RunReport, run},
};

/// Generates a USDA material overlay for a texture corpus.
#[derive(Parser, Debug, Clone)]
#[command(name = "texbind", version)]
pub struct TexbindArgs {
    /// Texture directory to search through.
    #[arg(short = 't', long)]
    pub textures: PathBuf,

    /// USDA file to write.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Mesh directory to read texture sets from.
    #[arg(short = 'm', long)]
    pub meshes: Option<PathBuf>,

    /// Precomputed hash lists, comma separated. Later lists win.
    #[arg(long, value_delimiter = ',')]
    pub hashes: Vec<PathBuf>,

    /// Rebuild the mesh texture cache even if one exists.
    #[arg(long)]
    pub no_mesh_cache: bool,

    /// Skip generating reflection and emission textures.
    #[arg(long)]
    pub no_derived: bool,

    /// Naming conventions and overrides (JSON or YAML).
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Mesh texture cache location.
    #[arg(long)]
    pub mesh_cache: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl TexbindArgs {
    pub fn options(&self) -> Result<PipelineOptions> {
        let config = match &self.config {
            Some(path) => GenConfig::load(path)?,
            None => GenConfig::default(),
        };

        let mut options = PipelineOptions::new(&self.textures, &self.output);
        options.meshes = self.meshes.clone();
        options.hash_lists = self.hashes.clone();
        options.mesh_cache = self.mesh_cache.clone();
        options.reuse_mesh_cache = !self.no_mesh_cache;
        options.derive = !self.no_derived;
        options.config = config;
        Ok(options)
    }
}

/// Lines printed to stdout after a successful run.
pub fn summary(report: &RunReport) -> String {
    format!(
        "Wrote {} materials\nUsed {} textures\nGenerated {} textures",
        report.materials, report.companions, report.generated
    )
}

pub fn run_cli(args: &TexbindArgs) -> Result<RunReport> {
    init_logging(args.verbose);
    let options = args.options()?;
    let report = run(&options)?;
    println!("{}", summary(&report));
    Ok(report)
}
