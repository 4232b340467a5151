//! A single pass over the corpus, from directory walk to written document.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{
    Candidate, CompanionHashes, ConflictRecord, CorpusEntry, CorpusIndex, Registry,
    usda::{self, References},
};
use crate::{
    config::GenConfig,
    derive::Deriver,
    error::{Result, TexbindError},
    hash::{HashOverrides, hash_with_override},
    resolve::{
        ConventionRules, MergeWarning, MeshTextureMap, Resolver, Slot, SlotMap, gltf::scan_meshes,
        merge_observations,
    },
    utils::normalize_key,
};

/// Default mesh cache file name, next to the output document.
pub const MESH_CACHE_FILE: &str = "mesh_textures.json";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub textures: PathBuf,
    pub output: PathBuf,
    pub meshes: Option<PathBuf>,
    pub hash_lists: Vec<PathBuf>,
    /// Defaults to [`MESH_CACHE_FILE`] in the output directory.
    pub mesh_cache: Option<PathBuf>,
    pub reuse_mesh_cache: bool,
    pub derive: bool,
    pub config: GenConfig,
}

impl PipelineOptions {
    pub fn new(textures: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            textures: textures.into(),
            output: output.into(),
            meshes: None,
            hash_lists: Vec::new(),
            mesh_cache: None,
            reuse_mesh_cache: true,
            derive: true,
            config: GenConfig::default(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn mesh_cache_path(&self) -> PathBuf {
        self.mesh_cache
            .clone()
            .unwrap_or_else(|| self.output_dir().join(MESH_CACHE_FILE))
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Materials written to the document.
    pub materials: usize,
    /// Companion textures bound across all resolved diffuse textures.
    pub companions: usize,
    /// Derived textures written.
    pub generated: usize,
    pub duplicates: usize,
    /// Textures whose hashing failed.
    pub failed: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub merge_warnings: Vec<MergeWarning>,
}

enum Prepared {
    NoCompanions,
    Failed,
    Ready(Candidate),
}

/// Runs the whole pipeline and writes the document.
pub fn run(options: &PipelineOptions) -> Result<RunReport> {
    options.config.validate()?;
    let overrides = HashOverrides::load_all(&options.hash_lists)?;
    let corpus = CorpusIndex::build(&options.textures)?;
    let document_dir = document_dir(options)?;

    let mut report = RunReport::default();
    let rules = ConventionRules::from_config(&options.config);
    let mesh = load_mesh_map(options, &corpus, &rules, &mut report)?;
    let resolver = Resolver::new(rules, mesh);

    let entries: Vec<(&str, &CorpusEntry)> = corpus.iter().collect();
    let prepared: Vec<Prepared> = entries
        .par_iter()
        .map(|(key, entry)| prepare(key, entry, &resolver, &corpus, &overrides))
        .collect();

    let deriver = Deriver::new(&document_dir, corpus.asset_base(), &options.config);
    let mut registry = Registry::new();
    let mut generated = 0;
    for item in prepared {
        let candidate = match item {
            Prepared::Ready(candidate) => candidate,
            Prepared::Failed => {
                report.failed += 1;
                continue;
            }
            Prepared::NoCompanions => continue,
        };
        report.companions += candidate.slots.len();

        registry.register(candidate, |candidate| {
            if !options.derive {
                return candidate.slots.clone();
            }
            let (slots, made) = derive_slots(candidate, resolver.rules(), &deriver, &corpus);
            generated += made;
            slots
        });
    }

    report.generated = generated;
    report.duplicates = registry.duplicates();
    let (materials, conflicts) = registry.into_parts();
    report.materials = materials.len();
    report.conflicts = conflicts;

    let references = References::new(corpus.asset_base(), &document_dir);
    usda::write_document(
        &options.output,
        &materials,
        options.config.emissive_intensity,
        &references,
    )?;
    info!(
        "wrote {} materials to {} ({} duplicates, {} conflicts, {} failed)",
        report.materials,
        options.output.display(),
        report.duplicates,
        report.conflicts.len(),
        report.failed
    );
    Ok(report)
}

/// Creates the output directory and returns its canonical form, the base of
/// every reference in the document.
fn document_dir(options: &PipelineOptions) -> Result<PathBuf> {
    let dir = options.output_dir();
    fs::create_dir_all(dir).map_err(TexbindError::io(dir))?;
    fs::canonicalize(dir).map_err(TexbindError::io(dir))
}

fn load_mesh_map(
    options: &PipelineOptions,
    corpus: &CorpusIndex,
    rules: &ConventionRules,
    report: &mut RunReport,
) -> Result<MeshTextureMap> {
    let Some(meshes) = &options.meshes else {
        info!("no mesh root given, mesh-derived texture sets disabled");
        return Ok(MeshTextureMap::default());
    };

    let cache = options.mesh_cache_path();
    if options.reuse_mesh_cache && cache.is_file() {
        match MeshTextureMap::load(&cache) {
            Ok(mut map) => {
                let removed = map.retain_allowed(&rules.blacklist);
                if removed > 0 {
                    warn!("{removed} blacklisted textures dropped from mesh cache");
                }
                info!("{} texture sets from mesh cache {}", map.len(), cache.display());
                return Ok(map);
            }
            Err(err) => warn!("ignoring unreadable mesh cache: {err}"),
        }
    }

    let scan = scan_meshes(meshes, &corpus.mesh_paths())?;
    let (map, warnings) = merge_observations(scan.observations, &rules.blacklist);
    report.merge_warnings = warnings;

    if let Err(err) = map.save(&cache) {
        warn!("could not write mesh cache: {err}");
    } else {
        debug!("mesh cache written to {}", cache.display());
    }
    Ok(map)
}

fn prepare(
    key: &str,
    entry: &CorpusEntry,
    resolver: &Resolver,
    corpus: &CorpusIndex,
    overrides: &HashOverrides,
) -> Prepared {
    let resolved = resolver.resolve(&entry.asset, corpus);
    if resolved.is_empty() {
        return Prepared::NoCompanions;
    }

    let hash = match hash_with_override(key, &entry.file, overrides) {
        Ok(hash) => hash,
        Err(err) => {
            warn!("skipping {}: {err}", entry.asset);
            return Prepared::Failed;
        }
    };

    let mut slots = SlotMap::new();
    let mut companion_hashes = CompanionHashes::new();
    for (slot, path) in resolved {
        let file = corpus.file_of(&path);
        match hash_with_override(&normalize_key(&path), &file, overrides) {
            Ok(companion) => {
                companion_hashes.insert(slot, companion);
                slots.insert(slot, path);
            }
            Err(err) => warn!("{}: dropping {slot} companion: {err}", entry.asset),
        }
    }
    if slots.is_empty() {
        warn!("skipping {}: no readable companions", entry.asset);
        return Prepared::Failed;
    }

    Prepared::Ready(Candidate {
        diffuse: entry.asset.clone(),
        file: entry.file.clone(),
        hash,
        slots,
        companion_hashes,
    })
}

/// Final slots for a new material and the number of textures generated.
fn derive_slots(
    candidate: &Candidate,
    rules: &ConventionRules,
    deriver: &Deriver,
    corpus: &CorpusIndex,
) -> (SlotMap, usize) {
    let mut slots = candidate.slots.clone();
    let stem = rules.companion_stem(&candidate.diffuse);
    let mut made = 0;

    if let Some(normal) = slots.get(&Slot::Normal).cloned()
        && !slots.contains_key(&Slot::Roughness)
    {
        match deriver.reflection(stem, &corpus.file_of(&normal)) {
            Ok(Some(target)) => {
                slots.insert(Slot::Roughness, target.asset);
                made += 1;
            }
            Ok(None) => {}
            Err(err) => warn!("{}: reflection map not generated: {err}", candidate.diffuse),
        }
    }

    if let Some(mask) = slots.get(&Slot::EmissiveMask).cloned() {
        match deriver.emission(stem, &candidate.file, &corpus.file_of(&mask)) {
            Ok(target) => {
                slots.insert(Slot::EmissiveMask, target.asset);
                made += 1;
            }
            Err(err) => warn!("{}: emission map not generated: {err}", candidate.diffuse),
        }
    }

    (slots, made)
}

