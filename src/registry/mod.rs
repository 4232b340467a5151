//! One material per unique diffuse top mip.
//!
//! The first texture registered under a hash defines the material. Later
//! textures with the same hash are duplicates when their companions hash the
//! same, and conflicts otherwise.

pub mod corpus;
pub mod pipeline;
pub mod usda;

pub use corpus::{CorpusEntry, CorpusIndex};
pub use pipeline::{PipelineOptions, RunReport, run};

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::PathBuf,
};

use tracing::{debug, warn};

use crate::{
    hash::ContentHash,
    resolve::{Slot, SlotMap},
};

pub type CompanionHashes = BTreeMap<Slot, ContentHash>;

/// A corpus texture with at least one readable companion, ready to register.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Asset path of the diffuse texture.
    pub diffuse: String,
    pub file: PathBuf,
    pub hash: ContentHash,
    /// Source companions whose hashes could be computed.
    pub slots: SlotMap,
    pub companion_hashes: CompanionHashes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    hash: ContentHash,
    diffuse: String,
    slots: SlotMap,
    sources: SlotMap,
    companion_hashes: CompanionHashes,
}

impl Material {
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn diffuse(&self) -> &str {
        &self.diffuse
    }

    /// Bound slots, generated textures included.
    pub fn slots(&self) -> &SlotMap {
        &self.slots
    }

    /// Companions found in the corpus, before synthesis.
    pub fn sources(&self) -> &SlotMap {
        &self.sources
    }

    pub fn companion_hashes(&self) -> &CompanionHashes {
        &self.companion_hashes
    }
}

/// Same diffuse hash, different companions. The first material is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    pub hash: ContentHash,
    pub kept_diffuse: String,
    pub kept_paths: SlotMap,
    pub kept_hashes: CompanionHashes,
    pub rejected_diffuse: String,
    pub rejected_paths: SlotMap,
    pub rejected_hashes: CompanionHashes,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting hash {}: {} {:?} {:?} != {} {:?} {:?}",
            self.hash,
            self.kept_diffuse,
            self.kept_paths.values().collect::<Vec<_>>(),
            render_hashes(&self.kept_hashes),
            self.rejected_diffuse,
            self.rejected_paths.values().collect::<Vec<_>>(),
            render_hashes(&self.rejected_hashes),
        )
    }
}

fn render_hashes(hashes: &CompanionHashes) -> Vec<String> {
    hashes.values().map(ContentHash::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    Duplicate,
    Conflict,
}

#[derive(Debug, Default)]
pub struct Registry {
    materials: Vec<Material>,
    by_hash: HashMap<ContentHash, usize>,
    conflicts: Vec<ConflictRecord>,
    duplicates: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: ContentHash) -> bool {
        self.by_hash.contains_key(&hash)
    }

    /// Registers `candidate`. `finalize` runs only for a new hash and returns
    /// the slots the material binds, which may add generated textures.
    pub fn register<F>(&mut self, candidate: Candidate, finalize: F) -> Registration
    where
        F: FnOnce(&Candidate) -> SlotMap,
    {
        if let Some(&index) = self.by_hash.get(&candidate.hash) {
            let existing = &self.materials[index];
            if existing.companion_hashes == candidate.companion_hashes {
                debug!("{}: duplicate of {}", candidate.diffuse, existing.diffuse);
                self.duplicates += 1;
                return Registration::Duplicate;
            }

            let record = ConflictRecord {
                hash: candidate.hash,
                kept_diffuse: existing.diffuse.clone(),
                kept_paths: existing.sources.clone(),
                kept_hashes: existing.companion_hashes.clone(),
                rejected_diffuse: candidate.diffuse,
                rejected_paths: candidate.slots,
                rejected_hashes: candidate.companion_hashes,
            };
            warn!("{record}");
            self.conflicts.push(record);
            return Registration::Conflict;
        }

        let slots = finalize(&candidate);
        self.by_hash.insert(candidate.hash, self.materials.len());
        self.materials.push(Material {
            hash: candidate.hash,
            diffuse: candidate.diffuse,
            slots,
            sources: candidate.slots,
            companion_hashes: candidate.companion_hashes,
        });
        Registration::Registered
    }

    /// Materials in registration order.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Material>, Vec<ConflictRecord>) {
        (self.materials, self.conflicts)
    }
}
