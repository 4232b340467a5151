//! Which companion textures belong to which diffuse texture.
//!
//! Two strategies, mesh-derived first: a texture set recorded by the meshes
//! that use the diffuse wins outright; otherwise companions are found by
//! swapping the diffuse's suffix for each slot's conventional suffixes.

pub mod gltf;
mod mesh;
mod slot;

pub use mesh::{
    MergeWarning, MeshObservation, MeshTextureMap, merge_observations, similarity,
};
pub use slot::{Slot, SlotMap};

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    config::GenConfig,
    utils::{normalize_key, split_extension},
};

/// Answers "is this key a texture in the corpus, and how is it spelled".
pub trait AssetLookup {
    fn find(&self, key: &str) -> Option<&str>;
}

impl AssetLookup for HashMap<String, String> {
    fn find(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// Known placeholder textures, by key.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    keys: HashSet<String>,
}

impl Blacklist {
    pub fn new<S: AsRef<str>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: paths.into_iter().map(|p| normalize_key(p.as_ref())).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.keys.contains(&normalize_key(path))
    }
}

/// Per-diffuse exceptions to the suffix convention, by diffuse key.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, BTreeMap<Slot, String>>,
}

impl OverrideTable {
    pub fn new(entries: &HashMap<String, BTreeMap<Slot, String>>) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(path, slots)| (normalize_key(path), slots.clone()))
                .collect(),
        }
    }

    pub fn get(&self, diffuse_key: &str, slot: Slot) -> Option<&str> {
        self.entries
            .get(diffuse_key)
            .and_then(|slots| slots.get(&slot))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ConventionRules {
    pub diffuse_suffix: String,
    pub suffixes: BTreeMap<Slot, Vec<String>>,
    pub overrides: OverrideTable,
    pub blacklist: Blacklist,
}

impl ConventionRules {
    pub fn from_config(config: &GenConfig) -> Self {
        Self {
            diffuse_suffix: config.diffuse_suffix.clone(),
            suffixes: config.suffixes.clone(),
            overrides: OverrideTable::new(&config.overrides),
            blacklist: Blacklist::new(&config.blacklist),
        }
    }

    /// `textures/a_d.dds` -> `textures/a`: the stem companions are built from.
    pub fn companion_stem<'a>(&self, asset_path: &'a str) -> &'a str {
        let (stem, _) = split_extension(asset_path);
        let marker = self.diffuse_suffix.as_str();
        if !marker.is_empty()
            && stem.len() > marker.len()
            && stem.is_char_boundary(stem.len() - marker.len())
            && stem[stem.len() - marker.len()..].eq_ignore_ascii_case(marker)
        {
            &stem[..stem.len() - marker.len()]
        } else {
            stem
        }
    }

    /// Suffixes to try for `slot`; an override replaces the slot's list.
    fn suffixes_for<'a>(&'a self, diffuse_key: &str, slot: Slot) -> Vec<&'a str> {
        match self.overrides.get(diffuse_key, slot) {
            Some(suffix) => vec![suffix],
            None => self
                .suffixes
                .get(&slot)
                .map(|list| list.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        }
    }
}

impl Default for ConventionRules {
    fn default() -> Self {
        Self::from_config(&GenConfig::default())
    }
}

/// Resolves texture sets against a frozen mesh map and the naming rules.
#[derive(Debug, Clone)]
pub struct Resolver {
    rules: ConventionRules,
    mesh: MeshTextureMap,
}

impl Resolver {
    pub fn new(rules: ConventionRules, mesh: MeshTextureMap) -> Self {
        Self { rules, mesh }
    }

    pub fn rules(&self) -> &ConventionRules {
        &self.rules
    }

    pub fn mesh(&self) -> &MeshTextureMap {
        &self.mesh
    }

    /// Companions of the diffuse texture at `asset_path`.
    pub fn resolve(&self, asset_path: &str, corpus: &impl AssetLookup) -> SlotMap {
        let key = normalize_key(asset_path);
        if let Some(slots) = self.mesh.get(&key) {
            return slots
                .iter()
                .map(|(slot, path)| {
                    let spelled = corpus.find(path).unwrap_or(path.as_str());
                    (*slot, spelled.to_string())
                })
                .collect();
        }
        self.resolve_by_convention(asset_path, &key, corpus)
    }

    fn resolve_by_convention(
        &self,
        asset_path: &str,
        key: &str,
        corpus: &impl AssetLookup,
    ) -> SlotMap {
        let stem = self.rules.companion_stem(asset_path);
        let mut slots = SlotMap::new();

        for slot in Slot::ALL {
            for suffix in self.rules.suffixes_for(key, slot) {
                let candidate = normalize_key(&format!("{stem}{suffix}.dds"));
                if candidate == key || self.rules.blacklist.contains(&candidate) {
                    continue;
                }
                if let Some(found) = corpus.find(&candidate) {
                    slots.insert(slot, found.to_string());
                    break;
                }
            }
        }

        slots
    }
}
