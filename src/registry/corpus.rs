use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    error::{Result, TexbindError},
    resolve::{AssetLookup, gltf::MeshPaths},
    utils::{asset_path, is_dds, normalize_key},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    /// On-disk spelling relative to the asset base.
    pub asset: String,
    pub file: PathBuf,
}

/// Every `.dds` file under the corpus root, by key.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    root: PathBuf,
    asset_base: PathBuf,
    root_name: String,
    entries: BTreeMap<String, CorpusEntry>,
}

impl CorpusIndex {
    pub fn build(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(TexbindError::io(root))?;
        if !root.is_dir() {
            return Err(TexbindError::Io {
                path: root,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "texture root is not a directory",
                ),
            });
        }

        let asset_base = root.parent().unwrap_or(&root).to_path_buf();
        let root_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut entries: BTreeMap<String, CorpusEntry> = BTreeMap::new();
        for entry in WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() || !is_dds(entry.path()) {
                continue;
            }
            let Some(asset) = asset_path(&asset_base, entry.path()) else {
                warn!("skipping {}: path is not valid UTF-8", entry.path().display());
                continue;
            };

            let key = normalize_key(&asset);
            if let Some(existing) = entries.get(&key) {
                warn!("{asset}: differs from {} only by case, ignored", existing.asset);
                continue;
            }
            entries.insert(
                key,
                CorpusEntry {
                    asset,
                    file: entry.into_path(),
                },
            );
        }

        info!("{} textures under {}", entries.len(), root.display());
        Ok(Self {
            root,
            asset_base,
            root_name,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn asset_base(&self) -> &Path {
        &self.asset_base
    }

    pub fn mesh_paths(&self) -> MeshPaths {
        MeshPaths {
            asset_base: self.asset_base.clone(),
            root_name: self.root_name.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CorpusEntry> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CorpusEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// File behind any spelling of an asset path. Paths outside the index
    /// resolve against the asset base.
    pub fn file_of(&self, asset: &str) -> PathBuf {
        match self.entries.get(&normalize_key(asset)) {
            Some(entry) => entry.file.clone(),
            None => self.asset_base.join(asset),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetLookup for CorpusIndex {
    fn find(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.asset.as_str())
    }
}
