//! Texture sets recorded by glTF meshes.
//!
//! Only the material table of each file is read; buffers and images are never
//! loaded.

use std::{
    fs,
    path::{Path, PathBuf},
};

use gltf::{Gltf, image::Source};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{MeshObservation, Slot, SlotMap};
use crate::{
    error::{Result, TexbindError},
    utils::{asset_path, lexical_join},
};

/// How image URIs inside a mesh map onto corpus asset paths.
#[derive(Debug, Clone)]
pub struct MeshPaths {
    /// Parent of the corpus root; asset paths are relative to it.
    pub asset_base: PathBuf,
    /// Directory name of the corpus root, e.g. `textures`.
    pub root_name: String,
}

impl MeshPaths {
    /// Asset path for `uri` as written in the mesh at `mesh_dir`.
    ///
    /// URIs starting with the corpus root's own name are already asset paths;
    /// everything else is relative to the mesh file.
    pub fn resolve_uri(&self, mesh_dir: &Path, uri: &str) -> Option<String> {
        let decoded = percent_decode(uri);
        let first = decoded
            .split(['/', '\\'])
            .find(|part| !part.is_empty() && *part != ".")?;

        if first.eq_ignore_ascii_case(&self.root_name) {
            let parts: Vec<&str> = decoded
                .split(['/', '\\'])
                .filter(|part| !part.is_empty() && *part != ".")
                .collect();
            return Some(parts.join("/"));
        }

        let joined = lexical_join(mesh_dir, &decoded);
        asset_path(&self.asset_base, &joined)
    }
}

/// Result of scanning a mesh directory.
#[derive(Debug, Default)]
pub struct MeshScan {
    pub observations: Vec<MeshObservation>,
    pub parsed: usize,
    pub failed: usize,
}

/// Observations from every material of one `.gltf`/`.glb` file that has a
/// base colour texture.
pub fn read_mesh(path: impl AsRef<Path>, paths: &MeshPaths) -> Result<Vec<MeshObservation>> {
    let path = path.as_ref();
    let gltf = Gltf::open(path)?;
    let dir = path.parent().unwrap_or(Path::new("."));

    let resolve = |texture: gltf::Texture<'_>| -> Option<String> {
        match texture.source().source() {
            Source::Uri { uri, .. } if !uri.starts_with("data:") => paths.resolve_uri(dir, uri),
            _ => None,
        }
    };

    let mut observations = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let Some(diffuse) = pbr.base_color_texture().and_then(|info| resolve(info.texture())) else {
            continue;
        };

        let mut slots = SlotMap::new();
        if let Some(normal) = material.normal_texture().and_then(|n| resolve(n.texture())) {
            slots.insert(Slot::Normal, normal);
        }
        if let Some(metallic) = pbr
            .metallic_roughness_texture()
            .and_then(|info| resolve(info.texture()))
        {
            slots.insert(Slot::Metallic, metallic);
        }
        if let Some(emissive) = material
            .emissive_texture()
            .and_then(|info| resolve(info.texture()))
        {
            slots.insert(Slot::EmissiveMask, emissive);
        }

        if !slots.is_empty() {
            observations.push(MeshObservation { diffuse, slots });
        }
    }

    debug!("{}: {} texture sets", path.display(), observations.len());
    Ok(observations)
}

/// Parses every mesh under `root` in parallel. A file that fails to parse
/// contributes nothing; observations keep the sorted file order.
pub fn scan_meshes(root: impl AsRef<Path>, paths: &MeshPaths) -> Result<MeshScan> {
    let root = root.as_ref();
    let root = fs::canonicalize(root).map_err(TexbindError::io(root))?;
    if !root.is_dir() {
        return Err(TexbindError::Io {
            path: root,
            source: std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "mesh root is not a directory",
            ),
        });
    }

    let files: Vec<PathBuf> = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_mesh(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    info!("parsing {} meshes under {}", files.len(), root.display());

    let results: Vec<(PathBuf, Result<Vec<MeshObservation>>)> = files
        .into_par_iter()
        .map(|file| {
            let result = read_mesh(&file, paths);
            (file, result)
        })
        .collect();

    let mut scan = MeshScan::default();
    for (file, result) in results {
        match result {
            Ok(observations) => {
                scan.parsed += 1;
                scan.observations.extend(observations);
            }
            Err(err) => {
                warn!("skipping mesh {}: {err}", file.display());
                scan.failed += 1;
            }
        }
    }
    info!(
        "meshes: {} parsed, {} failed, {} texture sets",
        scan.parsed,
        scan.failed,
        scan.observations.len()
    );
    Ok(scan)
}

fn is_mesh(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb"))
}

/// Decodes `%XX` escapes; malformed escapes are kept as written.
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
