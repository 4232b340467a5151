//! Content identity of a texture: XXH3-64 over its top mip only.
//!
//! Re-exported copies of the same texture routinely differ in their generated
//! mip tails and trailing padding, so nothing past the top mip takes part.

mod list;

pub use list::{HashOverrides, write_hash_list};

use std::{fmt, fs::File, path::Path, str::FromStr};

use memmap2::Mmap;
use xxhash_rust::xxh3::xxh3_64;

use crate::{
    dds::{HEADER_LEN, TextureAsset},
    error::{Result, TexbindError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub u64);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(ContentHash)
    }
}

impl ContentHash {
    /// Hashes `[128, 128 + extent)` of `bytes`, clamped to what the file holds.
    pub fn of_top_mip(asset: &TextureAsset, bytes: &[u8]) -> Result<Self> {
        let extent = asset.mip_extent()?;
        let start = HEADER_LEN.min(bytes.len());
        let end = HEADER_LEN.saturating_add(extent).min(bytes.len());
        Ok(ContentHash(xxh3_64(&bytes[start..end])))
    }
}

/// Reads the header of `path` and hashes its top mip.
pub fn hash_file(path: impl AsRef<Path>) -> Result<(TextureAsset, ContentHash)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(TexbindError::io(path))?;
    let len = file.metadata().map_err(TexbindError::io(path))?.len();
    if len < HEADER_LEN as u64 {
        return Err(TexbindError::malformed(
            path,
            format!("file is {len} bytes, shorter than a DDS header"),
        ));
    }

    let map = unsafe { Mmap::map(&file).map_err(TexbindError::io(path))? };
    let asset = TextureAsset::parse(path, &map)?;
    let hash = ContentHash::of_top_mip(&asset, &map)?;
    Ok((asset, hash))
}

/// Looks `key` up in `overrides` first; only hashes the file on a miss.
pub fn hash_with_override(
    key: &str,
    path: impl AsRef<Path>,
    overrides: &HashOverrides,
) -> Result<ContentHash> {
    if let Some(hash) = overrides.get(key) {
        return Ok(hash);
    }
    hash_file(path).map(|(_, hash)| hash)
}
