//! Secondary maps the corpus does not ship: a reflection/roughness map cut
//! from a normal map's alpha, and an additive emission map blended from the
//! diffuse and its emissive mask.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{
    RgbaImage,
    imageops::{self, FilterType},
};
use tracing::{debug, warn};

use crate::{
    config::GenConfig,
    dds::{TextureAsset, decode_rgba, write_dds},
    error::{Result, TexbindError},
    utils::relative_path,
};

/// Directory under the output directory that receives generated textures.
pub const GENERATED_DIR: &str = "generated";

/// Where a generated texture lives on disk and how the document names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTexture {
    pub file: PathBuf,
    /// Path of `file` relative to the asset base, like every other slot
    /// path. `generated/...` when the output directory is the asset base.
    pub asset: String,
}

#[derive(Debug, Clone)]
pub struct Deriver {
    root: PathBuf,
    asset_base: PathBuf,
    reflection_suffix: String,
    emission_suffix: String,
}

impl Deriver {
    /// Both directories must be absolute and normalized.
    pub fn new(output_dir: impl AsRef<Path>, asset_base: impl AsRef<Path>, config: &GenConfig) -> Self {
        Self {
            root: output_dir.as_ref().join(GENERATED_DIR),
            asset_base: asset_base.as_ref().to_path_buf(),
            reflection_suffix: config.reflection_suffix.clone(),
            emission_suffix: config.emission_suffix.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target for `stem` (a companion stem such as `textures/a`) plus `suffix`.
    pub fn target(&self, stem: &str, suffix: &str) -> GeneratedTexture {
        let file = self.root.join(format!("{stem}{suffix}.dds"));
        let asset = relative_path(&self.asset_base, &file);
        GeneratedTexture { file, asset }
    }

    /// Reflection map for the material whose companions share `stem`.
    /// `None` when the normal map has no usable alpha.
    pub fn reflection(&self, stem: &str, normal: &Path) -> Result<Option<GeneratedTexture>> {
        let target = self.target(stem, &self.reflection_suffix);
        Ok(synthesize_reflection(normal, &target.file)?.then_some(target))
    }

    pub fn emission(&self, stem: &str, diffuse: &Path, mask: &Path) -> Result<GeneratedTexture> {
        let target = self.target(stem, &self.emission_suffix);
        synthesize_emission(diffuse, mask, &target.file)?;
        Ok(target)
    }
}

fn load(path: &Path) -> Result<(TextureAsset, Vec<u8>)> {
    let bytes = fs::read(path).map_err(TexbindError::io(path))?;
    let asset = TextureAsset::parse(path, &bytes)?;
    Ok((asset, bytes))
}

/// Writes the inverted alpha of `normal` as a single-channel texture.
///
/// Returns `false` without writing when the normal map is `DXT1` or carries
/// no alpha channel.
pub fn synthesize_reflection(normal: &Path, output: &Path) -> Result<bool> {
    let (asset, bytes) = load(normal)?;
    if asset.is_dxt1() {
        warn!("{}: DXT1 normal map has no usable alpha", normal.display());
        return Ok(false);
    }
    if !asset.has_alpha() {
        warn!(
            "{}: expected alpha in normal map, found {}",
            normal.display(),
            describe(&asset)
        );
        return Ok(false);
    }

    let image = decode_rgba(&asset, &bytes)?;
    let gloss: Vec<u8> = image.pixels().map(|px| 255 - px[3]).collect();
    write_dds(output, &gloss, image.width(), image.height(), 1)?;
    debug!("wrote {}", output.display());
    Ok(true)
}

/// Writes `diffuse * mask / 255` per channel as an RGBA texture. The mask is
/// resized to the diffuse's dimensions when they differ.
pub fn synthesize_emission(diffuse: &Path, mask: &Path, output: &Path) -> Result<()> {
    let (asset, bytes) = load(diffuse)?;
    let base = decode_rgba(&asset, &bytes)?;
    let (asset, bytes) = load(mask)?;
    let mut mask_image = decode_rgba(&asset, &bytes)?;

    if mask_image.dimensions() != base.dimensions() {
        mask_image = imageops::resize(&mask_image, base.width(), base.height(), FilterType::Triangle);
    }

    let blended = multiply(&base, &mask_image);
    write_dds(output, &blended, base.width(), base.height(), 4)?;
    debug!("wrote {}", output.display());
    Ok(())
}

fn multiply(a: &RgbaImage, b: &RgbaImage) -> Vec<u8> {
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| (x as u16 * y as u16 / 255) as u8)
        .collect()
}

fn describe(asset: &TextureAsset) -> String {
    if asset.format.is_four_cc() {
        asset.four_cc_str()
    } else {
        format!("{}-bit flags {:#x}", asset.format.rgb_bit_count, asset.format.flags)
    }
}
