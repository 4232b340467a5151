//! Generator configuration: naming conventions and per-title exceptions.
//!
//! Everything here is loaded once at startup and handed to the resolver and
//! the registry read-only.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufReader,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TexbindError},
    resolve::Slot,
};

fn default_diffuse_suffix() -> String {
    "_d".to_string()
}

fn default_suffixes() -> BTreeMap<Slot, Vec<String>> {
    Slot::ALL
        .into_iter()
        .map(|slot| {
            let suffixes = slot.default_suffixes().iter().map(|s| s.to_string()).collect();
            (slot, suffixes)
        })
        .collect()
}

fn default_emissive_intensity() -> f32 {
    10.0
}

fn default_reflection_suffix() -> String {
    "_r".to_string()
}

fn default_emission_suffix() -> String {
    "_emit".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenConfig {
    /// Marker some diffuse textures carry before the extension.
    #[serde(default = "default_diffuse_suffix")]
    pub diffuse_suffix: String,
    /// Companion suffixes tried per slot, in priority order. Slots missing
    /// from a loaded file keep their defaults.
    #[serde(default = "default_suffixes")]
    pub suffixes: BTreeMap<Slot, Vec<String>>,
    /// Diffuse asset path -> slot -> suffix used instead of the slot's own.
    #[serde(default)]
    pub overrides: HashMap<String, BTreeMap<Slot, String>>,
    /// Placeholder textures that never count as companions.
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default = "default_emissive_intensity")]
    pub emissive_intensity: f32,
    #[serde(default = "default_reflection_suffix")]
    pub reflection_suffix: String,
    #[serde(default = "default_emission_suffix")]
    pub emission_suffix: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            diffuse_suffix: default_diffuse_suffix(),
            suffixes: default_suffixes(),
            overrides: HashMap::new(),
            blacklist: Vec::new(),
            emissive_intensity: default_emissive_intensity(),
            reflection_suffix: default_reflection_suffix(),
            emission_suffix: default_emission_suffix(),
        }
    }
}

impl GenConfig {
    /// Loads a JSON or YAML (`.yaml`/`.yml`) configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(TexbindError::io(path))?;
        let reader = BufReader::new(file);

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let mut config: GenConfig = if is_yaml {
            serde_yaml::from_reader(reader)?
        } else {
            serde_json::from_reader(reader)?
        };

        for (slot, suffixes) in default_suffixes() {
            config.suffixes.entry(slot).or_insert(suffixes);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let generated = [&self.reflection_suffix, &self.emission_suffix];
        if generated.iter().any(|s| s.is_empty()) {
            return Err(TexbindError::config(
                "generated texture suffixes must not be empty",
            ));
        }
        if !self.emissive_intensity.is_finite() {
            return Err(TexbindError::config("emissive_intensity must be finite"));
        }
        Ok(())
    }
}
