use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A companion role next to a diffuse texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Normal,
    Metallic,
    EmissiveMask,
    /// Reflection/roughness; normally synthesized from the normal map's alpha.
    Roughness,
}

/// Resolved companions of one diffuse texture, by slot.
pub type SlotMap = BTreeMap<Slot, String>;

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Normal, Slot::Metallic, Slot::EmissiveMask, Slot::Roughness];

    /// Shader input the slot binds to in the scene document.
    pub fn attribute(self) -> &'static str {
        match self {
            Slot::Normal => "normalmap_texture",
            Slot::Metallic => "metallic_texture",
            Slot::EmissiveMask => "emissive_mask_texture",
            Slot::Roughness => "reflectionroughness_texture",
        }
    }

    pub fn default_suffixes(self) -> &'static [&'static str] {
        match self {
            Slot::Normal => &["_n"],
            Slot::Metallic => &["_m", "_em"],
            Slot::EmissiveMask => &["_g"],
            Slot::Roughness => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Normal => "normal",
            Slot::Metallic => "metallic",
            Slot::EmissiveMask => "emissive_mask",
            Slot::Roughness => "roughness",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
