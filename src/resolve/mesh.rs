use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Blacklist, Slot, SlotMap};
use crate::{
    error::{Result, TexbindError},
    utils::{normalize_key, write_atomic_with},
};

/// One mesh's claim about a diffuse texture's companions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshObservation {
    pub diffuse: String,
    pub slots: SlotMap,
}

/// Two meshes disagreed about a slot; `kept` won on similarity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeWarning {
    pub diffuse: String,
    pub slot: Slot,
    pub kept: String,
    pub discarded: String,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: conflicting {} textures, kept {} over {}",
            self.diffuse, self.slot, self.kept, self.discarded
        )
    }
}

/// Diffuse key -> companions, as recorded by meshes.
///
/// Serializes as a plain `{diffuse: {slot: path}}` mapping, which is also the
/// on-disk cache format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshTextureMap {
    entries: BTreeMap<String, SlotMap>,
}

impl MeshTextureMap {
    pub fn get(&self, diffuse_key: &str) -> Option<&SlotMap> {
        self.entries.get(diffuse_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every blacklisted slot, and entries left with none. Returns the
    /// number of slots removed.
    pub fn retain_allowed(&mut self, blacklist: &Blacklist) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, slots| {
            let before = slots.len();
            slots.retain(|_, path| !blacklist.contains(path));
            removed += before - slots.len();
            !slots.is_empty()
        });
        removed
    }

    /// Folds one observation in; returns a warning per conflicting slot.
    pub fn merge(&mut self, observation: MeshObservation, blacklist: &Blacklist) -> Vec<MergeWarning> {
        let diffuse = normalize_key(&observation.diffuse);
        let incoming: SlotMap = observation
            .slots
            .into_iter()
            .map(|(slot, path)| (slot, normalize_key(&path)))
            .filter(|(_, path)| !path.is_empty() && !blacklist.contains(path))
            .collect();
        if incoming.is_empty() {
            return Vec::new();
        }

        let mut warnings = Vec::new();
        let accumulated = self.entries.entry(diffuse.clone()).or_default();
        for (slot, path) in incoming {
            let Some(existing) = accumulated.get_mut(&slot) else {
                accumulated.insert(slot, path);
                continue;
            };
            if *existing == path {
                continue;
            }

            let (kept, discarded) = if similarity(&path, &diffuse) > similarity(existing, &diffuse) {
                let previous = std::mem::replace(existing, path);
                (existing.clone(), previous)
            } else {
                (existing.clone(), path)
            };
            let warning = MergeWarning {
                diffuse: diffuse.clone(),
                slot,
                kept,
                discarded,
            };
            warn!("{warning}");
            warnings.push(warning);
        }
        warnings
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(TexbindError::io(path))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic_with(path.as_ref(), |w| {
            serde_json::to_writer_pretty(&mut *w, self).map_err(std::io::Error::from)
        })
    }
}

/// Merges observations in order into a fresh map.
pub fn merge_observations(
    observations: impl IntoIterator<Item = MeshObservation>,
    blacklist: &Blacklist,
) -> (MeshTextureMap, Vec<MergeWarning>) {
    let mut map = MeshTextureMap::default();
    let mut warnings = Vec::new();
    for observation in observations {
        warnings.extend(map.merge(observation, blacklist));
    }
    (map, warnings)
}

/// Ratcliff/Obershelp similarity of two strings in `[0, 1]`.
///
/// `2 * M / (len(a) + len(b))`, where `M` counts bytes matched by taking the
/// longest common substring (leftmost on ties), then recursing on the pieces
/// to its left and to its right.
pub fn similarity(a: &str, b: &str) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_bytes(a.as_bytes(), b.as_bytes()) as f64 / total as f64
}

fn matching_bytes(a: &[u8], b: &[u8]) -> usize {
    let (i, j, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_bytes(&a[..i], &b[..j]) + matching_bytes(&a[i + len..], &b[j + len..])
}

/// `(start in a, start in b, length)` of the leftmost longest common run.
fn longest_common_substring(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            row[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let len = row[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observe(diffuse: &str, slots: &[(Slot, &str)]) -> MeshObservation {
        MeshObservation {
            diffuse: diffuse.to_string(),
            slots: slots.iter().map(|(s, p)| (*s, p.to_string())).collect(),
        }
    }

    #[test]
    fn similarity_matches_known_ratios() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // "ab" and "d" match: 2 * 3 / 8
        assert_eq!(similarity("abcd", "abxd"), 0.75);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn leftmost_longest_run_is_chosen() {
        assert_eq!(longest_common_substring(b"xabyab", b"ab"), (1, 0, 2));
        assert_eq!(longest_common_substring(b"abc", b"zzabc"), (0, 2, 3));
    }

    #[test]
    fn closer_path_wins_with_one_warning() {
        let diffuse = "textures/armor/helmet.dds";
        let (map, warnings) = merge_observations(
            [
                observe(diffuse, &[(Slot::Metallic, "textures/shared/generic_m.dds")]),
                observe(diffuse, &[(Slot::Metallic, "textures/armor/helmet_m.dds")]),
            ],
            &Blacklist::default(),
        );

        assert_eq!(
            map.get(diffuse).unwrap()[&Slot::Metallic],
            "textures/armor/helmet_m.dds"
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kept, "textures/armor/helmet_m.dds");
        assert_eq!(warnings[0].discarded, "textures/shared/generic_m.dds");
    }

    #[test]
    fn ties_keep_the_existing_path() {
        let (map, warnings) = merge_observations(
            [
                observe("t/d.dds", &[(Slot::Normal, "t/x_n.dds")]),
                observe("t/d.dds", &[(Slot::Normal, "t/y_n.dds")]),
            ],
            &Blacklist::default(),
        );
        assert_eq!(map.get("t/d.dds").unwrap()[&Slot::Normal], "t/x_n.dds");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn new_slots_merge_silently_and_repeats_are_ignored() {
        let (map, warnings) = merge_observations(
            [
                observe("T/D.dds", &[(Slot::Normal, "T/D_n.dds")]),
                observe("t/d.dds", &[(Slot::Normal, "t/d_n.dds"), (Slot::Metallic, "t/d_m.dds")]),
            ],
            &Blacklist::default(),
        );
        let slots = map.get("t/d.dds").unwrap();
        assert_eq!(slots.len(), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn blacklisted_paths_never_enter_the_map() {
        let blacklist = Blacklist::new(["textures/shared/flat_n.dds"]);
        let (map, warnings) = merge_observations(
            [
                observe("t/d.dds", &[(Slot::Normal, "Textures\\Shared\\Flat_N.dds")]),
                observe("t/e.dds", &[(Slot::Normal, "textures/shared/flat_n.dds"), (Slot::Metallic, "t/e_m.dds")]),
            ],
            &blacklist,
        );
        assert!(map.get("t/d.dds").is_none());
        assert_eq!(map.get("t/e.dds").unwrap().len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn retain_allowed_filters_a_loaded_map() {
        let (mut map, _) = merge_observations(
            [
                observe("t/d.dds", &[(Slot::Normal, "t/flat_n.dds")]),
                observe("t/e.dds", &[(Slot::Normal, "t/flat_n.dds"), (Slot::Metallic, "t/e_m.dds")]),
            ],
            &Blacklist::default(),
        );

        let removed = map.retain_allowed(&Blacklist::new(["T\\Flat_N.dds"]));
        assert_eq!(removed, 2);
        assert_eq!(map.len(), 1);
        assert!(map.get("t/d.dds").is_none());
        assert_eq!(map.get("t/e.dds").unwrap()[&Slot::Metallic], "t/e_m.dds");
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/mesh_textures.json");
        let (map, _) = merge_observations(
            [observe("t/d.dds", &[(Slot::EmissiveMask, "t/d_g.dds")])],
            &Blacklist::default(),
        );

        map.save(&path).expect("save cache");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"emissive_mask\": \"t/d_g.dds\""));
        assert_eq!(MeshTextureMap::load(&path).expect("load cache"), map);
    }
}
