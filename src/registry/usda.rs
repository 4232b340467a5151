//! The scene document: one `over` per material under `/RootNode/Looks`.
//!
//! Every texture reference is relative to the directory holding the document.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use super::Material;
use crate::{
    error::Result,
    resolve::Slot,
    utils::{lexical_join, relative_path, write_atomic},
};

pub const HEADER: &str = "#usda 1.0\nover \"RootNode\"\n{\n\tover \"Looks\"\n\t{\n";
pub const FOOTER: &str = "\t}\n}\n";

/// Turns asset paths into references relative to the document directory.
#[derive(Debug, Clone)]
pub struct References {
    asset_base: PathBuf,
    document_dir: PathBuf,
}

impl References {
    /// Both directories must be absolute and normalized.
    pub fn new(asset_base: impl Into<PathBuf>, document_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_base: asset_base.into(),
            document_dir: document_dir.into(),
        }
    }

    /// `./textures/a.dds` when the document sits in the asset base,
    /// `../Data/textures/a.dds` when it sits in a sibling directory.
    pub fn reference(&self, asset: &str) -> String {
        let target = lexical_join(&self.asset_base, asset);
        let rel = relative_path(&self.document_dir, &target);
        if rel.starts_with("../") || Path::new(&rel).is_absolute() {
            rel
        } else {
            format!("./{rel}")
        }
    }
}

/// The block for one material.
pub struct MaterialBlock<'a> {
    pub material: &'a Material,
    pub emissive_intensity: f32,
    pub references: &'a References,
}

impl fmt::Display for MaterialBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.material.slots();
        write!(
            f,
            "\t\tover \"mat_{}\"\n\t\t{{\n\t\t\tover \"Shader\"\n\t\t\t{{\n",
            self.material.hash()
        )?;

        if slots.contains_key(&Slot::Normal) {
            // DirectX-convention normal maps
            f.write_str("\t\t\t\tint inputs:encoding = 2\n")?;
        }
        if slots.contains_key(&Slot::EmissiveMask) {
            f.write_str("\t\t\t\tbool inputs:enable_emission = 1\n")?;
            writeln!(f, "\t\t\t\tfloat inputs:emissive_intensity = {}", self.emissive_intensity)?;
        }

        writeln!(
            f,
            "\t\t\t\tasset inputs:diffuse_texture = @{}@",
            self.references.reference(self.material.diffuse())
        )?;
        for (slot, path) in slots {
            writeln!(
                f,
                "\t\t\t\tasset inputs:{} = @{}@",
                slot.attribute(),
                self.references.reference(path)
            )?;
        }

        f.write_str("\t\t\t}\n\t\t}\n")
    }
}

/// The whole document.
pub struct Document<'a> {
    pub materials: &'a [Material],
    pub emissive_intensity: f32,
    pub references: &'a References,
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HEADER)?;
        for material in self.materials {
            let block = MaterialBlock {
                material,
                emissive_intensity: self.emissive_intensity,
                references: self.references,
            };
            write!(f, "{block}")?;
        }
        f.write_str(FOOTER)
    }
}

pub fn write_document(
    path: impl AsRef<Path>,
    materials: &[Material],
    emissive_intensity: f32,
    references: &References,
) -> Result<()> {
    let text = Document {
        materials,
        emissive_intensity,
        references,
    }
    .to_string();
    write_atomic(path.as_ref(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hash::ContentHash,
        registry::{Candidate, Registry},
        resolve::SlotMap,
    };

    fn material(slots: &[(Slot, &str)]) -> Material {
        let slots: SlotMap = slots.iter().map(|(s, p)| (*s, p.to_string())).collect();
        let mut registry = Registry::new();
        registry.register(
            Candidate {
                diffuse: "textures/a.dds".into(),
                file: PathBuf::from("a.dds"),
                hash: ContentHash(0xABCD),
                slots: slots.clone(),
                companion_hashes: slots.keys().map(|s| (*s, ContentHash(1))).collect(),
            },
            |c| c.slots.clone(),
        );
        registry.materials()[0].clone()
    }

    fn colocated() -> References {
        References::new("/data", "/data")
    }

    fn render(materials: &[Material], emissive_intensity: f32) -> String {
        Document {
            materials,
            emissive_intensity,
            references: &colocated(),
        }
        .to_string()
    }

    #[test]
    fn empty_document_is_header_and_footer() {
        assert_eq!(
            render(&[], 10.0),
            "#usda 1.0\nover \"RootNode\"\n{\n\tover \"Looks\"\n\t{\n\t}\n}\n"
        );
    }

    #[test]
    fn normal_and_roughness_block() {
        let material = material(&[
            (Slot::Normal, "textures/a_n.dds"),
            (Slot::Roughness, "generated/textures/a_r.dds"),
        ]);
        let references = colocated();
        let block = MaterialBlock {
            material: &material,
            emissive_intensity: 10.0,
            references: &references,
        };
        assert_eq!(
            block.to_string(),
            "\t\tover \"mat_000000000000ABCD\"\n\t\t{\n\t\t\tover \"Shader\"\n\t\t\t{\n\
             \t\t\t\tint inputs:encoding = 2\n\
             \t\t\t\tasset inputs:diffuse_texture = @./textures/a.dds@\n\
             \t\t\t\tasset inputs:normalmap_texture = @./textures/a_n.dds@\n\
             \t\t\t\tasset inputs:reflectionroughness_texture = @./generated/textures/a_r.dds@\n\
             \t\t\t}\n\t\t}\n"
        );
    }

    #[test]
    fn emissive_mask_enables_emission() {
        let material = material(&[(Slot::EmissiveMask, "textures/a_g.dds")]);
        let text = render(std::slice::from_ref(&material), 4.5);
        assert!(text.contains("\t\t\t\tbool inputs:enable_emission = 1\n"));
        assert!(text.contains("\t\t\t\tfloat inputs:emissive_intensity = 4.5\n"));
        assert!(!text.contains("inputs:encoding"));
        assert!(text.contains("asset inputs:emissive_mask_texture = @./textures/a_g.dds@"));
    }

    #[test]
    fn intensity_renders_without_trailing_zeros() {
        let material = material(&[(Slot::EmissiveMask, "textures/a_g.dds")]);
        let text = render(&[material], 10.0);
        assert!(text.contains("float inputs:emissive_intensity = 10\n"));
    }

    #[test]
    fn references_follow_the_document_directory() {
        let references = References::new("/work/Data", "/work/out");
        assert_eq!(references.reference("textures/a.dds"), "../Data/textures/a.dds");
        assert_eq!(
            references.reference("../out/generated/textures/a_r.dds"),
            "./generated/textures/a_r.dds"
        );
        assert_eq!(colocated().reference("textures/a.dds"), "./textures/a.dds");
    }
}
