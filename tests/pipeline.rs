use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::Rng;
use texbind::{
    ContentHash, GenConfig, PipelineOptions, Slot, TexbindError,
    dds::{DdsHeader, DdsPixelFormat, TextureAsset},
    resolve::MeshTextureMap,
    run,
};

struct Fixture {
    _dir: tempfile::TempDir,
    textures: PathBuf,
    output: PathBuf,
    base: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let base = dir.path().join("Data");
        let textures = base.join("textures");
        fs::create_dir_all(&textures).unwrap();
        let output = base.join("looks.usda");
        Self {
            base,
            textures,
            output,
            _dir: dir,
        }
    }

    /// Writes a 4x4 RGBA texture at `rel` under the texture root.
    fn texture(&self, rel: &str, pixels: &[u8]) -> PathBuf {
        let path = self.textures.join(rel);
        write_rgba(&path, 4, 4, pixels);
        path
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions::new(&self.textures, &self.output)
    }

    fn out_dir(&self) -> &Path {
        self.output.parent().unwrap()
    }

    fn document(&self) -> String {
        fs::read_to_string(&self.output).expect("document written")
    }
}

fn write_rgba(path: &Path, width: u32, height: u32, pixels: &[u8]) {
    assert_eq!(pixels.len(), (width * height * 4) as usize);
    let header = DdsHeader::new(width, height, width * 4, 1, DdsPixelFormat::rgba8());
    let mut bytes = header.as_bytes().to_vec();
    bytes.extend_from_slice(pixels);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_header_only(path: &Path, width: u32, height: u32) {
    let header = DdsHeader::new(width, height, 0, 1, DdsPixelFormat::rgba8());
    let mut bytes = header.as_bytes().to_vec();
    bytes.extend_from_slice(&[0; 64]);
    fs::write(path, bytes).unwrap();
}

fn random_pixels() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..64).map(|_| rng.r#gen()).collect()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn normal_map_gets_a_generated_reflection_map() {
    let fx = Fixture::new();
    fx.texture("A.dds", &random_pixels());
    let normal: Vec<u8> = (0..64).map(|i| if i % 4 == 3 { 40 } else { 128 }).collect();
    fx.texture("A_n.dds", &normal);

    let report = run(&fx.options()).expect("pipeline run");
    assert_eq!(report.materials, 1);
    assert_eq!(report.companions, 1);
    assert_eq!(report.generated, 1);

    let generated = fx.out_dir().join("generated/textures/A_r.dds");
    let bytes = fs::read(&generated).expect("reflection map written");
    let asset = TextureAsset::parse(&generated, &bytes).unwrap();
    assert_eq!((asset.width, asset.height), (4, 4));
    assert!(bytes[128..128 + 16].iter().all(|&b| b == 215));

    let doc = fx.document();
    assert!(doc.starts_with("#usda 1.0\nover \"RootNode\"\n{\n\tover \"Looks\"\n\t{\n"));
    assert!(doc.ends_with("\t}\n}\n"));
    assert!(doc.contains("\t\t\t\tint inputs:encoding = 2\n"));
    assert!(!doc.contains("enable_emission"));
    assert!(doc.contains("asset inputs:diffuse_texture = @./textures/A.dds@"));
    assert!(doc.contains("asset inputs:normalmap_texture = @./textures/A_n.dds@"));
    assert!(doc.contains("asset inputs:reflectionroughness_texture = @./generated/textures/A_r.dds@"));
}

#[test]
fn identical_top_mips_collapse_into_one_material() {
    let fx = Fixture::new();
    let diffuse = random_pixels();
    let normal = random_pixels();
    fx.texture("armor/a.dds", &diffuse);
    fx.texture("armor/a_n.dds", &normal);
    fx.texture("copies/b_d.dds", &diffuse);
    fx.texture("copies/b_n.dds", &normal);

    let mut options = fx.options();
    options.derive = false;
    let report = run(&options).expect("pipeline run");

    assert_eq!(report.materials, 1);
    assert_eq!(report.duplicates, 1);
    assert!(report.conflicts.is_empty());
    let doc = fx.document();
    assert_eq!(count(&doc, "over \"mat_"), 1);
    assert!(doc.contains("@./textures/armor/a.dds@"));
    assert!(!doc.contains("reflectionroughness_texture"));
}

#[test]
fn conflicting_companions_keep_the_first_material() {
    let fx = Fixture::new();
    let diffuse = random_pixels();
    fx.texture("a.dds", &diffuse);
    fx.texture("a_n.dds", &random_pixels());
    fx.texture("b.dds", &diffuse);
    fx.texture("b_n.dds", &random_pixels());

    let mut options = fx.options();
    options.derive = false;
    let report = run(&options).expect("pipeline run");

    assert_eq!(report.materials, 1);
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.kept_diffuse, "textures/a.dds");
    assert_eq!(conflict.rejected_diffuse, "textures/b.dds");
    assert_ne!(
        conflict.kept_hashes[&Slot::Normal],
        conflict.rejected_hashes[&Slot::Normal]
    );
    assert!(fx.document().contains("@./textures/a_n.dds@"));
}

#[test]
fn hash_lists_override_computed_hashes() {
    let fx = Fixture::new();
    fx.texture("a.dds", &random_pixels());
    fx.texture("a_n.dds", &random_pixels());
    fx.texture("b.dds", &random_pixels());
    fx.texture("b_n.dds", &random_pixels());

    let list = fx.out_dir().join("hashes.txt");
    fs::create_dir_all(fx.out_dir()).unwrap();
    fs::write(
        &list,
        "0x00000000000000AA textures/A.dds\n\
         0x00000000000000AA Textures\\b.dds\n\
         0x0000000000000001 textures/a_n.dds\n\
         0x0000000000000001 textures/b_n.dds\n",
    )
    .unwrap();

    let mut options = fx.options();
    options.derive = false;
    options.hash_lists = vec![list];
    let report = run(&options).expect("pipeline run");

    assert_eq!(report.materials, 1);
    assert_eq!(report.duplicates, 1);
    assert!(fx.document().contains(&format!("over \"mat_{}\"", ContentHash(0xAA))));
}

#[test]
fn malformed_hash_list_aborts_before_output() {
    let fx = Fixture::new();
    fx.texture("a.dds", &random_pixels());
    fx.texture("a_n.dds", &random_pixels());
    let list = fx.base.join("hashes.txt");
    fs::write(&list, "0x0000000000000001 textures/a.dds\nnot a record\n").unwrap();

    let mut options = fx.options();
    options.hash_lists = vec![list];
    match run(&options) {
        Err(TexbindError::Format { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected format error, got {other:?}"),
    }
    assert!(!fx.output.exists());
}

#[test]
fn emissive_mask_is_replaced_by_a_generated_emission_map() {
    let fx = Fixture::new();
    fx.texture("lights/lamp.dds", &[200; 64]);
    let mask: Vec<u8> = (0..64).map(|i| if i % 4 == 3 { 255 } else { 0 }).collect();
    fx.texture("lights/lamp_g.dds", &mask);

    let report = run(&fx.options()).expect("pipeline run");
    assert_eq!(report.generated, 1);

    let emission = fx.out_dir().join("generated/textures/lights/lamp_emit.dds");
    let bytes = fs::read(&emission).expect("emission map written");
    let asset = TextureAsset::parse(&emission, &bytes).unwrap();
    let top = &bytes[asset.data_offset()..asset.data_offset() + 64];
    assert!(top.chunks(4).all(|px| px == [0, 0, 0, 200]));

    let doc = fx.document();
    assert!(doc.contains("bool inputs:enable_emission = 1"));
    assert!(doc.contains("float inputs:emissive_intensity = 10\n"));
    assert!(doc.contains(
        "asset inputs:emissive_mask_texture = @./generated/textures/lights/lamp_emit.dds@"
    ));
}

#[test]
fn override_tries_the_alternate_suffix_only() {
    let fx = Fixture::new();
    fx.texture("clutter/open_24hours_sign/nv_24-sign.dds", &random_pixels());
    fx.texture("clutter/open_24hours_sign/nv_24-sign_g.dds", &random_pixels());
    fx.texture("clutter/open_24hours_sign/nv_24-sign_e.dds", &random_pixels());

    let config = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/newvegas.json");
    let mut options = fx.options();
    options.config = GenConfig::load(config).expect("bundled config loads");
    options.derive = false;
    run(&options).expect("pipeline run");

    let doc = fx.document();
    assert!(doc.contains("nv_24-sign_e.dds@"));
    assert!(!doc.contains("nv_24-sign_g.dds@"));
}

#[test]
fn blacklisted_companions_are_never_bound() {
    let fx = Fixture::new();
    fx.texture("a.dds", &random_pixels());
    fx.texture("a_n.dds", &random_pixels());

    let mut options = fx.options();
    options.config.blacklist.push("textures/A_N.dds".into());
    let report = run(&options).expect("pipeline run");
    assert_eq!(report.materials, 0);
    assert_eq!(count(&fx.document(), "over \"mat_"), 0);
}

#[test]
fn mesh_texture_sets_win_and_are_cached() {
    let fx = Fixture::new();
    fx.texture("armor/helmet.dds", &random_pixels());
    fx.texture("armor/helmet_n.dds", &random_pixels());
    fx.texture("shared/Helmet_Detail_N.dds", &random_pixels());

    let meshes = fx.base.join("meshes");
    fs::create_dir_all(&meshes).unwrap();
    let gltf = r#"{
        "asset": {"version": "2.0"},
        "images": [{"uri": "../textures/armor/helmet.dds"}, {"uri": "textures/shared/helmet_detail_n.dds"}],
        "textures": [{"source": 0}, {"source": 1}],
        "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}, "normalTexture": {"index": 1}}]
    }"#;
    fs::write(meshes.join("helmet.gltf"), gltf).unwrap();
    fs::write(meshes.join("broken.gltf"), "{").unwrap();

    let mut options = fx.options();
    options.derive = false;
    options.meshes = Some(meshes.clone());
    run(&options).expect("pipeline run");
    assert!(
        fx.document()
            .contains("asset inputs:normalmap_texture = @./textures/shared/Helmet_Detail_N.dds@")
    );

    let cache = fx.out_dir().join("mesh_textures.json");
    let cached = MeshTextureMap::load(&cache).expect("cache written");
    assert_eq!(
        cached.get("textures/armor/helmet.dds").unwrap()[&Slot::Normal],
        "textures/shared/helmet_detail_n.dds"
    );

    // A reused cache skips mesh parsing entirely.
    fs::write(meshes.join("helmet.gltf"), "{").unwrap();
    run(&options).expect("second run");
    assert!(fx.document().contains("@./textures/shared/Helmet_Detail_N.dds@"));

    // Without reuse the broken meshes leave only convention resolution.
    options.reuse_mesh_cache = false;
    run(&options).expect("third run");
    assert!(fx.document().contains("@./textures/armor/helmet_n.dds@"));
}

#[test]
fn missing_texture_root_fails_without_output() {
    let fx = Fixture::new();
    let mut options = fx.options();
    options.textures = fx.base.join("nope");
    assert!(matches!(run(&options), Err(TexbindError::Io { .. })));
    assert!(!fx.output.exists());
}

#[test]
fn corrupt_textures_are_skipped_and_the_rest_is_written() {
    let fx = Fixture::new();
    fx.texture("a.dds", &random_pixels());
    fx.texture("a_n.dds", &random_pixels());
    write_header_only(&fx.textures.join("huge.dds"), u32::MAX, u32::MAX);
    fx.texture("huge_n.dds", &random_pixels());
    let garbled = fx.texture("garbled.dds", &random_pixels());
    let mut bytes = fs::read(&garbled).unwrap();
    bytes[..4].copy_from_slice(b"XXXX");
    fs::write(&garbled, bytes).unwrap();
    fx.texture("garbled_n.dds", &random_pixels());

    let mut options = fx.options();
    options.derive = false;
    let report = run(&options).expect("pipeline run");

    assert_eq!(report.failed, 2);
    assert_eq!(report.materials, 1);
    let doc = fx.document();
    assert!(doc.contains("@./textures/a.dds@"));
    assert!(!doc.contains("huge"));
    assert!(!doc.contains("garbled"));
}

#[test]
fn every_reference_resolves_from_a_separate_output_directory() {
    let fx = Fixture::new();
    fx.texture("A.dds", &random_pixels());
    let normal: Vec<u8> = (0..64).map(|i| if i % 4 == 3 { 40 } else { 128 }).collect();
    fx.texture("A_n.dds", &normal);
    fx.texture("lights/lamp.dds", &[200; 64]);
    fx.texture("lights/lamp_g.dds", &[255; 64]);

    let mut options = fx.options();
    options.output = fx.base.parent().unwrap().join("out/looks.usda");
    let report = run(&options).expect("pipeline run");
    assert_eq!(report.generated, 2);

    let doc = fs::read_to_string(&options.output).expect("document written");
    assert!(doc.contains("@../Data/textures/A.dds@"));
    assert!(doc.contains("@./generated/textures/A_r.dds@"));

    let doc_dir = options.output.parent().unwrap();
    let references: Vec<&str> = doc.split('@').skip(1).step_by(2).collect();
    assert_eq!(references.len(), 5);
    for reference in references {
        assert!(
            doc_dir.join(reference).is_file(),
            "{reference} does not resolve from {}",
            doc_dir.display()
        );
    }
}

#[test]
fn reused_mesh_cache_honours_a_newer_blacklist() {
    let fx = Fixture::new();
    fx.texture("a.dds", &random_pixels());
    fx.texture("a_n.dds", &random_pixels());
    fx.texture("flat_n.dds", &random_pixels());

    let meshes = fx.base.join("meshes");
    fs::create_dir_all(&meshes).unwrap();
    let gltf = r#"{
        "asset": {"version": "2.0"},
        "images": [{"uri": "textures/a.dds"}, {"uri": "textures/flat_n.dds"}],
        "textures": [{"source": 0}, {"source": 1}],
        "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}, "normalTexture": {"index": 1}}]
    }"#;
    fs::write(meshes.join("crate.gltf"), gltf).unwrap();

    let mut options = fx.options();
    options.derive = false;
    options.meshes = Some(meshes);
    run(&options).expect("first run");
    assert!(fx.document().contains("normalmap_texture = @./textures/flat_n.dds@"));

    options.config.blacklist.push("textures/flat_n.dds".into());
    run(&options).expect("run with cached mesh map");
    let doc = fx.document();
    assert!(!doc.contains("flat_n.dds"));
    assert!(doc.contains("normalmap_texture = @./textures/a_n.dds@"));
}
