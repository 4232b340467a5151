use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::Path,
};

use tracing::info;

use super::ContentHash;
use crate::{
    error::{Result, TexbindError},
    utils::{normalize_key, write_atomic_with},
};

/// Precomputed hashes keyed by normalized asset path.
///
/// Built from hash-list files, one `0xHEXHASH relative/path` record per line.
#[derive(Debug, Default, Clone)]
pub struct HashOverrides {
    entries: HashMap<String, ContentHash>,
}

impl HashOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, ContentHash)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(path, hash)| (normalize_key(&path), hash))
                .collect(),
        }
    }

    /// Loads one hash-list file. Any malformed line fails the whole load.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut table = Self::new();
        table.extend_from_file(path)?;
        Ok(table)
    }

    /// Loads every file in order; later files win on duplicate paths.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut table = Self::new();
        for path in paths {
            table.extend_from_file(path)?;
        }
        Ok(table)
    }

    pub fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(TexbindError::io(path))?;
        let mut records = 0;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (hash, key) = parse_line(line).map_err(|reason| TexbindError::Format {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            })?;
            self.entries.insert(key, hash);
            records += 1;
        }

        info!("hash list {}: {records} records", path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<ContentHash> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> std::result::Result<(ContentHash, String), String> {
    let line = line.trim();
    let (hash, path) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("expected '0xHASH path', found '{line}'"))?;

    let digits = hash
        .strip_prefix("0x")
        .ok_or_else(|| format!("hash '{hash}' is missing its 0x prefix"))?;
    if digits.len() != 16 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("hash '{hash}' is not 16 hex digits"));
    }
    let hash = digits
        .parse::<ContentHash>()
        .map_err(|err| format!("hash '{hash}': {err}"))?;

    let path = path.trim();
    if path.is_empty() {
        return Err("missing path".into());
    }
    Ok((hash, normalize_key(path)))
}

/// Writes a hash list that [`HashOverrides::load`] reads back.
pub fn write_hash_list(path: impl AsRef<Path>, entries: &[(ContentHash, String)]) -> Result<()> {
    write_atomic_with(path.as_ref(), |w| {
        for (hash, asset) in entries {
            writeln!(w, "0x{hash} {asset}")?;
        }
        Ok(())
    })
}
