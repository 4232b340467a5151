use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::error::{Result, TexbindError};

/// Writes `path` through a temporary file in the same directory, then renames
/// it into place. A crash mid-write leaves the previous file (or nothing).
pub fn write_atomic_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(TexbindError::io(dir))?;

    let tmp = NamedTempFile::new_in(dir).map_err(TexbindError::io(dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer).map_err(TexbindError::io(path))?;
        writer.flush().map_err(TexbindError::io(path))?;
    }
    tmp.persist(path).map_err(|err| TexbindError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |w| w.write_all(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file_and_creates_parents() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let target = dir.path().join("nested/out.txt");

        write_atomic(&target, b"first").expect("first write");
        write_atomic(&target, b"second").expect("overwrite");

        assert_eq!(fs::read(&target).expect("read back"), b"second");
        let leftovers = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary files must not be left behind");
    }
}
