use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TexbindError {
    /// Bad magic or a header too short to hold the 128-byte prologue.
    #[error("{}: malformed texture: {reason}", path.display())]
    MalformedAsset { path: PathBuf, reason: String },

    /// Channel count or pixel-format flags this crate cannot read or write.
    #[error("{}: unsupported format: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Malformed hash-list line.
    #[error("{}:{line}: {reason}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TexbindError>;

impl TexbindError {
    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        TexbindError::MalformedAsset {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        TexbindError::UnsupportedFormat {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        TexbindError::Config(msg.into())
    }

    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| TexbindError::Io { path, source }
    }
}
