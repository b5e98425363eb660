use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while collecting, balancing and exporting a dataset.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed annotation {path}: {msg}")]
    MalformedInput { path: PathBuf, msg: String },
    #[error("image file missing for annotation {path}: {image}")]
    MissingAsset { path: PathBuf, image: PathBuf },
    #[error("class {class_id} has no entries to draw {requested} samples from")]
    EmptyClass { class_id: usize, requested: usize },
    #[error("failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Error::MalformedInput {
            path: path.into(),
            msg: msg.into(),
        }
    }
}
