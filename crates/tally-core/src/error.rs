//! Error types for `tally-core`.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("file {0} does not exist")]
  InputNotFound(PathBuf),

  #[error("i/o error reading {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A read failed mid-stream. File-backed readers report [`Error::Io`]
  /// instead.
  #[error("i/o error reading line {line}: {source}")]
  ReadLine {
    line:   usize,
    #[source]
    source: std::io::Error,
  },

  #[error("file {0} is empty")]
  EmptyInput(PathBuf),

  /// The first record lacks one or more of the required source fields.
  #[error("file {path} does not have required columns for ingestion: missing {missing:?}")]
  MissingRequiredFields {
    path:    PathBuf,
    missing: Vec<&'static str>,
  },

  #[error("malformed JSON on line {line}: {source}")]
  MalformedJson {
    line:   usize,
    #[source]
    source: serde_json::Error,
  },

  /// A field value could not be cast to its target column type.
  #[error("line {line}: cannot coerce {field}: {reason}")]
  Coercion {
    line:   usize,
    field:  &'static str,
    reason: String,
  },

  #[error("invalid SQL identifier for {setting}: {value:?}")]
  InvalidIdentifier {
    setting: &'static str,
    value:   String,
  },

  #[error("table name {0:?} is configured more than once")]
  DuplicateTableName(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Name the file behind a stream-level read failure.
  pub(crate) fn in_file(self, path: &Path) -> Self {
    match self {
      Self::ReadLine { source, .. } => Self::Io { path: path.to_path_buf(), source },
      other => other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
