use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::variant::VariantError;

/// Why a byte buffer is not a usable benchmark record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error(transparent)]
    Variant(#[from] VariantError),
    #[error("top-level value is '{0}', expected 'a{{sv}}'")]
    WrongRoot(String),
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("key '{key}': {source}")]
    Field { key: &'static str, source: VariantError },
    #[error("unsupported benchmark format version {0}, expected 1")]
    UnsupportedVersion(i64),
}

/// Failure to summarise one benchmark file.  Every variant names the file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: not a benchmark cache file: {source}", .path.display())]
    Format { path: PathBuf, source: FormatError },
    #[error(
        "{}: benchmark format version {found} is not supported (this tool reads version 1)",
        .path.display()
    )]
    UnsupportedVersion { path: PathBuf, found: i64 },
    #[error("{}: no {series} to average", .path.display())]
    EmptySamples { path: PathBuf, series: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    UnsupportedVersion,
    EmptySamples,
}

impl Error {
    /// Attach `path` to a decode failure, lifting version errors out of the
    /// generic format bucket.
    pub fn format(path: &Path, source: FormatError) -> Self {
        match source {
            FormatError::UnsupportedVersion(found) => {
                Error::UnsupportedVersion { path: path.to_owned(), found }
            }
            source => Error::Format { path: path.to_owned(), source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Format { .. } => ErrorKind::Format,
            Error::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Error::EmptySamples { .. } => ErrorKind::EmptySamples,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Error::Io { path, .. }
            | Error::Format { path, .. }
            | Error::UnsupportedVersion { path, .. }
            | Error::EmptySamples { path, .. } => path,
        }
    }
}
