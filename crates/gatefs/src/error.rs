//! Error kinds for the filesystem gateway.
//!
//! Every tool funnels failures into [`Error`]; the transport layer only ever
//! sees its `Display` form.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by path validation and filesystem operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The path is empty, contains a null byte, or has no usable form.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The canonicalized path falls outside every allowed root.
    #[error("access denied: path outside allowed directories: {0}")]
    AccessDenied(PathBuf),

    /// The target does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// The search text does not occur in the file (the file is unchanged).
    #[error("search text not found in {0}")]
    SearchTextNotFound(PathBuf),

    /// The destination already exists and overwrite was not requested.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Non-recursive delete on a populated directory.
    #[error("directory not empty: {0}")]
    NotEmpty(PathBuf),

    /// Content exceeds the configured size ceiling.
    #[error("file too large ({size} bytes; max {max} bytes): {path}")]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    /// Argument constraints the schema cannot express (batch ceiling, etc.).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Underlying OS failure (permission, disk full, device error).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an IO error at a known path, lifting `NotFound` into its typed kind.
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io(err)
        }
    }
}
