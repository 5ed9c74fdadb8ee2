//! Error types for the package index

use thiserror::Error;

/// Result type alias for package index operations
pub type Result<T> = std::result::Result<T, Error>;

/// Package index errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid version {version:?}: {detail}")]
    InvalidVersion { version: String, detail: String },

    #[error("Invalid package atom: {0}")]
    InvalidAtom(String),

    #[error("Invalid package name: {0}")]
    InvalidPackageId(String),
}
