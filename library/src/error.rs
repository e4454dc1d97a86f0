//! Loader Error Types and Result Definitions
//!
//! One error taxonomy is shared by image parsing, relocation, export
//! resolution and the environment bootstraps.

use core::fmt;

/// Loader and bootstrap errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// Expected absence: the binary or its token is not present in this
    /// configuration. The caller proceeds without the feature.
    NotReady,
    /// Structural validation failure in image, relocation or export data.
    Malformed,
    /// Well formed but semantically unusable (wrong image kind, unknown
    /// token version, ...).
    Unsupported,
    /// Allocation failure at any step.
    OutOfResources,
    /// The result table's major version does not match the caller's
    /// expectation.
    VersionMismatch,
    /// A named export was not found, or the image has no export directory.
    NotFound,
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoaderError::NotReady => write!(f, "binary not present in this configuration"),
            LoaderError::Malformed => write!(f, "malformed image data"),
            LoaderError::Unsupported => write!(f, "unsupported image or token"),
            LoaderError::OutOfResources => write!(f, "allocation failed"),
            LoaderError::VersionMismatch => write!(f, "result table version mismatch"),
            LoaderError::NotFound => write!(f, "export not found"),
        }
    }
}

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;
