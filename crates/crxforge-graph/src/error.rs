//! Error types for graph construction and emission.

use std::path::PathBuf;

use crxforge_manifest::{ManifestError, ValidationError, ValidationWarning};
use thiserror::Error;

/// Fatal build errors.
///
/// Per-file discovery failures are not represented here; they settle the
/// affected file as `error` and surface as [`BuildWarning`]s on the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The root manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    ManifestUnreadable {
        /// Path to the manifest file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The root manifest file could not be parsed, or declares an
    /// unsupported schema version.
    #[error("invalid manifest {path}: {source}")]
    ManifestInvalid {
        /// Path to the manifest file.
        path: PathBuf,
        /// Underlying manifest error.
        #[source]
        source: ManifestError,
    },

    /// No script or HTML file is reachable from the manifest.
    #[error("the manifest must reach at least one script or HTML file ({path})")]
    NoScriptsOrHtml {
        /// Path to the manifest file.
        path: PathBuf,
    },

    /// A content script reached resource resolution without match patterns.
    /// Validation rejects this earlier, so hitting it is a programming error.
    #[error("content script '{script}' has no match patterns")]
    MissingMatches {
        /// Source-relative content script path.
        script: String,
    },

    /// The final manifest body failed validation.
    #[error("final manifest failed validation with {} error(s)", errors.len())]
    Validation {
        /// All collected validation errors.
        errors: Vec<ValidationError>,
        /// Warnings collected alongside the errors.
        warnings: Vec<ValidationWarning>,
    },

    /// The external compiler failed.
    #[error("compile failed: {0}")]
    Compile(String),

    /// An operation that needs a settled graph ran before `build`.
    #[error("no build graph yet: call build() first")]
    NoGraph,
}

/// A non-fatal, per-file condition collected while the build settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    /// The file the warning is scoped to, if any.
    pub id: Option<PathBuf>,
    /// Human-readable message.
    pub message: String,
}

impl BuildWarning {
    /// Creates a warning scoped to one file.
    pub fn for_file(id: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            message: message.into(),
        }
    }

    /// Creates a warning not tied to a single file.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            id: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.id {
            write!(f, "{}: {}", id.display(), self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}
