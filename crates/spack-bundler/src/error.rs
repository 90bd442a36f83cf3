//! Bundling error types.

use std::path::PathBuf;

/// Error raised by a bundling pass or the watch loop.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// A module was re-entered while it was still being resolved.
    #[error("Cyclic dependency detected at {}", .path.display())]
    Cycle {
        /// Path that cycled back onto itself.
        path: PathBuf,
    },

    /// No loader is registered for the file extension.
    #[error("Unsupported asset kind '{extension}': {}", .path.display())]
    UnsupportedAsset {
        /// Offending file.
        path: PathBuf,
        /// Lowercased extension (empty when the file has none).
        extension: String,
    },

    /// Reading or stating a source file failed.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing an output artifact failed.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A module was requested before it was loaded.
    #[error("Module was never loaded: {}", .path.display())]
    UnknownModule {
        /// Requested path.
        path: PathBuf,
    },

    /// The filesystem watcher failed.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl BundleError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_path() {
        let err = BundleError::Cycle {
            path: PathBuf::from("/src/a.js"),
        };
        assert_eq!(err.to_string(), "Cyclic dependency detected at /src/a.js");
    }

    #[test]
    fn test_unsupported_asset_message() {
        let err = BundleError::UnsupportedAsset {
            path: PathBuf::from("/src/logo.svg"),
            extension: "svg".to_owned(),
        };
        assert!(err.to_string().contains("'svg'"));
        assert!(err.to_string().contains("/src/logo.svg"));
    }
}
