//! CLI error types.

use spack_bundler::BundleError;
use spack_config::ConfigError;
use spack_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Bundle(#[from] BundleError),

    #[error("{0}")]
    Server(#[from] ServerError),
}
