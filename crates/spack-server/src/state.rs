//! Application state.

use std::sync::Arc;

use crate::store::ArtifactStore;

/// State shared by every request handler.
pub(crate) struct AppState {
    pub(crate) store: Arc<ArtifactStore>,
    /// Host the injected client script connects back to.
    pub(crate) host: String,
    pub(crate) port: u16,
}
