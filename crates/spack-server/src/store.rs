//! Latest artifacts served by the development server.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use spack_bundler::Artifact;

use crate::live_reload::SessionRegistry;

/// Served documents keyed by entry name, plus the sockets watching them.
pub struct ArtifactStore {
    entries: Vec<String>,
    pages: RwLock<BTreeMap<String, String>>,
    sessions: Arc<SessionRegistry>,
}

impl ArtifactStore {
    /// Create a store listing `entries` on the index page.
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries,
            pages: RwLock::new(BTreeMap::new()),
            sessions: Arc::new(SessionRegistry::default()),
        }
    }

    /// Entry names in configuration order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Template-merged document of an entry.
    pub fn page(&self, name: &str) -> Option<String> {
        self.pages.read().unwrap().get(name).cloned()
    }

    /// Merge rebuilt artifacts into the store and tell every socket watching
    /// one of them to reload. Entries not in `artifacts` keep their page.
    ///
    /// Returns the number of notifications sent.
    pub fn update(&self, artifacts: BTreeMap<String, Artifact>) -> usize {
        {
            let mut pages = self.pages.write().unwrap();
            for (name, artifact) in &artifacts {
                pages.insert(name.clone(), artifact.merged.clone());
            }
        }

        let notified = artifacts
            .keys()
            .map(|name| self.sessions.notify(name))
            .sum();
        tracing::debug!(entries = artifacts.len(), notified, "Artifact store updated");
        notified
    }

    pub(crate) fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}

#[cfg(test)]
pub(crate) fn artifact(name: &str, merged: &str) -> Artifact {
    use std::path::PathBuf;
    use std::time::SystemTime;

    use spack_bundler::Entry;

    Artifact {
        entry: Entry::new(name, format!("{name}.html")),
        source: PathBuf::from(format!("/src/{name}.html")),
        content: merged.to_owned(),
        merged: merged.to_owned(),
        mtime: SystemTime::UNIX_EPOCH,
        output: format!("{name}.html"),
    }
}
