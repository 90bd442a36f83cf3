//! Dependency context for one bundling pass.
//!
//! Owns the module set, the discovery queue, cycle detection and the
//! reverse-dependency index. Discovery is eager and asynchronous (files are
//! read and scanned in queue order); assembly is lazy and memoized through
//! [`DependencyContext::fetch_resolved`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::BundleError;
use crate::index::DependentsIndex;
use crate::module::{Content, ModuleData, ModuleState, Pending};

/// Path resolution policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Shared library root searched first for relative references.
    pub libs_root: Option<PathBuf>,
    /// Prefix of development overrides (`.local.` turns `app.js` into
    /// `.local.app.js`). An override is preferred over the plain file.
    pub override_prefix: Option<String>,
}

/// Module set and reverse-dependency index for one pass.
#[derive(Debug)]
pub struct DependencyContext {
    options: ResolveOptions,
    queue: VecDeque<PathBuf>,
    registered: HashSet<PathBuf>,
    modules: HashMap<PathBuf, ModuleState>,
    dependents: DependentsIndex,
    /// Forward edges (importer -> imported), used to push dependents downstream.
    imports: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DependencyContext {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            queue: VecDeque::new(),
            registered: HashSet::new(),
            modules: HashMap::new(),
            dependents: DependentsIndex::new(),
            imports: HashMap::new(),
        }
    }

    /// Candidate paths for a reference, in search order.
    pub fn candidates(&self, reference: &Path, referrer: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(4);

        if let Some(libs_root) = &self.options.libs_root
            && !reference.is_absolute()
        {
            self.push_with_override(&mut candidates, &libs_root.join(reference));
        }

        match referrer {
            Some(referrer) => {
                let base = referrer.parent().unwrap_or(Path::new(""));
                self.push_with_override(&mut candidates, &base.join(reference));
            }
            None => self.push_with_override(&mut candidates, reference),
        }

        candidates
    }

    fn push_with_override(&self, candidates: &mut Vec<PathBuf>, path: &Path) {
        let path = normalize(path);
        if let Some(prefix) = &self.options.override_prefix
            && let Some(name) = path.file_name()
        {
            let mut file_name = std::ffi::OsString::from(prefix);
            file_name.push(name);
            candidates.push(path.with_file_name(file_name));
        }
        candidates.push(path);
    }

    /// Resolve a reference to the first existing candidate.
    ///
    /// Falls back to the raw reference when nothing exists; the failure then
    /// surfaces as a read error when the file is loaded.
    pub async fn resolve_path(&self, reference: &Path, referrer: Option<&Path>) -> PathBuf {
        for candidate in self.candidates(reference, referrer) {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
        }
        tracing::debug!(reference = %reference.display(), "No candidate exists, deferring failure to load");
        reference.to_path_buf()
    }

    /// Record that `referrer` imports `path` and queue `path` on first sight.
    ///
    /// Every dependent of `referrer` becomes a dependent of `path` and, through
    /// already known import edges, of everything `path` imports.
    pub fn register_import(&mut self, path: &Path, referrer: Option<&Path>) -> PathBuf {
        self.dependents.ensure(path);

        if let Some(referrer) = referrer {
            let inherited: Vec<PathBuf> = self.dependents.ensure(referrer).iter().cloned().collect();
            let edges = self.imports.entry(referrer.to_path_buf()).or_default();
            if !edges.iter().any(|p| p == path) {
                edges.push(path.to_path_buf());
            }
            self.propagate(path, inherited);
        }

        if self.registered.insert(path.to_path_buf()) {
            self.queue.push_back(path.to_path_buf());
        }

        path.to_path_buf()
    }

    /// Resolve and register a reference in one step.
    pub async fn import(&mut self, reference: &Path, referrer: Option<&Path>) -> PathBuf {
        let path = self.resolve_path(reference, referrer).await;
        self.register_import(&path, referrer)
    }

    fn propagate(&mut self, target: &Path, incoming: Vec<PathBuf>) {
        let mut work = vec![(target.to_path_buf(), incoming)];

        while let Some((path, incoming)) = work.pop() {
            let set = self.dependents.ensure(&path);
            let added: Vec<PathBuf> = incoming
                .into_iter()
                .filter(|p| set.insert(p.clone()))
                .collect();
            if added.is_empty() {
                continue;
            }
            if let Some(children) = self.imports.get(&path) {
                for child in children {
                    work.push((child.clone(), added.clone()));
                }
            }
        }
    }

    /// Next registered path waiting for its eager scan.
    pub fn next_queued(&mut self) -> Option<PathBuf> {
        self.queue.pop_front()
    }

    pub(crate) fn insert_loaded(&mut self, path: PathBuf, pending: Pending) {
        self.modules.insert(path, ModuleState::Loaded(pending));
    }

    /// Resolved content of a loaded module, computed at most once.
    ///
    /// Re-entering a module whose computation is still running is a cycle.
    pub fn fetch_resolved(&mut self, path: &Path) -> Result<Arc<ModuleData>, BundleError> {
        let state = self
            .modules
            .get_mut(path)
            .ok_or_else(|| BundleError::UnknownModule {
                path: path.to_path_buf(),
            })?;

        let pending = match std::mem::replace(state, ModuleState::Resolving) {
            ModuleState::Resolved(data) => {
                *state = ModuleState::Resolved(Arc::clone(&data));
                return Ok(data);
            }
            ModuleState::Resolving => {
                return Err(BundleError::Cycle {
                    path: path.to_path_buf(),
                });
            }
            ModuleState::Loaded(pending) => pending,
        };

        let data = Arc::new(self.assemble(pending)?);
        self.modules
            .insert(path.to_path_buf(), ModuleState::Resolved(Arc::clone(&data)));
        Ok(data)
    }

    fn assemble(&mut self, pending: Pending) -> Result<ModuleData, BundleError> {
        let (source, mut mtime, splices) = match pending {
            Pending::Ready(data) => return Ok(data),
            Pending::Spliced {
                source,
                mtime,
                splices,
            } => (source, mtime, splices),
        };

        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        for splice in &splices {
            out.push_str(&source[cursor..splice.directive.start]);
            let resolved = self.fetch_resolved(&splice.target)?;
            out.push_str(&splice.directive.adapter.convert(&resolved.content));
            mtime = mtime.max(resolved.mtime);
            cursor = splice.directive.end();
        }
        out.push_str(&source[cursor..]);

        Ok(ModuleData {
            content: Content::Text(out),
            mtime,
        })
    }

    pub fn dependents(&self) -> &DependentsIndex {
        &self.dependents
    }

    pub fn into_dependents(self) -> DependentsIndex {
        self.dependents
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
