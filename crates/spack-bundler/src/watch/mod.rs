//! Watch mode: incremental rebuilds driven by the reverse-dependency index.
//!
//! [`watch_and_rebuild`] keeps one filesystem watch per path in the running
//! index, waits for a debounced batch of changes, rebuilds exactly the
//! entries whose source depends on a changed path, and hands the fresh
//! artifacts to a callback. Each cycle runs to completion before the next
//! one starts.

mod debouncer;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::bundler::{Artifact, BuildOutput, Bundler, Entry};
use crate::error::BundleError;
use crate::index::DependentsIndex;

use self::debouncer::Debouncer;

/// Quiet period before a batch of changes triggers a rebuild.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Something that can watch single paths for changes.
pub trait WatchTarget {
    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// Returns the watcher error, e.g. when the path does not exist.
    fn watch(&mut self, path: &Path) -> Result<(), notify::Error>;

    /// Stop watching `path`.
    ///
    /// # Errors
    ///
    /// Returns the watcher error when the path was not watched.
    fn unwatch(&mut self, path: &Path) -> Result<(), notify::Error>;
}

impl WatchTarget for RecommendedWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), notify::Error> {
        Watcher::watch(self, path, RecursiveMode::NonRecursive)
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), notify::Error> {
        Watcher::unwatch(self, path)
    }
}

/// Paths currently under watch.
#[derive(Debug, Default)]
pub struct WatchSet {
    watched: HashSet<PathBuf>,
}

impl WatchSet {
    /// Bring the watched set in line with `index`: watch every newly
    /// depended-on path and drop watches for paths the index no longer knows.
    ///
    /// Paths that cannot be watched (usually missing files) are skipped and
    /// retried on the next reconcile.
    pub fn reconcile<W: WatchTarget>(&mut self, target: &mut W, index: &DependentsIndex) {
        let stale: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|path| !index.contains(path))
            .cloned()
            .collect();
        for path in stale {
            self.forget(target, &path);
        }

        for path in index.paths() {
            if self.watched.contains(path) {
                continue;
            }
            match target.watch(path) {
                Ok(()) => {
                    self.watched.insert(path.clone());
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping watch");
                }
            }
        }
    }

    /// Stop watching `path` so the next reconcile registers it afresh.
    pub fn forget<W: WatchTarget>(&mut self, target: &mut W, path: &Path) {
        if self.watched.remove(path)
            && let Err(e) = target.unwatch(path)
        {
            tracing::debug!(path = %path.display(), error = %e, "Unwatch failed");
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }
}

/// Incremental rebuild state: the entry set, each entry's resolved source and
/// the running reverse-dependency index.
#[derive(Debug)]
pub struct Rebuilder {
    bundler: Bundler,
    entries: Vec<Entry>,
    sources: HashMap<String, PathBuf>,
    dependents: DependentsIndex,
}

impl Rebuilder {
    /// Seed the rebuild state from a full build of `entries`.
    pub fn new(bundler: Bundler, entries: Vec<Entry>, initial: &BuildOutput) -> Self {
        let sources = initial
            .artifacts
            .iter()
            .map(|(name, artifact)| (name.clone(), artifact.source.clone()))
            .collect();
        Self {
            bundler,
            entries,
            sources,
            dependents: initial.dependents.clone(),
        }
    }

    pub fn dependents(&self) -> &DependentsIndex {
        &self.dependents
    }

    /// Entries whose resolved source depends on any of `changed`.
    ///
    /// Paths unknown to the index are ignored.
    pub fn select(&self, changed: &[PathBuf]) -> Vec<Entry> {
        let affected: HashSet<&PathBuf> = changed
            .iter()
            .filter_map(|path| self.dependents.get(path))
            .flatten()
            .collect();

        self.entries
            .iter()
            .filter(|entry| {
                self.sources
                    .get(&entry.name)
                    .is_some_and(|source| affected.contains(source))
            })
            .cloned()
            .collect()
    }

    /// Rebuild the entries affected by `changed`.
    ///
    /// Returns `None` when no entry is affected. On success the new edges are
    /// merged into the running index.
    ///
    /// # Errors
    ///
    /// Propagates the bundling error; the running index is left untouched.
    pub async fn rebuild(
        &mut self,
        changed: &[PathBuf],
    ) -> Result<Option<BTreeMap<String, Artifact>>, BundleError> {
        let selected = self.select(changed);
        if selected.is_empty() {
            tracing::debug!(changed = changed.len(), "No entry affected");
            return Ok(None);
        }

        let start = Instant::now();
        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        tracing::info!(entries = ?names, "Rebuild started");

        let output = self.bundler.build_once(&selected).await?;
        self.dependents.merge(output.dependents);
        for (name, artifact) in &output.artifacts {
            self.sources.insert(name.clone(), artifact.source.clone());
        }

        tracing::info!(
            entries = output.artifacts.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rebuild finished"
        );
        Ok(Some(output.artifacts))
    }
}

/// Watch the dependency graph and rebuild affected entries until the
/// watcher shuts down.
///
/// Rebuild failures are logged and the loop keeps running on the previous
/// index.
///
/// # Errors
///
/// Returns an error if the filesystem watcher cannot be created.
pub async fn watch_and_rebuild<F>(mut rebuilder: Rebuilder, mut on_change: F) -> Result<(), BundleError>
where
    F: FnMut(BTreeMap<String, Artifact>) + Send,
{
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            // Callback runs on the watcher thread
            let _ = tx.blocking_send(event);
        }
    })?;

    let mut watches = WatchSet::default();
    let mut debouncer = Debouncer::new(DEBOUNCE);

    loop {
        watches.reconcile(&mut watcher, rebuilder.dependents());
        tracing::debug!(watched = watches.len(), "Watching for changes");

        let Some(changed) = next_batch(&mut rx, &watches, &mut debouncer).await else {
            return Ok(());
        };

        // Editors replace files on save; re-register on the next reconcile.
        for path in &changed {
            watches.forget(&mut watcher, path);
        }

        match rebuilder.rebuild(&changed).await {
            Ok(Some(artifacts)) => on_change(artifacts),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Rebuild failed"),
        }
    }
}

/// Wait for the next debounced batch of changes to watched paths.
///
/// Returns `None` once the event channel is closed.
async fn next_batch(
    rx: &mut mpsc::Receiver<Event>,
    watches: &WatchSet,
    debouncer: &mut Debouncer,
) -> Option<Vec<PathBuf>> {
    loop {
        let event = match debouncer.deadline() {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                if let Ok(event) = tokio::time::timeout_at(deadline, rx.recv()).await {
                    event
                } else {
                    if let Some(changed) = debouncer.take_ready(Instant::now()) {
                        return Some(changed);
                    }
                    continue;
                }
            }
            None => rx.recv().await,
        };

        let event = event?;
        if !is_change(event.kind) {
            continue;
        }
        for path in event.paths {
            if watches.contains(&path) {
                tracing::debug!(path = %path.display(), kind = ?event.kind, "Recorded change");
                debouncer.record(path, Instant::now());
            }
        }
    }
}

/// Whether a watcher event can change file content.
fn is_change(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(
                ModifyKind::Any
                    | ModifyKind::Data(_)
                    | ModifyKind::Name(_)
                    | ModifyKind::Other
                    | ModifyKind::Metadata(MetadataKind::WriteTime)
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange};
    use pretty_assertions::assert_eq;
    use std::fs;

    use crate::context::ResolveOptions;

    #[derive(Default)]
    struct FakeTarget {
        missing: HashSet<PathBuf>,
        log: Vec<String>,
    }

    impl WatchTarget for FakeTarget {
        fn watch(&mut self, path: &Path) -> Result<(), notify::Error> {
            if self.missing.contains(path) {
                return Err(notify::Error::path_not_found());
            }
            self.log.push(format!("watch {}", path.display()));
            Ok(())
        }

        fn unwatch(&mut self, path: &Path) -> Result<(), notify::Error> {
            self.log.push(format!("unwatch {}", path.display()));
            Ok(())
        }
    }

    fn index_of(paths: &[&str]) -> DependentsIndex {
        let mut index = DependentsIndex::new();
        for path in paths {
            index.ensure(Path::new(path));
        }
        index
    }

    #[test]
    fn test_is_change() {
        assert!(is_change(EventKind::Create(CreateKind::File)));
        assert!(is_change(EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_change(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime
        ))));
        assert!(!is_change(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_change(EventKind::Access(AccessKind::Read)));
    }

    #[test]
    fn test_reconcile_watches_new_paths_once() {
        let mut target = FakeTarget::default();
        let mut watches = WatchSet::default();

        watches.reconcile(&mut target, &index_of(&["/a.js"]));
        watches.reconcile(&mut target, &index_of(&["/a.js"]));

        assert_eq!(target.log, vec!["watch /a.js"]);
        assert!(watches.contains(Path::new("/a.js")));
    }

    #[test]
    fn test_reconcile_drops_paths_missing_from_index() {
        let mut target = FakeTarget::default();
        let mut watches = WatchSet::default();

        watches.reconcile(&mut target, &index_of(&["/a.js"]));
        watches.reconcile(&mut target, &index_of(&["/b.js"]));

        assert_eq!(target.log, vec!["watch /a.js", "unwatch /a.js", "watch /b.js"]);
        assert_eq!(watches.len(), 1);
    }

    #[test]
    fn test_reconcile_skips_unwatchable_paths() {
        let mut target = FakeTarget {
            missing: HashSet::from([PathBuf::from("/gone.js")]),
            ..FakeTarget::default()
        };
        let mut watches = WatchSet::default();

        watches.reconcile(&mut target, &index_of(&["/gone.js"]));

        assert!(watches.is_empty());
    }

    #[test]
    fn test_forget_then_reconcile_rewatches() {
        let mut target = FakeTarget::default();
        let mut watches = WatchSet::default();
        let index = index_of(&["/a.js"]);

        watches.reconcile(&mut target, &index);
        watches.forget(&mut target, Path::new("/a.js"));
        watches.reconcile(&mut target, &index);

        assert_eq!(target.log, vec!["watch /a.js", "unwatch /a.js", "watch /a.js"]);
    }

    async fn two_entry_rebuilder(dir: &Path) -> Rebuilder {
        fs::write(dir.join("x.js"), "const a = /** @imports txt */ 'f1.txt'").unwrap();
        fs::write(dir.join("y.js"), "const b = /** @imports txt */ 'f2.txt'").unwrap();
        fs::write(dir.join("f1.txt"), "one").unwrap();
        fs::write(dir.join("f2.txt"), "two").unwrap();

        let bundler = Bundler::new(dir, "[name]", ResolveOptions::default());
        let entries = vec![Entry::new("x", "x.js"), Entry::new("y", "y.js")];
        let initial = bundler.build_once(&entries).await.unwrap();
        Rebuilder::new(bundler, entries, &initial)
    }

    #[tokio::test]
    async fn test_select_only_dependent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let rebuilder = two_entry_rebuilder(dir.path()).await;

        let selected = rebuilder.select(&[dir.path().join("f1.txt")]);
        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x"]);

        assert!(rebuilder.select(&[dir.path().join("unrelated.txt")]).is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_returns_fresh_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut rebuilder = two_entry_rebuilder(dir.path()).await;
        fs::write(dir.path().join("f2.txt"), "TWO").unwrap();

        let artifacts = rebuilder
            .rebuild(&[dir.path().join("f2.txt")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(artifacts["y"].content, "const b = \"TWO\"");
    }

    #[tokio::test]
    async fn test_rebuild_merges_new_edges() {
        let dir = tempfile::tempdir().unwrap();
        let mut rebuilder = two_entry_rebuilder(dir.path()).await;
        fs::write(dir.path().join("f3.txt"), "three").unwrap();
        fs::write(
            dir.path().join("x.js"),
            "const c = /** @imports txt */ 'f3.txt'",
        )
        .unwrap();

        rebuilder.rebuild(&[dir.path().join("x.js")]).await.unwrap();

        let index = rebuilder.dependents();
        assert!(index.depends_on(&dir.path().join("x.js"), &dir.path().join("f3.txt")));
        // Edges are only ever added.
        assert!(index.depends_on(&dir.path().join("x.js"), &dir.path().join("f1.txt")));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut rebuilder = two_entry_rebuilder(dir.path()).await;
        let before = rebuilder.dependents().clone();
        fs::write(
            dir.path().join("x.js"),
            "const c = /** @imports txt */ 'logo.svg'",
        )
        .unwrap();
        fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();

        let err = rebuilder.rebuild(&[dir.path().join("x.js")]).await.unwrap_err();

        assert!(matches!(err, BundleError::UnsupportedAsset { .. }));
        assert_eq!(rebuilder.dependents(), &before);
    }

    #[tokio::test]
    async fn test_template_change_selects_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.html"), "<p>home</p>").unwrap();
        fs::write(dir.path().join("other.html"), "<p>other</p>").unwrap();
        fs::write(dir.path().join("index.html"), "<imports slot></imports>").unwrap();

        let bundler = Bundler::new(dir.path(), "[name]", ResolveOptions::default());
        let entries = vec![
            Entry::new("home", "app.html").with_template("index.html"),
            Entry::new("other", "other.html"),
        ];
        let initial = bundler.build_once(&entries).await.unwrap();
        let rebuilder = Rebuilder::new(bundler, entries, &initial);

        // Templates are imported by their entry source, so selection by
        // source path still reaches the owning entry.
        let selected = rebuilder.select(&[dir.path().join("index.html")]);
        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["home"]);
    }

    fn modified(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
    }

    #[tokio::test]
    async fn test_next_batch_ignores_unwatched_paths() {
        let mut target = FakeTarget::default();
        let mut watches = WatchSet::default();
        watches.reconcile(&mut target, &index_of(&["/a.js"]));
        let mut debouncer = Debouncer::new(DEBOUNCE);
        let (tx, mut rx) = mpsc::channel(10);

        tx.send(modified(PathBuf::from("/stale.js"))).await.unwrap();
        tx.send(modified(PathBuf::from("/a.js"))).await.unwrap();
        tx.send(modified(PathBuf::from("/a.js"))).await.unwrap();

        let batch = next_batch(&mut rx, &watches, &mut debouncer).await;
        assert_eq!(batch, Some(vec![PathBuf::from("/a.js")]));

        tx.send(modified(PathBuf::from("/stale.js"))).await.unwrap();
        drop(tx);
        assert_eq!(next_batch(&mut rx, &watches, &mut debouncer).await, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_loop_rebuilds_only_changed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let rebuilder = two_entry_rebuilder(dir.path()).await;
        let (tx, mut batches) = mpsc::unbounded_channel();

        let task = tokio::spawn(watch_and_rebuild(rebuilder, move |artifacts| {
            let _ = tx.send(artifacts);
        }));
        // Let the loop register its watches.
        tokio::time::sleep(Duration::from_millis(300)).await;

        fs::write(dir.path().join("f1.txt"), "ONE").unwrap();

        let artifacts = tokio::time::timeout(Duration::from_secs(5), batches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(artifacts["x"].content, "const a = \"ONE\"");

        // One save is one rebuild.
        let extra = tokio::time::timeout(Duration::from_millis(500), batches.recv()).await;
        assert!(extra.is_err());

        task.abort();
    }
}
