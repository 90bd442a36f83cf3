//! Change batching for the watch loop.
//!
//! Editors often emit several events for one save (truncate, write, rename).
//! Events are collected into one batch that becomes ready once no further
//! event has arrived for the quiet period, so one save triggers one rebuild.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Collects changed paths until the filesystem goes quiet.
#[derive(Debug)]
pub(crate) struct Debouncer {
    changed: BTreeSet<PathBuf>,
    quiet: Duration,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            changed: BTreeSet::new(),
            quiet,
            last_event: None,
        }
    }

    /// Record a change observed at `now`. Pushes the batch deadline back.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.changed.insert(path);
        self.last_event = Some(now);
    }

    /// When the current batch becomes ready, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_event.map(|last| last + self.quiet)
    }

    /// Take the batch if its deadline has passed at `now`.
    ///
    /// Paths come out sorted and deduplicated.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.changed).into_iter().collect())
    }
}
