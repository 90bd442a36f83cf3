//! Asset bundling engine for spack.
//!
//! Resolves the graph of files reachable from a set of named entries,
//! converts every referenced file through a format adapter and assembles
//! one self-contained artifact per entry.
//!
//! # Pipeline
//!
//! ```text
//! Entry ──► DependencyContext ──► Loader (eager scan) ──► Adapter directives
//!                 │                                              │
//!                 └──── fetch_resolved (lazy, memoized) ◄────────┘
//!                                │
//!                                ▼
//!                    Artifact ──► splitter ──► emit
//! ```
//!
//! In watch mode the reverse-dependency index of every pass is merged into a
//! running index that decides which entries a filesystem change affects.
//!
//! # Quick Start
//!
//! ```ignore
//! use spack_bundler::{Bundler, Entry, ResolveOptions, emit};
//!
//! let bundler = Bundler::new("site", "[name]", ResolveOptions::default());
//! let output = bundler.build_once(&[Entry::new("home", "index.html")]).await?;
//! emit(&output.artifacts, Path::new("dist")).await?;
//! ```

mod adapter;
mod bundler;
mod context;
mod emit;
mod error;
mod index;
mod loader;
mod module;
mod splitter;
mod watch;

pub use adapter::{Adapter, Directive, scan};
pub use bundler::{Artifact, BuildOutput, Bundler, Entry};
pub use context::{DependencyContext, ResolveOptions, normalize};
pub use emit::{EmitReport, EmitStatus, emit};
pub use error::BundleError;
pub use index::DependentsIndex;
pub use loader::Loader;
pub use module::{Content, ModuleData};
pub use splitter::{Split, split};
pub use watch::{Rebuilder, WatchSet, WatchTarget, watch_and_rebuild};
