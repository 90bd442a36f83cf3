//! Bundling passes.
//!
//! [`Bundler::build_once`] runs one full pass over a set of entries:
//! register entry sources and templates, drain the discovery queue, then
//! assemble one [`Artifact`] per entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Instant, SystemTime};

use regex::{NoExpand, Regex};

use crate::context::{DependencyContext, ResolveOptions, normalize};
use crate::error::BundleError;
use crate::index::DependentsIndex;
use crate::loader::Loader;

static TEMPLATE_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*<imports slot></imports>\s*").unwrap());

/// Placeholder in the output name template replaced by the entry name.
const NAME_PLACEHOLDER: &str = "[name]";

/// A named build target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Entry name, used for the output file and the served URL.
    pub name: String,
    /// Source file (relative paths are resolved against the workdir).
    pub source: PathBuf,
    /// Optional template the source is merged into.
    pub template: Option<PathBuf>,
    /// Extract `<style>` blocks into a sibling `.css` file.
    pub extract_styles: bool,
    /// Keep scripts and styles inline.
    pub monolith: bool,
    /// Emit the template-merged document instead of the bare entry content.
    pub include_template: bool,
}

impl Entry {
    /// Create a monolithic entry without a template.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            template: None,
            extract_styles: false,
            monolith: true,
            include_template: false,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// Result of bundling one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub entry: Entry,
    /// Resolved path of the entry source.
    pub source: PathBuf,
    /// Entry content (wrapped in a `<script>` when a script entry has a template).
    pub content: String,
    /// Entry content merged with its template (same as `content` without one).
    pub merged: String,
    /// Newest modification time across everything that went into the artifact.
    pub mtime: SystemTime,
    /// Output filename relative to the output directory.
    pub output: String,
}

impl Artifact {
    /// The document written to disk for this artifact.
    pub fn document(&self) -> &str {
        if self.entry.monolith || self.entry.include_template {
            &self.merged
        } else {
            &self.content
        }
    }
}

/// Artifacts of one pass plus the reverse-dependency index it produced.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub artifacts: BTreeMap<String, Artifact>,
    pub dependents: DependentsIndex,
}

/// Bundles entries rooted at a working directory.
#[derive(Clone, Debug)]
pub struct Bundler {
    workdir: PathBuf,
    output_template: String,
    options: ResolveOptions,
}

impl Bundler {
    /// Create a bundler.
    ///
    /// # Arguments
    ///
    /// * `workdir` - Base directory for relative entry paths
    /// * `output_template` - Output name with a `[name]` placeholder
    /// * `options` - Path resolution policy
    pub fn new(
        workdir: impl Into<PathBuf>,
        output_template: impl Into<String>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            output_template: output_template.into(),
            options,
        }
    }

    /// Output filename for an entry: the template with `[name]` substituted,
    /// plus the `.html` extension.
    pub fn output_name(&self, name: &str) -> String {
        format!(
            "{}.html",
            self.output_template.replacen(NAME_PLACEHOLDER, name, 1)
        )
    }

    /// Run one full bundling pass over `entries`.
    ///
    /// # Errors
    ///
    /// Fails on the first cyclic import, unsupported asset or unreadable file.
    pub async fn build_once(&self, entries: &[Entry]) -> Result<BuildOutput, BundleError> {
        let start = Instant::now();
        let mut ctx = DependencyContext::new(self.options.clone());

        let mut roots = Vec::with_capacity(entries.len());
        for entry in entries {
            let source = ctx
                .import(&normalize(&self.workdir.join(&entry.source)), None)
                .await;
            let template = match &entry.template {
                Some(template) => Some(
                    ctx.import(&normalize(&self.workdir.join(template)), Some(&source))
                        .await,
                ),
                None => None,
            };
            roots.push((entry, source, template));
        }

        let modules = load_queued(&mut ctx).await?;

        let mut artifacts = BTreeMap::new();
        for (entry, source, template) in roots {
            let artifact = self.assemble(&mut ctx, entry, source, template.as_deref())?;
            artifacts.insert(entry.name.clone(), artifact);
        }

        tracing::info!(
            entries = artifacts.len(),
            modules,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Bundling pass finished"
        );

        Ok(BuildOutput {
            artifacts,
            dependents: ctx.into_dependents(),
        })
    }

    fn assemble(
        &self,
        ctx: &mut DependencyContext,
        entry: &Entry,
        source: PathBuf,
        template: Option<&Path>,
    ) -> Result<Artifact, BundleError> {
        let module = ctx.fetch_resolved(&source)?;
        let mut content = module.content.as_text().into_owned();
        let mut mtime = module.mtime;

        let merged = match template {
            Some(template) => {
                let template = ctx.fetch_resolved(template)?;
                mtime = mtime.max(template.mtime);
                if is_markup(&source) {
                    fill_slot(&template.content.as_text(), &content)
                } else {
                    content = format!("<script>\n{content}</script>");
                    format!("{content}\n{}", template.content.as_text())
                }
            }
            None => content.clone(),
        };

        Ok(Artifact {
            entry: entry.clone(),
            source,
            content,
            merged,
            mtime,
            output: self.output_name(&entry.name),
        })
    }
}

/// Drain the discovery queue, scanning each module once. Returns the number
/// of modules loaded.
async fn load_queued(ctx: &mut DependencyContext) -> Result<usize, BundleError> {
    let mut loaded = 0;
    while let Some(path) = ctx.next_queued() {
        let loader = Loader::for_path(&path)?;
        let pending = loader.import(&path, ctx).await?;
        ctx.insert_loaded(path, pending);
        loaded += 1;
    }
    Ok(loaded)
}

fn is_markup(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

/// Replace the template's slot marker (and surrounding whitespace) with the
/// entry content.
fn fill_slot(template: &str, content: &str) -> String {
    TEMPLATE_SLOT
        .replace(template, NoExpand(&format!("\n\n{content}\n\n")))
        .into_owned()
}
