//! Per-extension loaders.
//!
//! A loader reads a file, scans it with the adapters registered for its
//! extension and registers every referenced file with the
//! [`DependencyContext`]. The result is either final content or a
//! [`Pending::Spliced`] computation assembled later on demand.

use std::path::Path;
use std::time::SystemTime;

use crate::adapter::{self, Adapter};
use crate::context::DependencyContext;
use crate::error::BundleError;
use crate::module::{Content, ModuleData, Pending, Splice};

const MARKUP_ADAPTERS: &[Adapter] = &[
    Adapter::HtmlStylesheet,
    Adapter::HtmlImports,
    Adapter::HtmlScript,
    Adapter::ScriptModule,
    Adapter::ScriptHtml,
    Adapter::ScriptCss,
    Adapter::ScriptJson,
    Adapter::ScriptText,
    Adapter::ScriptImage,
];

const SCRIPT_ADAPTERS: &[Adapter] = &[
    Adapter::ScriptModule,
    Adapter::ScriptHtml,
    Adapter::ScriptCss,
    Adapter::ScriptJson,
    Adapter::ScriptText,
    Adapter::ScriptImage,
];

const DATA_ADAPTERS: &[Adapter] = &[Adapter::DataImage, Adapter::DataAudio];

/// Loader selected by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Loader {
    /// Text file scanned with the given adapters (possibly none).
    Text(&'static [Adapter]),
    /// Binary file passed through untouched.
    Binary,
}

impl Loader {
    /// Select the loader for a file by its lowercased extension.
    pub fn for_path(path: &Path) -> Result<Self, BundleError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "html" => Ok(Self::Text(MARKUP_ADAPTERS)),
            "js" => Ok(Self::Text(SCRIPT_ADAPTERS)),
            "json" => Ok(Self::Text(DATA_ADAPTERS)),
            "css" | "txt" => Ok(Self::Text(&[])),
            "png" | "jpg" | "mp3" => Ok(Self::Binary),
            _ => Err(BundleError::UnsupportedAsset {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// Run the eager scan for `path`.
    ///
    /// Every directive's target is registered with `ctx` before this returns,
    /// so newly discovered files are queued for loading.
    pub(crate) async fn import(
        self,
        path: &Path,
        ctx: &mut DependencyContext,
    ) -> Result<Pending, BundleError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BundleError::read(path, e))?;
        let mtime = modified(path).await?;

        let adapters = match self {
            Self::Binary => {
                return Ok(Pending::Ready(ModuleData {
                    content: Content::Binary(bytes),
                    mtime,
                }));
            }
            Self::Text(adapters) => adapters,
        };

        let source = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        let directives = adapter::scan(&source, adapters);
        if directives.is_empty() {
            return Ok(Pending::Ready(ModuleData {
                content: Content::Text(source),
                mtime,
            }));
        }

        let mut splices = Vec::with_capacity(directives.len());
        for directive in directives {
            let target = ctx.import(Path::new(&directive.filename), Some(path)).await;
            splices.push(Splice { directive, target });
        }

        tracing::debug!(path = %path.display(), imports = splices.len(), "Scanned module");

        Ok(Pending::Spliced {
            source,
            mtime,
            splices,
        })
    }
}

async fn modified(path: &Path) -> Result<SystemTime, BundleError> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_err(|e| BundleError::read(path, e))
}
