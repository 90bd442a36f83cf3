//! Writing artifacts to the output directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::bundler::Artifact;
use crate::error::BundleError;
use crate::splitter::split;

/// Outcome of emitting one artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitStatus {
    /// Output files were (re)written.
    Saved,
    /// Existing output is at least as new as the artifact.
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitReport {
    pub name: String,
    pub path: PathBuf,
    pub status: EmitStatus,
}

/// Write every artifact under `output_dir`, skipping outputs that are
/// already up to date.
///
/// Non-monolithic artifacts also get a sibling `.js` file and, with style
/// extraction, a sibling `.css` file. A leftover `.css` sibling is removed
/// when styles stay inline.
///
/// # Errors
///
/// Returns an error if an output file or directory cannot be written.
pub async fn emit(
    artifacts: &BTreeMap<String, Artifact>,
    output_dir: &Path,
) -> Result<Vec<EmitReport>, BundleError> {
    let mut reports = Vec::with_capacity(artifacts.len());

    for (name, artifact) in artifacts {
        let path = output_dir.join(&artifact.output);
        let status = if is_stale(&path, artifact).await {
            write_artifact(&path, artifact).await?;
            tracing::info!(entry = %name, path = %path.display(), "Saved artifact");
            EmitStatus::Saved
        } else {
            tracing::debug!(entry = %name, "Artifact unchanged");
            EmitStatus::Unchanged
        };

        reports.push(EmitReport {
            name: name.clone(),
            path,
            status,
        });
    }

    Ok(reports)
}

async fn is_stale(path: &Path, artifact: &Artifact) -> bool {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(written) => written < artifact.mtime,
        Err(_) => true,
    }
}

async fn write_artifact(path: &Path, artifact: &Artifact) -> Result<(), BundleError> {
    let entry = &artifact.entry;
    let parts = split(artifact.document(), entry.monolith, entry.extract_styles);

    write_file(path, &parts.markup).await?;
    if entry.monolith {
        return Ok(());
    }

    let styles = path.with_extension("css");
    if entry.extract_styles {
        write_file(&styles, &parts.styles).await?;
    } else if let Err(e) = tokio::fs::remove_file(&styles).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %styles.display(), error = %e, "Failed to remove stale stylesheet");
    }

    write_file(&path.with_extension("js"), &parts.scripts).await
}

async fn write_file(path: &Path, contents: &str) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BundleError::write(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| BundleError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::{Duration, SystemTime};

    use crate::bundler::Entry;

    fn artifact(entry: Entry, merged: &str, mtime: SystemTime) -> Artifact {
        let output = format!("{}.html", entry.name);
        Artifact {
            source: PathBuf::from("/src/app.html"),
            content: merged.to_owned(),
            merged: merged.to_owned(),
            mtime,
            output,
            entry,
        }
    }

    fn one(artifact: Artifact) -> BTreeMap<String, Artifact> {
        BTreeMap::from([(artifact.entry.name.clone(), artifact)])
    }

    #[tokio::test]
    async fn test_emit_monolith_writes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = one(artifact(
            Entry::new("home", "app.html"),
            "<p>x</p><script>go()</script>",
            SystemTime::now(),
        ));

        let reports = emit(&artifacts, &dir.path().join("dist")).await.unwrap();

        assert_eq!(reports[0].status, EmitStatus::Saved);
        assert_eq!(
            fs::read_to_string(dir.path().join("dist/home.html")).unwrap(),
            "<p>x</p><script>go()</script>"
        );
        assert!(!dir.path().join("dist/home.js").exists());
    }

    #[tokio::test]
    async fn test_emit_split_writes_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry {
            monolith: false,
            extract_styles: true,
            ..Entry::new("home", "app.html")
        };
        let artifacts = one(artifact(
            entry,
            "<p>x</p><style>p{}</style><script>go()</script>",
            SystemTime::now(),
        ));

        emit(&artifacts, dir.path()).await.unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("home.html")).unwrap(),
            "<p>x</p>\n\n"
        );
        assert_eq!(fs::read_to_string(dir.path().join("home.css")).unwrap(), "p{}\n");
        assert_eq!(fs::read_to_string(dir.path().join("home.js")).unwrap(), "go()\n");
    }

    #[tokio::test]
    async fn test_emit_removes_stale_stylesheet() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("home.css"), "old").unwrap();
        let entry = Entry {
            monolith: false,
            ..Entry::new("home", "app.html")
        };
        let artifacts = one(artifact(entry, "<style>p{}</style>", SystemTime::now()));

        emit(&artifacts, dir.path()).await.unwrap();

        assert!(!dir.path().join("home.css").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("home.html")).unwrap(),
            "<style>p{}</style>"
        );
        assert_eq!(fs::read_to_string(dir.path().join("home.js")).unwrap(), "");
    }

    #[tokio::test]
    async fn test_emit_skips_up_to_date_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("home.html"), "kept").unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        let artifacts = one(artifact(Entry::new("home", "app.html"), "new", old));

        let reports = emit(&artifacts, dir.path()).await.unwrap();

        assert_eq!(reports[0].status, EmitStatus::Unchanged);
        assert_eq!(fs::read_to_string(dir.path().join("home.html")).unwrap(), "kept");
    }
}
