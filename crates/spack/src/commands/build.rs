//! `spack build` command implementation.

use std::path::PathBuf;

use clap::Args;
use spack_bundler::{Bundler, EmitReport, EmitStatus, emit};
use spack_config::Config;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: ./spack.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, bundling fails or an
    /// artifact cannot be written.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;

        let entries = config.entries();
        if entries.is_empty() {
            output.warning("No sources found");
            return Ok(());
        }

        let output_dir = self.output_dir.unwrap_or_else(|| config.output_dir());
        let bundler = Bundler::new(
            config.workdir.clone(),
            config.output.filename.clone(),
            config.resolve_options(false),
        );

        let built = bundler.build_once(&entries).await?;
        let reports = emit(&built.artifacts, &output_dir).await?;

        for report in &reports {
            match report.status {
                EmitStatus::Saved => output.success(&status_line(report)),
                EmitStatus::Unchanged => output.muted(&status_line(report)),
            }
        }
        output.info(&format!("Output: {}", output_dir.display()));

        Ok(())
    }
}

fn status_line(report: &EmitReport) -> String {
    let status = match report.status {
        EmitStatus::Saved => "Saved",
        EmitStatus::Unchanged => "No change",
    };
    format!("{}: {status}", report.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(name: &str, status: EmitStatus) -> EmitReport {
        EmitReport {
            name: name.to_owned(),
            path: PathBuf::from(format!("dist/{name}.html")),
            status,
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(&report("home", EmitStatus::Saved)), "home: Saved");
        assert_eq!(
            status_line(&report("about", EmitStatus::Unchanged)),
            "about: No change"
        );
    }

    #[tokio::test]
    async fn test_build_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.html"), "<p>hi</p>").unwrap();
        let config_path = dir.path().join("spack.toml");
        std::fs::write(&config_path, "[entries.home]\npath = \"app.html\"\n").unwrap();

        let args = BuildArgs {
            config: Some(config_path),
            output_dir: None,
            verbose: false,
        };
        args.execute().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("dist/home.html")).unwrap();
        assert!(written.contains("<p>hi</p>"));
    }
}
