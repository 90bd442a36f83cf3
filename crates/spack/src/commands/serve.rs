//! `spack serve` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use spack_bundler::{Bundler, Rebuilder, watch_and_rebuild};
use spack_config::{CliSettings, Config};
use spack_server::{ArtifactStore, ServerConfig, run_server};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: ./spack.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rebuild entries when their files change (overrides config).
    #[arg(short, long)]
    watch: bool,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (rebuild timings and socket events).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the initial bundling pass
    /// fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            watch: self.watch.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let entries = config.entries();
        if entries.is_empty() {
            output.warning("No sources found");
            return Ok(());
        }

        let bundler = Bundler::new(
            config.workdir.clone(),
            config.output.filename.clone(),
            config.resolve_options(true),
        );
        let built = bundler.build_once(&entries).await?;

        let store = Arc::new(ArtifactStore::new(
            entries.iter().map(|entry| entry.name.clone()).collect(),
        ));
        store.update(built.artifacts.clone());

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!("Working directory: {}", config.workdir.display()));

        if config.server.watch {
            output.info("Watch: enabled");
            let rebuilder = Rebuilder::new(bundler, entries, &built);
            let watch_store = Arc::clone(&store);
            tokio::spawn(async move {
                let rebuilt = watch_and_rebuild(rebuilder, move |artifacts| {
                    watch_store.update(artifacts);
                });
                if let Err(e) = rebuilt.await {
                    tracing::error!(error = %e, "File watcher stopped");
                }
            });
        } else {
            output.info("Watch: disabled");
        }

        let server_config = ServerConfig {
            host: config.server.host,
            port: config.server.port,
        };
        run_server(server_config, store).await?;

        Ok(())
    }
}
