use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sitewatch::builder::CommandBuilder;
use sitewatch::config::Settings;
use sitewatch::serve::{self, ServeState, StatsRegistry};
use sitewatch::watcher::{RebuildOrchestrator, WatchTree};
use sitewatch::{log_event, publish};

/// Watch a documentation tree, rebuild it on real content changes, and serve
/// the output with live request counters.
#[derive(Parser)]
#[command(name = "sitewatch", version, about)]
struct Cli {
    /// Root of the source tree to watch and build.
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// HTTP listen port.
    #[arg(long, default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sitewatch::logging::init();

    let cli = Cli::parse();
    let settings = Settings::load()
        .context("failed to load settings")?
        .with_cli(cli.path, cli.port);
    let settings = Arc::new(settings);

    let served_root = settings.served_root();
    publish::reset_served_root(&served_root).with_context(|| {
        format!("failed to prepare served root {}", served_root.display())
    })?;

    let (mut tree, events) = WatchTree::new(&settings.watch)?;
    tree.watch_root(&settings.source_root)?;

    let builder = Arc::new(CommandBuilder::new(&settings.builder));
    let orchestrator = RebuildOrchestrator::new(settings.clone(), tree, events, builder);

    // First build before accepting traffic, so the served tree starts full.
    orchestrator.initial_build().await?;
    log_event!("main", "serving", "{}", served_root.display());

    let stats = Arc::new(StatsRegistry::new());
    let state = Arc::new(ServeState {
        served_root,
        cache_max_age: settings.http.cache_max_age,
        stats,
    });
    let server = tokio::spawn(serve::run(state, settings.bind_addr()));

    // Both sides are essential: a dead orchestrator or a dead server ends
    // the process. This is the single termination point for fatal errors.
    tokio::select! {
        result = orchestrator.run() => result?,
        result = server => result??,
    }
    Ok(())
}
