// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod signals;
pub mod types;
pub mod watch;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build::CommandBuilder;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default, warn_if_server_without_port};
use crate::engine::ReloadController;
use crate::exec::{ProcessSupervisor, for_platform};
use crate::fs::RealFileSystem;
use crate::signals::spawn_signal_listener;
use crate::types::Platform;
use crate::watch::ChangeDetector;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file, then CLI overrides)
/// - the termination provider for this platform
/// - change detector, build invoker and process supervisor
/// - signal handling → shutdown token
pub async fn run(args: CliArgs) -> Result<()> {
    let fs = RealFileSystem;
    let (config_path, explicit) = args.config_path();
    let mut raw = load_or_default(&fs, &config_path, explicit)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    args.apply_to(&mut raw);

    let cfg = ConfigFile::try_from(raw)?;
    warn_if_server_without_port(&fs, &cfg);

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let platform = Platform::current();
    let provider = for_platform(platform);
    debug!(%platform, ?provider, "selected termination provider");

    let shutdown = CancellationToken::new();
    let signals = spawn_signal_listener(shutdown.clone());

    let spec = cfg.watch_spec()?;
    let detector = ChangeDetector::start(spec)
        .with_context(|| format!("watching {}", cfg.watch.dir.display()))?;
    let builder = CommandBuilder::new(cfg.build_cmd.clone());
    let supervisor = ProcessSupervisor::new(cfg.supervisor_options(), provider);

    let summary = ReloadController::new(builder, supervisor, detector, shutdown)
        .run()
        .await?;

    if let Err(err) = signals.await {
        warn!(error = %err, "signal listener ended abnormally");
    }
    info!(
        builds = summary.builds,
        failed_builds = summary.failed_builds,
        restarts = summary.started_pids.len(),
        "session finished"
    );
    Ok(())
}

/// Simple dry-run output: print the resolved settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("hotloop dry-run");
    println!("  watch.dir = {}", cfg.watch.dir.display());
    println!("  watch.ignore = {:?}", cfg.watch.ignore);
    println!("  watch.extensions = {:?}", cfg.watch.extensions);
    println!(
        "  watch.quiet_ms = {}, watch.max_wait_ms = {}",
        cfg.watch.quiet_ms, cfg.watch.max_wait_ms
    );
    println!();

    println!("  build: {}", cfg.build_cmd);
    if let Some(main) = &cfg.main {
        println!("  main: {}", main.display());
    }
    println!("  run: {}", cfg.run_cmd);
    if !cfg.run.env.is_empty() {
        println!("  env: {:?}", cfg.run.env);
    }
    match cfg.run.port {
        Some(port) => println!("  port: {port} (reclaim: {:?})", cfg.run.port_reclaim),
        None => println!("  port: none"),
    }
    println!("  grace_ms: {}", cfg.run.grace_ms);

    debug!("dry-run complete (nothing started)");
}
