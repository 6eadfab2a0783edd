pub mod audit;
pub mod logging;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::audit::AuditLog;
use crate::registry::Registry;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "vantage",
    version,
    about = "Concurrent reachability tests from remote vantage points"
)]
pub struct Cli {
    /// Path to the vantage-host registry (TOML)
    #[arg(long, default_value = "servers.toml")]
    pub registry: PathBuf,

    /// Path to the append-only audit log
    #[arg(long, default_value = "network_tests.log")]
    pub audit_log: PathBuf,

    /// Render once and exit (headless-friendly)
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // The registry is read exactly once, before any run can start. This is
    // the only fatal error class; everything after this point is surfaced
    // as a table row instead.
    let registry = Registry::load(&cli.registry).context("cannot start without a registry")?;
    let audit = AuditLog::new(&cli.audit_log);

    ui::tui::run_tui(registry, audit, cli.once)
}
