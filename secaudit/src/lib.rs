//! secaudit CLI library: argument parsing and command dispatch.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use secaudit_core::config::AuditConfig;
use secaudit_core::observability::{self, TracingMode};
use secaudit_engine::{Auditor, WhitelistCatalog};
use std::sync::Arc;

/// Run the CLI: parse args, build the auditor, dispatch.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(if cli.verbose {
        TracingMode::Verbose
    } else {
        TracingMode::Default
    });

    let config = AuditConfig::from_env().with_cli_overrides(cli.catalog.clone(), cli.timeout, cli.sequential);
    tracing::debug!(?config, "Resolved audit configuration");

    let catalog = WhitelistCatalog::load(config.catalog_path.as_deref())
        .context("Failed to load whitelist catalog")?;
    let auditor = Auditor::new(&config, Arc::new(catalog));

    match cli.command {
        Commands::Products => commands::products::cmd_products(&auditor),
        Commands::Audit {
            products,
            recommend,
            installed_only,
            format,
            output,
        } => commands::audit::cmd_audit(
            &auditor,
            &products,
            recommend.then_some(installed_only),
            &format,
            output.as_deref(),
        ),
        Commands::Recommend {
            installed_only,
            format,
            output,
        } => commands::recommend::cmd_recommend(&auditor, installed_only, &format, output.as_deref()),
        Commands::Check {
            process,
            port,
            format,
        } => commands::check::cmd_check(&auditor, process.as_deref(), port, &format),
        Commands::Cleanup { apply } => commands::cleanup::cmd_cleanup(&auditor, apply),
    }
}
