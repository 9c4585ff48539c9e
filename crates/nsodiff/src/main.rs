mod cli;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use nsodiff_config::{controller_config, load_inventory, load_settings_from, settings_path};
use nsodiff_core::{NetconfSource, Orchestrator, ReportWriter};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, tearing down");
            on_interrupt.cancel();
        }
    });

    if let Err(err) = run(&cli, cancel).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

async fn run(cli: &Cli, cancel: CancellationToken) -> Result<(), CliError> {
    let settings_file = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from(&settings_file)?;
    cli.apply(&mut settings);
    debug!(path = %settings_file.display(), "settings loaded");

    if cli.show_config {
        output::print_output(&settings.to_toml()?, false);
        return Ok(());
    }

    let inventory = load_inventory(&cli.inventory)?;
    let mode = cli.mode();

    // Resolve controller parameters before anything touches the network.
    let controller = if mode.needs_controller() {
        let endpoint = inventory.controller.as_ref().ok_or_else(|| CliError::NoController {
            path: cli.inventory.display().to_string(),
        })?;
        Some(controller_config(endpoint, &settings)?)
    } else {
        None
    };

    let reports = ReportWriter::new(&settings.report_settings());
    info!(
        %mode,
        devices = inventory.devices.len(),
        reports = %reports.dir().display(),
        "starting run"
    );

    let orchestrator = Orchestrator::new(
        inventory.devices,
        Arc::new(NetconfSource::new(settings.netconf_settings())),
        reports,
    )
    .with_cancellation(cancel);

    let summary = orchestrator.run(mode, controller.as_ref()).await?;

    let rendered = output::render_summary(&summary, output::should_color(cli.color));
    output::print_output(&rendered, cli.quiet);
    Ok(())
}
