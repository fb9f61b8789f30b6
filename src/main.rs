//! SmartPVMS Exporter.

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
use smartpvms_exporter::{Cli, Result, install_default_exporter, server};

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(err) = cli.init_tracing() {
		eprintln!("{err}");

		return ExitCode::FAILURE;
	}

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::error!(error = %err, "exporter stopped");

			ExitCode::FAILURE
		},
	}
}

async fn run(cli: Cli) -> Result<()> {
	let config = cli.resolve()?;
	let handle = install_default_exporter()?;

	tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting smartpvms_exporter");
	tracing::debug!(?config, "resolved configuration");

	server::serve(config, handle).await
}
