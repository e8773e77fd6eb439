use brv_cli::cli::Cli;
use brv_cli::{commands, logging};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli.command).await {
		error!(target = "brv", error = %err, "command failed");
		std::process::exit(1);
	}
}
