use clap::Parser;
use flipper_cli::{cli::Cli, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	flipper_cli::run(cli).await
}
