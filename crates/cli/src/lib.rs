pub mod cli;
pub mod logging;
pub mod plugins;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flipper_runtime::{ConnectionState, Plugin, Session};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::plugins::{ExamplePlugin, HeartbeatPlugin};

/// Runs the demo client until ctrl-c or until reconnecting gives up.
pub async fn run(cli: Cli) -> Result<()> {
	let config = cli.session_config();
	let url = config.url().context("invalid connection settings")?;
	info!(target = "flipper", %url, "starting demo client");

	let heartbeat = Arc::new(HeartbeatPlugin::default());
	let plugins: [Arc<dyn Plugin>; 2] = [Arc::new(ExamplePlugin::default()), heartbeat.clone()];
	let session = Session::new(config, plugins);
	session.connect()?;

	let mut status = session.subscribe();
	let mut ticker = tokio::time::interval(cli.heartbeat_interval());
	let shutdown = tokio::signal::ctrl_c();
	tokio::pin!(shutdown);

	let outcome = loop {
		tokio::select! {
			result = &mut shutdown => {
				result.context("failed to listen for ctrl-c")?;
				info!(target = "flipper", "interrupted");
				break Ok(());
			}
			changed = status.changed() => {
				if changed.is_err() {
					break Ok(());
				}
				let current = *status.borrow_and_update();
				info!(
					target = "flipper",
					state = %current.state,
					retry_attempts = current.retry_attempts,
					"session status"
				);
				if current.state == ConnectionState::Disconnected {
					warn!(target = "flipper", "desktop app unreachable, giving up");
					break Err(current.retry_attempts);
				}
			}
			_ = ticker.tick() => {
				heartbeat.beat();
			}
		}
	};

	session.disconnect().await?;
	if let Err(attempts) = outcome {
		bail!("could not reach the desktop app at {url} after {attempts} reconnect attempts");
	}
	Ok(())
}
