
use std::time::Duration;

use clap::Parser;
use flipper_runtime::{DEFAULT_ORIGIN, DEFAULT_URL_BASE, DeviceInfo, ReconnectPolicy, SessionConfig};

/// Demo Flipper client.
///
/// Connects to the desktop app and exposes the `Example` and `Heartbeat`
/// plugins until interrupted.
#[derive(Parser, Debug)]
#[command(name = "flipper-demo")]
#[command(about = "Demo Flipper client exposing sample plugins")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Desktop app address, without scheme.
	#[arg(long, env = "FLIPPER_URL_BASE", value_name = "HOST:PORT", default_value = DEFAULT_URL_BASE)]
	pub url_base: String,

	/// Origin header sent with the handshake.
	#[arg(long, env = "FLIPPER_ORIGIN", default_value = DEFAULT_ORIGIN)]
	pub origin: String,

	/// OS reported to the desktop app (detected when omitted).
	#[arg(long, env = "FLIPPER_OS")]
	pub os: Option<String>,

	/// App name reported to the desktop app (detected when omitted).
	#[arg(long, env = "FLIPPER_APP")]
	pub app: Option<String>,

	/// Device name reported to the desktop app (detected when omitted).
	#[arg(long, env = "FLIPPER_DEVICE")]
	pub device: Option<String>,

	/// Stable device id (detected when omitted).
	#[arg(long, env = "FLIPPER_DEVICE_ID")]
	pub device_id: Option<String>,

	/// Seconds between reconnect attempts.
	#[arg(long, env = "FLIPPER_RECONNECT_INTERVAL", value_name = "SECS", default_value_t = 5)]
	pub reconnect_interval: u64,

	/// Consecutive failed reconnect attempts before giving up.
	#[arg(long, env = "FLIPPER_MAX_ATTEMPTS", value_name = "N", default_value_t = 5)]
	pub max_attempts: u32,

	/// Seconds between heartbeat events.
	#[arg(long, value_name = "SECS", default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
	pub heartbeat: u64,
}

impl Cli {
	/// Device info with detected values filled in for anything not given.
	pub fn device_info(&self) -> DeviceInfo {
		let detected = DeviceInfo::detect();
		let device = self.device.clone().unwrap_or(detected.device);
		let device_id = self.device_id.clone().unwrap_or_else(|| {
			if self.device.is_some() {
				format!("{}{}", env!("CARGO_PKG_VERSION"), device)
			} else {
				detected.device_id
			}
		});
		DeviceInfo {
			os: self.os.clone().unwrap_or(detected.os),
			app: self.app.clone().unwrap_or(detected.app),
			device,
			device_id,
		}
	}

	pub fn session_config(&self) -> SessionConfig {
		SessionConfig::default()
			.with_url_base(self.url_base.clone())
			.with_origin(self.origin.clone())
			.with_device(self.device_info())
			.with_reconnect(
				ReconnectPolicy::default()
					.with_interval(Duration::from_secs(self.reconnect_interval))
					.with_max_attempts(self.max_attempts),
			)
	}

	pub fn heartbeat_interval(&self) -> Duration {
		Duration::from_secs(self.heartbeat)
	}
}
