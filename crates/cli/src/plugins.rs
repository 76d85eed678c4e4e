//! Sample plugins exposed by the demo client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flipper_protocol::Payload;
use flipper_runtime::{Channel, Plugin};
use parking_lot::Mutex;
use tracing::info;

/// Answers `ping` and `echo` calls from the desktop app.
#[derive(Default)]
pub struct ExamplePlugin {
	pings: Arc<AtomicU64>,
}

impl ExamplePlugin {
	pub const ID: &'static str = "Example";
}

impl Plugin for ExamplePlugin {
	fn id(&self) -> &str {
		Self::ID
	}

	fn on_connect(&self, channel: Channel) {
		let pings = Arc::clone(&self.pings);
		channel.register_handler("ping", move |_| {
			let count = pings.fetch_add(1, Ordering::Relaxed) + 1;
			Ok(Payload::map([("message", Payload::from("pong")), ("count", Payload::from(count))]))
		});
		channel.register_handler("echo", |params| Ok(Payload::from(params)));
		info!(target = "flipper", plugin = Self::ID, "plugin connected");
	}

	fn on_disconnect(&self) {
		info!(target = "flipper", plugin = Self::ID, "plugin disconnected");
	}
}

/// Background plugin that pushes a `beat` event on every [`beat`](Self::beat).
#[derive(Default)]
pub struct HeartbeatPlugin {
	channel: Mutex<Option<Channel>>,
	seq: AtomicU64,
}

impl HeartbeatPlugin {
	pub const ID: &'static str = "Heartbeat";

	/// Sends one beat while the desktop app has the plugin active.
	///
	/// Returns false when there is no channel to send on.
	pub fn beat(&self) -> bool {
		let Some(channel) = self.channel.lock().clone() else {
			return false;
		};
		let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
		channel.send_event("beat", Payload::map([("seq", Payload::from(seq))]));
		true
	}
}

impl Plugin for HeartbeatPlugin {
	fn id(&self) -> &str {
		Self::ID
	}

	fn runs_in_background(&self) -> bool {
		true
	}

	fn on_connect(&self, channel: Channel) {
		*self.channel.lock() = Some(channel);
		info!(target = "flipper", plugin = Self::ID, "plugin connected");
	}

	fn on_disconnect(&self) {
		self.channel.lock().take();
		info!(target = "flipper", plugin = Self::ID, "plugin disconnected");
	}
}
