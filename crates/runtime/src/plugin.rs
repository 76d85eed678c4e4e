//! Plugin contract.

use crate::channel::Channel;

/// A feature exposed to the host (logs, network inspector, preferences, ...).
///
/// Plugins own their own state; the session only keeps the registration.
/// All callbacks run on the session task, so they must not block.
pub trait Plugin: Send + Sync {
	/// Unique identifier, also the host-side plugin name.
	fn id(&self) -> &str;

	/// Whether the host should connect the plugin even when its panel is not focused.
	fn runs_in_background(&self) -> bool {
		false
	}

	/// Called when the host activates the plugin. Register method handlers on
	/// `channel` here and keep it to send events later.
	fn on_connect(&self, channel: Channel);

	/// Called when the plugin is deactivated or the session disconnects.
	fn on_disconnect(&self);
}
