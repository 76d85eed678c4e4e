//! Channel - per-plugin handle multiplexed over the session connection.
//!
//! The registry creates one [`Channel`] each time the host activates a plugin
//! and hands it to [`Plugin::on_connect`](crate::Plugin::on_connect). The
//! plugin registers named method handlers on it and keeps a clone to push
//! events to the host.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flipper_protocol::{Outbound, Payload};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::SessionLink;

/// Method handler: receives the `execute` params and returns the success payload.
pub type Handler = Arc<dyn Fn(Value) -> Result<Payload> + Send + Sync>;

struct ChannelInner {
	plugin_id: Arc<str>,
	handlers: RwLock<HashMap<String, Handler>>,
	active: AtomicBool,
	link: SessionLink,
}

/// Handle bound to one active plugin.
///
/// Cheap to clone. Once the plugin is deactivated the channel is closed and
/// further sends are dropped.
#[derive(Clone)]
pub struct Channel {
	inner: Arc<ChannelInner>,
}

impl std::fmt::Debug for Channel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Channel")
			.field("plugin_id", &self.inner.plugin_id)
			.field("active", &self.is_active())
			.finish_non_exhaustive()
	}
}

impl Channel {
	pub(crate) fn new(plugin_id: Arc<str>, link: SessionLink) -> Self {
		Self {
			inner: Arc::new(ChannelInner {
				plugin_id,
				handlers: RwLock::new(HashMap::new()),
				active: AtomicBool::new(true),
				link,
			}),
		}
	}

	/// Id of the plugin this channel belongs to.
	pub fn plugin_id(&self) -> &str {
		&self.inner.plugin_id
	}

	/// False once the plugin has been deactivated.
	pub fn is_active(&self) -> bool {
		self.inner.active.load(Ordering::Acquire)
	}

	pub(crate) fn close(&self) {
		self.inner.active.store(false, Ordering::Release);
	}

	/// Registers `handler` under `method`, replacing any previous handler.
	pub fn register_handler<F>(&self, method: impl Into<String>, handler: F)
	where
		F: Fn(Value) -> Result<Payload> + Send + Sync + 'static,
	{
		self.inner.handlers.write().insert(method.into(), Arc::new(handler));
	}

	pub fn has_handler(&self, method: &str) -> bool {
		self.inner.handlers.read().contains_key(method)
	}

	/// Calls the handler registered under `method`.
	pub fn invoke(&self, method: &str, params: Value) -> Result<Payload> {
		// Clone out of the lock so handlers may register other handlers.
		let handler = self
			.inner
			.handlers
			.read()
			.get(method)
			.cloned()
			.ok_or_else(|| Error::MethodNotFound {
				plugin: self.plugin_id().to_string(),
				method: method.to_string(),
			})?;
		handler(params)
	}

	/// Sends `{method: <plugin id>, params: payload}` to the host.
	///
	/// Dropped silently while the session is disconnected or the channel is closed.
	pub fn send(&self, payload: impl Into<Payload>) {
		self.post(Outbound::Event {
			method: self.plugin_id().to_string(),
			params: payload.into(),
		});
	}

	/// Sends a plugin event in the host's `execute` shape:
	/// `{method: "execute", params: {api: <plugin id>, method, params}}`.
	pub fn send_event(&self, method: &str, params: impl Into<Payload>) {
		self.post(Outbound::plugin_event(self.plugin_id(), method, params.into()));
	}

	fn post(&self, message: Outbound) {
		if !self.is_active() {
			tracing::debug!(plugin = %self.plugin_id(), "dropping message from closed channel");
			return;
		}
		self.inner.link.send(message);
	}
}
