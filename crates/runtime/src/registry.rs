//! Registered plugins and their active channels.
//!
//! Invariants:
//! - a plugin id appears at most once
//! - a channel exists iff its plugin is active
//!
//! The registry is owned by the session task; nothing here is synchronized.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::channel::Channel;
use crate::plugin::Plugin;
use crate::session::SessionLink;

pub struct PluginRegistry {
	plugins: BTreeMap<String, Arc<dyn Plugin>>,
	channels: HashMap<String, Channel>,
	link: SessionLink,
}

impl Default for PluginRegistry {
	fn default() -> Self {
		Self::new(SessionLink::detached())
	}
}

impl PluginRegistry {
	pub(crate) fn new(link: SessionLink) -> Self {
		Self {
			plugins: BTreeMap::new(),
			channels: HashMap::new(),
			link,
		}
	}

	/// Inserts or replaces a plugin by id.
	///
	/// If a plugin with the same id is active it is deactivated first, so the
	/// old instance never keeps a live channel. Returns the replaced plugin.
	pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
		let id = plugin.id().to_string();
		if self.channels.contains_key(&id) {
			tracing::debug!(plugin = %id, "re-registering active plugin, deactivating previous instance");
			self.deactivate(&id);
		}
		self.plugins.insert(id, plugin)
	}

	pub fn lookup(&self, id: &str) -> Option<&Arc<dyn Plugin>> {
		self.plugins.get(id)
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}

	/// All registered ids, sorted.
	pub fn plugin_ids(&self) -> Vec<String> {
		self.plugins.keys().cloned().collect()
	}

	/// Ids of plugins that run in the background, sorted.
	pub fn background_plugin_ids(&self) -> Vec<String> {
		self.plugins
			.iter()
			.filter(|(_, plugin)| plugin.runs_in_background())
			.map(|(id, _)| id.clone())
			.collect()
	}

	/// Creates a channel for the plugin and calls its `on_connect`.
	///
	/// Activating an already active plugin replaces its channel. Returns
	/// `None` when the id is not registered.
	pub fn activate(&mut self, id: &str) -> Option<Channel> {
		let plugin = Arc::clone(self.plugins.get(id)?);
		let channel = Channel::new(Arc::from(id), self.link.clone());
		if let Some(previous) = self.channels.insert(id.to_string(), channel.clone()) {
			previous.close();
		}
		tracing::debug!(plugin = %id, "plugin connected");
		plugin.on_connect(channel.clone());
		Some(channel)
	}

	/// Calls `on_disconnect` and removes the plugin's channel.
	///
	/// Returns false when the plugin had no active channel.
	pub fn deactivate(&mut self, id: &str) -> bool {
		if !self.channels.contains_key(id) {
			return false;
		}
		if let Some(plugin) = self.plugins.get(id) {
			plugin.on_disconnect();
		}
		if let Some(channel) = self.channels.remove(id) {
			channel.close();
		}
		tracing::debug!(plugin = %id, "plugin disconnected");
		true
	}

	/// Deactivates every active plugin.
	pub fn deactivate_all(&mut self) {
		let mut active: Vec<String> = self.channels.keys().cloned().collect();
		active.sort();
		for id in active {
			self.deactivate(&id);
		}
	}

	/// Calls `on_disconnect` on every registered plugin, active or not, and
	/// drops all channels.
	pub fn disconnect_all(&mut self) {
		for plugin in self.plugins.values() {
			plugin.on_disconnect();
		}
		for (_, channel) in self.channels.drain() {
			channel.close();
		}
	}

	pub fn active_channel(&self, id: &str) -> Option<&Channel> {
		self.channels.get(id)
	}

	pub fn is_active(&self, id: &str) -> bool {
		self.channels.contains_key(id)
	}

	/// Ids of active plugins, sorted.
	pub fn active_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.channels.keys().cloned().collect();
		ids.sort();
		ids
	}
}
