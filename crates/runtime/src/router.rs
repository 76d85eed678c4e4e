//! Request routing.
//!
//! Turns a classified inbound frame into registry operations and, when the
//! request carries an id, the response to send back.

use flipper_protocol::{HostMethod, HostRequest, Inbound, Payload, PluginMethod, PluginRequest, Response};

use crate::error::{Error, Result};
use crate::registry::PluginRegistry;

/// Routes one inbound frame. Returns the response to send, if any.
pub fn route(registry: &mut PluginRegistry, inbound: Inbound) -> Option<Response> {
	match &inbound {
		Inbound::Host(request) => Some(handle_host_request(registry, request)),
		Inbound::Plugin(request) => handle_plugin_request(registry, request),
		Inbound::Unrecognized(value) => {
			tracing::warn!(
				target = "flipper.router",
				id = ?inbound.id(),
				frame = %value,
				"ignoring unrecognized frame"
			);
			None
		}
	}
}

/// Answers `getPlugins` / `getBackgroundPlugins`.
pub fn handle_host_request(registry: &PluginRegistry, request: &HostRequest) -> Response {
	let ids = match request.method {
		HostMethod::GetPlugins => registry.plugin_ids(),
		HostMethod::GetBackgroundPlugins => registry.background_plugin_ids(),
	};
	tracing::debug!(
		target = "flipper.router",
		id = request.id,
		method = request.method.as_str(),
		count = ids.len(),
		"host request"
	);
	Response::success(request.id, ids)
}

/// Runs a plugin-scoped request.
///
/// The request is always executed; `None` is returned when it has no id to
/// correlate a response with.
pub fn handle_plugin_request(registry: &mut PluginRegistry, request: &PluginRequest) -> Option<Response> {
	let result = dispatch(registry, request);
	if let Err(err) = &result {
		tracing::debug!(
			target = "flipper.router",
			id = ?request.id,
			method = request.method.as_str(),
			error = %err,
			"plugin request failed"
		);
	}
	let id = request.id?;
	Some(match result {
		Ok(payload) => Response::success(id, payload),
		Err(err) => Response::error(id, err.to_payload()),
	})
}

fn dispatch(registry: &mut PluginRegistry, request: &PluginRequest) -> Result<Payload> {
	match request.method {
		PluginMethod::Init => {
			let plugin = request.plugin();
			registry.activate(plugin).ok_or_else(|| Error::PluginNotFound {
				plugin: plugin.to_string(),
				method: "init",
			})?;
			Ok(Payload::empty_map())
		}
		PluginMethod::Deinit => {
			let plugin = request.plugin();
			if registry.lookup(plugin).is_none() {
				return Err(Error::PluginNotFound {
					plugin: plugin.to_string(),
					method: "deinit",
				});
			}
			registry.deactivate(plugin);
			Ok(Payload::empty_map())
		}
		PluginMethod::Execute => {
			let channel = registry
				.active_channel(request.api())
				.ok_or_else(|| Error::ConnectionNotFound(request.api().to_string()))?;
			channel.invoke(request.receiver(), request.call_params())
		}
		PluginMethod::IsMethodSupported => {
			let channel = registry
				.active_channel(request.api())
				.ok_or_else(|| Error::ConnectionNotFound(request.api().to_string()))?;
			Ok(Payload::Bool(channel.has_handler(request.receiver())))
		}
	}
}
