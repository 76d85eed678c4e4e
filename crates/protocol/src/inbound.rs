//! Inbound frames sent by the host.
//!
//! The host speaks two request shapes over the same socket:
//!
//! - [`HostRequest`]: queries about the client as a whole (`getPlugins`, `getBackgroundPlugins`)
//! - [`PluginRequest`]: commands aimed at one plugin (`init`, `deinit`, `execute`, `isMethodSupported`)
//!
//! [`decode`] tries the host shape first, then the plugin shape, and falls back
//! to [`Inbound::Unrecognized`] so that frames from newer hosts never abort the
//! connection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// Host-scoped request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostMethod {
	GetPlugins,
	GetBackgroundPlugins,
}

impl HostMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			HostMethod::GetPlugins => "getPlugins",
			HostMethod::GetBackgroundPlugins => "getBackgroundPlugins",
		}
	}
}

/// Request about the client as a whole. Carries no params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRequest {
	pub id: i64,
	pub method: HostMethod,
}

/// Plugin-scoped request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginMethod {
	Init,
	Deinit,
	Execute,
	IsMethodSupported,
}

impl PluginMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			PluginMethod::Init => "init",
			PluginMethod::Deinit => "deinit",
			PluginMethod::Execute => "execute",
			PluginMethod::IsMethodSupported => "isMethodSupported",
		}
	}
}

/// Request aimed at a single plugin.
///
/// `id` is absent when the host sends `init`/`deinit` as notifications; such
/// requests are handled but never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<i64>,
	pub method: PluginMethod,
	#[serde(default)]
	pub params: Map<String, Value>,
}

impl PluginRequest {
	/// Target plugin of `init`/`deinit` (`params.plugin`).
	pub fn plugin(&self) -> &str {
		self.str_param("plugin")
	}

	/// Target plugin of `execute`/`isMethodSupported` (`params.api`).
	pub fn api(&self) -> &str {
		self.str_param("api")
	}

	/// Handler name of `execute`/`isMethodSupported` (`params.method`).
	pub fn receiver(&self) -> &str {
		self.str_param("method")
	}

	/// Handler arguments of `execute` (`params.params`), empty when missing.
	pub fn call_params(&self) -> Value {
		match self.params.get("params") {
			Some(Value::Object(map)) => Value::Object(map.clone()),
			_ => Value::Object(Map::new()),
		}
	}

	fn str_param(&self, key: &str) -> &str {
		self.params.get(key).and_then(Value::as_str).unwrap_or_default()
	}
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
	/// Host-scoped request (has `id` and a host method).
	Host(HostRequest),
	/// Plugin-scoped request.
	Plugin(PluginRequest),
	/// Anything else (forward-compatible catch-all).
	Unrecognized(Value),
}

impl Inbound {
	/// Request id, when the frame carries one.
	pub fn id(&self) -> Option<i64> {
		match self {
			Inbound::Host(req) => Some(req.id),
			Inbound::Plugin(req) => req.id,
			Inbound::Unrecognized(value) => value.get("id").and_then(Value::as_i64),
		}
	}
}

/// Parses and classifies a text frame.
///
/// Only frames that are not JSON at all are errors; well-formed JSON of an
/// unknown shape becomes [`Inbound::Unrecognized`].
pub fn decode(text: &str) -> Result<Inbound> {
	let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
	Ok(classify(value))
}

/// Classifies an already-parsed frame.
pub fn classify(value: Value) -> Inbound {
	if let Ok(request) = HostRequest::deserialize(&value) {
		return Inbound::Host(request);
	}
	if let Ok(request) = PluginRequest::deserialize(&value) {
		return Inbound::Plugin(request);
	}
	Inbound::Unrecognized(value)
}
