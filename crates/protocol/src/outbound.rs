//! Outbound envelopes sent to the host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ProtocolError, Result};
use crate::payload::Payload;

/// Method name of the notification asking the host to re-query plugins.
pub const REFRESH_PLUGINS: &str = "refreshPlugins";

/// Method name the host expects for plugin-originated events.
pub const EXECUTE: &str = "execute";

/// Error details reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<String>,
}

impl ErrorPayload {
	pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			name: name.into(),
			stacktrace: None,
		}
	}
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
	Success(Payload),
	Error(ErrorPayload),
}

/// Reply to a host or plugin request, correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	pub id: i64,
	pub body: ResponseBody,
}

impl Response {
	pub fn success(id: i64, payload: impl Into<Payload>) -> Self {
		Self {
			id,
			body: ResponseBody::Success(payload.into()),
		}
	}

	pub fn error(id: i64, error: ErrorPayload) -> Self {
		Self {
			id,
			body: ResponseBody::Error(error),
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self.body, ResponseBody::Success(_))
	}
}

/// Any message the client sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
	/// `{id, success}` or `{id, error}`.
	Response(Response),
	/// `{method: "refreshPlugins"}`.
	RefreshPlugins,
	/// Unsolicited plugin message, `{method, params}`.
	Event { method: String, params: Payload },
}

impl Outbound {
	/// Event in the host's plugin event shape:
	/// `{method: "execute", params: {api, method, params}}`.
	pub fn plugin_event(api: &str, method: &str, params: Payload) -> Self {
		Outbound::Event {
			method: EXECUTE.to_string(),
			params: Payload::map([
				("api", Payload::from(api)),
				("method", Payload::from(method)),
				("params", params),
			]),
		}
	}

	/// Normalizes the envelope into JSON.
	pub fn to_value(&self) -> Result<Value> {
		Ok(match self {
			Outbound::Response(response) => {
				let mut map = Map::new();
				map.insert("id".to_string(), Value::from(response.id));
				match &response.body {
					ResponseBody::Success(payload) => {
						map.insert("success".to_string(), payload.normalize()?);
					}
					ResponseBody::Error(error) => {
						let error = serde_json::to_value(error).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
						map.insert("error".to_string(), error);
					}
				}
				Value::Object(map)
			}
			Outbound::RefreshPlugins => json!({ "method": REFRESH_PLUGINS }),
			Outbound::Event { method, params } => json!({
				"method": method,
				"params": params.normalize()?,
			}),
		})
	}

	/// Encodes the envelope as a JSON text frame.
	pub fn encode(&self) -> Result<String> {
		let value = self.to_value()?;
		serde_json::to_string(&value).map_err(|e| ProtocolError::Serialization(e.to_string()))
	}
}

impl From<Response> for Outbound {
	fn from(response: Response) -> Self {
		Outbound::Response(response)
	}
}
