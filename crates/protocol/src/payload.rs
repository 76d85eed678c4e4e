//! Outbound payload model and wire normalization.
//!
//! Plugins hand the session structured data that may contain raw bytes
//! (captured request bodies, archived values). The host only understands
//! JSON text, so every [`Payload`] is normalized into a [`serde_json::Value`]
//! before it is framed:
//!
//! - [`Payload::Bytes`] becomes UTF-8 text, or `""` when the bytes are not valid UTF-8
//! - [`Payload::Map`] is normalized key-by-key
//! - [`Payload::List`] is normalized element-wise
//! - scalars pass through unchanged
//!
//! Non-finite floats have no JSON representation and fail with
//! [`ProtocolError::Serialization`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{ProtocolError, Result};

/// Structured value sent to the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
	#[default]
	Null,
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	String(String),
	/// Raw bytes, sent as (lossy) UTF-8 text.
	Bytes(Vec<u8>),
	List(Vec<Payload>),
	/// String-keyed mapping; keys are kept sorted for stable frames.
	Map(BTreeMap<String, Payload>),
}

impl Payload {
	/// Returns an empty map payload, used as the acknowledgement body.
	pub fn empty_map() -> Self {
		Payload::Map(BTreeMap::new())
	}

	/// Converts any serializable value into a payload.
	pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
		serde_json::to_value(value)
			.map(Payload::from)
			.map_err(|e| ProtocolError::Serialization(e.to_string()))
	}

	/// Builds a map payload from key/value pairs.
	pub fn map<K, I>(entries: I) -> Self
	where
		K: Into<String>,
		I: IntoIterator<Item = (K, Payload)>,
	{
		Payload::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}

	/// Recursively normalizes this payload into JSON.
	pub fn normalize(&self) -> Result<Value> {
		Ok(match self {
			Payload::Null => Value::Null,
			Payload::Bool(b) => Value::Bool(*b),
			Payload::Int(i) => Value::Number((*i).into()),
			Payload::UInt(u) => Value::Number((*u).into()),
			Payload::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
				ProtocolError::Serialization(format!("non-finite float {f} has no JSON representation"))
			})?,
			Payload::String(s) => Value::String(s.clone()),
			Payload::Bytes(bytes) => Value::String(bytes_to_text(bytes)),
			Payload::List(items) => Value::Array(items.iter().map(Payload::normalize).collect::<Result<_>>()?),
			Payload::Map(entries) => {
				let mut map = Map::with_capacity(entries.len());
				for (key, value) in entries {
					map.insert(key.clone(), value.normalize()?);
				}
				Value::Object(map)
			}
		})
	}
}

/// Best-effort byte to text conversion. Invalid UTF-8 yields an empty string.
fn bytes_to_text(bytes: &[u8]) -> String {
	std::str::from_utf8(bytes).map(str::to_owned).unwrap_or_default()
}

impl From<Value> for Payload {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Payload::Null,
			Value::Bool(b) => Payload::Bool(b),
			Value::Number(n) => {
				if let Some(u) = n.as_u64() {
					Payload::UInt(u)
				} else if let Some(i) = n.as_i64() {
					Payload::Int(i)
				} else {
					Payload::Float(n.as_f64().unwrap_or(f64::NAN))
				}
			}
			Value::String(s) => Payload::String(s),
			Value::Array(items) => Payload::List(items.into_iter().map(Payload::from).collect()),
			Value::Object(map) => Payload::Map(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect()),
		}
	}
}

impl From<bool> for Payload {
	fn from(value: bool) -> Self {
		Payload::Bool(value)
	}
}

impl From<i64> for Payload {
	fn from(value: i64) -> Self {
		Payload::Int(value)
	}
}

impl From<u64> for Payload {
	fn from(value: u64) -> Self {
		Payload::UInt(value)
	}
}

impl From<f64> for Payload {
	fn from(value: f64) -> Self {
		Payload::Float(value)
	}
}

impl From<String> for Payload {
	fn from(value: String) -> Self {
		Payload::String(value)
	}
}

impl From<&str> for Payload {
	fn from(value: &str) -> Self {
		Payload::String(value.to_string())
	}
}

impl From<Vec<u8>> for Payload {
	fn from(value: Vec<u8>) -> Self {
		Payload::Bytes(value)
	}
}

impl From<Vec<String>> for Payload {
	fn from(value: Vec<String>) -> Self {
		Payload::List(value.into_iter().map(Payload::String).collect())
	}
}

impl From<Vec<Payload>> for Payload {
	fn from(value: Vec<Payload>) -> Self {
		Payload::List(value)
	}
}

impl From<BTreeMap<String, Payload>> for Payload {
	fn from(value: BTreeMap<String, Payload>) -> Self {
		Payload::Map(value)
	}
}
