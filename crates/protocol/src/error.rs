//! Codec errors.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while converting between payloads and wire frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
	/// A payload could not be turned into wire text.
	#[error("Serialization error: {0}")]
	Serialization(String),

	/// A wire frame was not valid JSON.
	#[error("Deserialization error: {0}")]
	Deserialization(String),
}

impl ProtocolError {
	/// Stable error name reported to the host.
	pub fn name(&self) -> &'static str {
		match self {
			ProtocolError::Serialization(_) => "SerializationError",
			ProtocolError::Deserialization(_) => "DeserializationError",
		}
	}
}
