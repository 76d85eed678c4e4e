//! Error types for the Flipper session runtime.

use flipper_protocol::{ErrorPayload, ProtocolError};
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the session runtime.
///
/// Request-level errors ([`PluginNotFound`](Error::PluginNotFound),
/// [`ConnectionNotFound`](Error::ConnectionNotFound),
/// [`MethodNotFound`](Error::MethodNotFound), [`Handler`](Error::Handler))
/// are reported to the host as error responses via [`Error::to_payload`].
#[derive(Debug, Error)]
pub enum Error {
	/// Codec failure (serialization or deserialization).
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// `init`/`deinit` named a plugin that is not registered.
	#[error("{plugin} not found for method {method}")]
	PluginNotFound { plugin: String, method: &'static str },

	/// `execute`/`isMethodSupported` named a plugin without an active channel.
	#[error("Connection {0} not found for plugin identifier")]
	ConnectionNotFound(String),

	/// The active channel has no handler with this name.
	#[error("Method {method} not found for plugin {plugin}")]
	MethodNotFound { plugin: String, method: String },

	/// A plugin handler failed.
	#[error("{name}: {message}")]
	Handler {
		/// Error type name shown by the host.
		name: String,
		/// Human-readable error message
		message: String,
		/// Optional stack trace forwarded to the host.
		stacktrace: Option<String>,
	},

	/// Transport-level error.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The connection URL could not be built.
	#[error("Invalid connection URL '{url}': {reason}")]
	InvalidUrl { url: String, reason: String },

	/// The session actor has shut down.
	#[error("Session closed")]
	SessionClosed,
}

impl Error {
	/// Shorthand for a handler failure with no stack trace.
	pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
		Error::Handler {
			name: name.into(),
			message: message.into(),
			stacktrace: None,
		}
	}

	/// Stable error name reported to the host.
	pub fn name(&self) -> &str {
		match self {
			Error::Protocol(err) => err.name(),
			Error::PluginNotFound { .. } => "PluginNotFound",
			Error::ConnectionNotFound(_) => "ConnectionNotFound",
			Error::MethodNotFound { .. } => "MethodNotFound",
			Error::Handler { name, .. } => name,
			Error::Transport(_) => "TransportError",
			Error::InvalidUrl { .. } => "InvalidUrl",
			Error::SessionClosed => "SessionClosed",
		}
	}

	/// Converts the error into the host-facing error body.
	pub fn to_payload(&self) -> ErrorPayload {
		match self {
			Error::Handler {
				name,
				message,
				stacktrace,
			} => ErrorPayload {
				message: message.clone(),
				name: name.clone(),
				stacktrace: stacktrace.clone(),
			},
			other => ErrorPayload::new(other.name(), other.to_string()),
		}
	}
}
