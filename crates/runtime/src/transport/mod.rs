//! Transport layer between the session and the host.
//!
//! A [`Connector`] opens one connection per [`Endpoint`] and hands back a
//! [`TransportParts`] pair: a [`TransportSender`] owned by the session's writer
//! task and a [`TransportReceiver`] owned by its reader task.
//!
//! - [`WebSocketConnector`]: `ws://` connection via tokio-tungstenite
//! - [`MemoryConnector`]: in-process connection driven by a [`MemoryHost`]

mod memory;
mod websocket;


use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use url::Url;

pub use memory::{MemoryConnector, MemoryFrame, MemoryHost, MemoryPeer};
pub use websocket::{WebSocketConnector, WebSocketReceiver, WebSocketSender};

/// Boxed future returned by transport trait methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	/// Full `ws://` URL including the device query parameters.
	pub url: Url,
	/// Value of the `Origin` header expected by the host.
	pub origin: String,
}

/// Frame received from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	Text(String),
	Binary(Vec<u8>),
}

/// WebSocket close code used when the session closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
	/// 1000, explicit disconnect.
	Normal,
	/// 1001, the session is being dropped.
	GoingAway,
}

impl CloseCode {
	pub fn as_u16(self) -> u16 {
		match self {
			CloseCode::Normal => 1000,
			CloseCode::GoingAway => 1001,
		}
	}
}

/// Classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
	/// A single frame failed; the connection is still open.
	Frame,
	/// The network is temporarily unreachable.
	Unreachable,
	/// An established connection dropped.
	ConnectionLost,
	/// The host refused the connection or the handshake.
	Refused,
	/// The connection was closed.
	Closed,
	/// Anything else.
	Other,
}

impl fmt::Display for TransportErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TransportErrorKind::Frame => "frame error",
			TransportErrorKind::Unreachable => "network unreachable",
			TransportErrorKind::ConnectionLost => "connection lost",
			TransportErrorKind::Refused => "connection refused",
			TransportErrorKind::Closed => "connection closed",
			TransportErrorKind::Other => "transport error",
		};
		f.write_str(name)
	}
}

/// Transport failure with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
	pub kind: TransportErrorKind,
	pub message: String,
}

impl TransportError {
	pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	pub fn closed(message: impl Into<String>) -> Self {
		Self::new(TransportErrorKind::Closed, message)
	}

	/// True when the connection survived the error and listening can resume.
	pub fn is_alive(&self) -> bool {
		self.kind == TransportErrorKind::Frame
	}

	/// True for transient conditions that are retried without consuming a
	/// reconnect attempt.
	pub fn is_always_retryable(&self) -> bool {
		self.kind == TransportErrorKind::Unreachable
	}
}

impl From<std::io::Error> for TransportError {
	fn from(err: std::io::Error) -> Self {
		use std::io::ErrorKind;

		let kind = match err.kind() {
			ErrorKind::NetworkUnreachable | ErrorKind::HostUnreachable | ErrorKind::NetworkDown => {
				TransportErrorKind::Unreachable
			}
			ErrorKind::ConnectionRefused => TransportErrorKind::Refused,
			ErrorKind::ConnectionReset
			| ErrorKind::ConnectionAborted
			| ErrorKind::BrokenPipe
			| ErrorKind::UnexpectedEof => TransportErrorKind::ConnectionLost,
			_ => TransportErrorKind::Other,
		};
		Self::new(kind, err.to_string())
	}
}

/// Outbound half of a connection.
pub trait TransportSender: Send {
	/// Sends one text frame.
	fn send_text(&mut self, text: String) -> TransportFuture<'_, Result<(), TransportError>>;

	/// Sends a close frame with the given code.
	fn close(&mut self, code: CloseCode) -> TransportFuture<'_, Result<(), TransportError>>;
}

/// Inbound half of a connection.
pub trait TransportReceiver: Send {
	/// Waits for the next frame; `None` once the connection has ended.
	///
	/// Each call is a one-shot receive. Callers re-arm by calling again.
	fn recv(&mut self) -> TransportFuture<'_, Option<Result<Frame, TransportError>>>;
}

/// Both halves of an open connection.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
}

/// Opens connections to the host.
pub trait Connector: Send + Sync {
	fn connect(&self, endpoint: Endpoint) -> TransportFuture<'_, Result<TransportParts, TransportError>>;
}
