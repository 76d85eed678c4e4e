//! Session manager.
//!
//! A [`Session`] is a cheap handle to a single actor task that owns the plugin
//! registry, the active channels, the transport and the reconnect state. Every
//! public entry point, every transport event and every timer fire is posted to
//! the actor's command queue, so no two of them ever touch that state at once.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(SessionConfig::default(), [Arc::new(MyPlugin) as Arc<dyn Plugin>]);
//! session.connect()?;
//! session.wait_for_state(ConnectionState::Connected).await?;
//! ```

mod actor;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use flipper_protocol::Outbound;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::plugin::Plugin;
use crate::transport::{CloseCode, Connector, Frame, TransportError, TransportParts, WebSocketConnector};

use actor::SessionActor;

/// Connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	/// Idle. Initial state, and the state after an explicit disconnect or
	/// once the reconnect budget is spent.
	Disconnected,
	/// A connect attempt is in flight.
	Connecting,
	/// The transport is open and frames are being read.
	Connected,
	/// Waiting for the reconnect timer.
	ReconnectPending,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ConnectionState::Disconnected => "disconnected",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::ReconnectPending => "reconnect pending",
		};
		f.write_str(name)
	}
}

/// Snapshot published by the actor after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
	pub state: ConnectionState,
	/// Consecutive counted reconnect attempts since the last successful connection.
	pub retry_attempts: u32,
}

impl Default for SessionStatus {
	fn default() -> Self {
		Self {
			state: ConnectionState::Disconnected,
			retry_attempts: 0,
		}
	}
}

pub(crate) enum Command {
	Connect,
	Disconnect {
		code: CloseCode,
		done: Option<oneshot::Sender<()>>,
	},
	Shutdown,
	AddPlugin(Arc<dyn Plugin>),
	Send(Outbound),
	QueryPlugins(oneshot::Sender<Vec<String>>),
	Opened {
		generation: u64,
		result: std::result::Result<TransportParts, TransportError>,
	},
	Frame {
		generation: u64,
		frame: Frame,
	},
	TransportFailed {
		generation: u64,
		error: TransportError,
	},
	ReconnectDue {
		generation: u64,
	},
}

/// Back-reference from a channel to the session that owns it.
///
/// Holds a weak sender so channels kept alive by plugins never keep the
/// actor's queue open.
#[derive(Clone, Default)]
pub(crate) struct SessionLink {
	tx: Option<mpsc::WeakUnboundedSender<Command>>,
}

impl SessionLink {
	pub(crate) fn new(tx: &mpsc::UnboundedSender<Command>) -> Self {
		Self { tx: Some(tx.downgrade()) }
	}

	/// Link that drops every message.
	pub(crate) fn detached() -> Self {
		Self { tx: None }
	}

	pub(crate) fn send(&self, message: Outbound) {
		if let Some(tx) = self.tx.as_ref().and_then(mpsc::WeakUnboundedSender::upgrade) {
			let _ = tx.send(Command::Send(message));
		}
	}
}

struct SessionInner {
	commands: mpsc::UnboundedSender<Command>,
	status: watch::Receiver<SessionStatus>,
}

impl Drop for SessionInner {
	fn drop(&mut self) {
		let _ = self.commands.send(Command::Shutdown);
	}
}

/// Handle to a running session.
///
/// Clones share the same actor. When the last clone is dropped the actor
/// closes the connection with a going-away code and exits.
#[derive(Clone)]
pub struct Session {
	inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session").field("status", &self.status()).finish()
	}
}

impl Session {
	/// Creates a session that connects over WebSocket.
	///
	/// Must be called within a Tokio runtime. The session starts
	/// [`Disconnected`](ConnectionState::Disconnected); call [`connect`](Self::connect).
	pub fn new(config: SessionConfig, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
		Self::with_connector(config, plugins, Arc::new(WebSocketConnector))
	}

	/// Creates a session on a custom transport.
	pub fn with_connector(
		config: SessionConfig,
		plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
		connector: Arc<dyn Connector>,
	) -> Self {
		let (commands, rx) = mpsc::unbounded_channel();
		let (status_tx, status) = watch::channel(SessionStatus::default());

		let actor = SessionActor::new(config, connector, &commands, rx, status_tx, plugins);
		tokio::spawn(actor.run());

		Self {
			inner: Arc::new(SessionInner { commands, status }),
		}
	}

	/// Starts connecting. Ignored while already connecting or connected.
	///
	/// Resets the reconnect budget.
	pub fn connect(&self) -> Result<()> {
		self.post(Command::Connect)
	}

	/// Closes the connection with a normal closure code and calls
	/// `on_disconnect` on every registered plugin.
	///
	/// Resolves once the actor has applied the disconnect.
	pub async fn disconnect(&self) -> Result<()> {
		let (done, rx) = oneshot::channel();
		self.post(Command::Disconnect {
			code: CloseCode::Normal,
			done: Some(done),
		})?;
		rx.await.map_err(|_| Error::SessionClosed)
	}

	/// Registers a plugin, replacing any plugin with the same id.
	///
	/// While connected the host is told to refresh its plugin list.
	pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
		self.post(Command::AddPlugin(plugin))
	}

	/// Queues a raw message. Dropped unless connected.
	pub fn send(&self, message: Outbound) -> Result<()> {
		self.post(Command::Send(message))
	}

	/// Registered plugin ids, sorted.
	pub async fn plugin_ids(&self) -> Result<Vec<String>> {
		let (tx, rx) = oneshot::channel();
		self.post(Command::QueryPlugins(tx))?;
		rx.await.map_err(|_| Error::SessionClosed)
	}

	pub fn state(&self) -> ConnectionState {
		self.status().state
	}

	pub fn status(&self) -> SessionStatus {
		*self.inner.status.borrow()
	}

	/// True iff the transport is open.
	pub fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	/// Receiver notified on every status change.
	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.inner.status.clone()
	}

	/// Waits until the session reaches `state`.
	pub async fn wait_for_state(&self, state: ConnectionState) -> Result<SessionStatus> {
		let mut rx = self.subscribe();
		let status = rx
			.wait_for(|status| status.state == state)
			.await
			.map_err(|_| Error::SessionClosed)?;
		Ok(*status)
	}

	fn post(&self, command: Command) -> Result<()> {
		self.inner.commands.send(command).map_err(|_| Error::SessionClosed)
	}
}
