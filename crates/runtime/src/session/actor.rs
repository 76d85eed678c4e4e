use std::ops::ControlFlow;
use std::sync::Arc;

use flipper_protocol::{Outbound, decode};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Command, ConnectionState, SessionLink, SessionStatus};
use crate::config::SessionConfig;
use crate::plugin::Plugin;
use crate::registry::PluginRegistry;
use crate::router::route;
use crate::transport::{
	CloseCode, Connector, Frame, TransportError, TransportParts, TransportReceiver, TransportSender,
};

enum WriterCommand {
	Text(String),
	Close(CloseCode),
}

struct ActiveConnection {
	outbound: mpsc::UnboundedSender<WriterCommand>,
	reader: JoinHandle<()>,
}

impl ActiveConnection {
	/// Queues a close frame behind pending writes and stops reading.
	///
	/// The writer exits on its own once the close frame is written.
	fn close(self, code: CloseCode) {
		let _ = self.outbound.send(WriterCommand::Close(code));
		self.reader.abort();
	}

	fn abandon(self) {
		self.reader.abort();
	}
}

pub(super) struct SessionActor {
	config: SessionConfig,
	connector: Arc<dyn Connector>,
	registry: PluginRegistry,
	commands: mpsc::UnboundedReceiver<Command>,
	tx: mpsc::WeakUnboundedSender<Command>,
	status: watch::Sender<SessionStatus>,
	state: ConnectionState,
	/// Bumped on every connect attempt and disconnect; events tagged with an
	/// older generation are stale.
	generation: u64,
	retry_attempts: u32,
	connection: Option<ActiveConnection>,
	connect_task: Option<JoinHandle<()>>,
	reconnect_timer: Option<JoinHandle<()>>,
}

impl SessionActor {
	pub(super) fn new(
		config: SessionConfig,
		connector: Arc<dyn Connector>,
		tx: &mpsc::UnboundedSender<Command>,
		commands: mpsc::UnboundedReceiver<Command>,
		status: watch::Sender<SessionStatus>,
		plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
	) -> Self {
		let mut registry = PluginRegistry::new(SessionLink::new(tx));
		for plugin in plugins {
			registry.register(plugin);
		}
		Self {
			config,
			connector,
			registry,
			commands,
			tx: tx.downgrade(),
			status,
			state: ConnectionState::Disconnected,
			generation: 0,
			retry_attempts: 0,
			connection: None,
			connect_task: None,
			reconnect_timer: None,
		}
	}

	pub(super) async fn run(mut self) {
		debug!(target = "flipper.session", plugins = self.registry.len(), "session started");
		if self.registry.is_empty() {
			warn!(target = "flipper.session", "session started without plugins");
		}
		while let Some(command) = self.commands.recv().await {
			if self.handle(command).is_break() {
				break;
			}
		}
		if self.state != ConnectionState::Disconnected || self.connection.is_some() {
			self.disconnect(CloseCode::GoingAway);
		}
		self.cancel_pending();
		debug!(target = "flipper.session", "session stopped");
	}

	fn handle(&mut self, command: Command) -> ControlFlow<()> {
		match command {
			Command::Connect => self.connect(),
			Command::Disconnect { code, done } => {
				self.disconnect(code);
				if let Some(done) = done {
					let _ = done.send(());
				}
			}
			Command::Shutdown => return ControlFlow::Break(()),
			Command::AddPlugin(plugin) => self.add_plugin(plugin),
			Command::Send(message) => self.send_outbound(message),
			Command::QueryPlugins(reply) => self.reply_plugins(reply),
			Command::Opened { generation, result } => self.on_opened(generation, result),
			Command::Frame { generation, frame } => {
				if self.is_current(generation) {
					self.on_frame(frame);
				}
			}
			Command::TransportFailed { generation, error } => {
				if self.is_current(generation) {
					self.on_transport_error(error);
				} else {
					debug!(target = "flipper.session", generation, error = %error, "ignoring stale transport error");
				}
			}
			Command::ReconnectDue { generation } => {
				if generation == self.generation && self.state == ConnectionState::ReconnectPending {
					self.reconnect_timer = None;
					self.start_connect();
				}
			}
		}
		ControlFlow::Continue(())
	}

	fn is_current(&self, generation: u64) -> bool {
		generation == self.generation && self.connection.is_some()
	}

	fn connect(&mut self) {
		match self.state {
			ConnectionState::Connecting | ConnectionState::Connected => {
				debug!(target = "flipper.session", state = %self.state, "connect ignored");
			}
			ConnectionState::Disconnected | ConnectionState::ReconnectPending => {
				self.cancel_pending();
				self.retry_attempts = 0;
				self.start_connect();
			}
		}
	}

	fn start_connect(&mut self) {
		let endpoint = match self.config.endpoint() {
			Ok(endpoint) => endpoint,
			Err(err) => {
				error!(target = "flipper.session", error = %err, "cannot build connection URL");
				self.set_state(ConnectionState::Disconnected);
				return;
			}
		};
		let Some(tx) = self.tx.upgrade() else {
			return;
		};

		self.generation += 1;
		let generation = self.generation;
		let connector = Arc::clone(&self.connector);
		info!(
			target = "flipper.session",
			url = %endpoint.url,
			attempt = self.retry_attempts,
			"connecting"
		);
		self.set_state(ConnectionState::Connecting);

		self.connect_task = Some(tokio::spawn(async move {
			let result = connector.connect(endpoint).await;
			let _ = tx.send(Command::Opened { generation, result });
		}));
	}

	fn on_opened(&mut self, generation: u64, result: Result<TransportParts, TransportError>) {
		if generation != self.generation || self.state != ConnectionState::Connecting {
			debug!(target = "flipper.session", generation, "dropping stale connect result");
			return;
		}
		self.connect_task = None;

		let TransportParts { sender, receiver } = match result {
			Ok(parts) => parts,
			Err(err) => {
				warn!(target = "flipper.session", error = %err, "connect failed");
				self.registry.deactivate_all();
				self.retry_or_give_up(&err);
				return;
			}
		};
		let Some(tx) = self.tx.upgrade() else {
			return;
		};

		let (outbound, outbound_rx) = mpsc::unbounded_channel();
		tokio::spawn(write_loop(sender, outbound_rx));
		let reader = tokio::spawn(read_loop(receiver, tx, generation));
		self.connection = Some(ActiveConnection { outbound, reader });

		self.retry_attempts = 0;
		info!(target = "flipper.session", "connected");
		self.set_state(ConnectionState::Connected);
	}

	fn on_frame(&mut self, frame: Frame) {
		match frame {
			Frame::Text(text) => {
				debug!(target = "flipper.session", len = text.len(), "frame received");
				let inbound = match decode(&text) {
					Ok(inbound) => inbound,
					Err(err) => {
						error!(target = "flipper.session", error = %err, "dropping undecodable frame");
						return;
					}
				};
				if let Some(response) = route(&mut self.registry, inbound) {
					debug!(
						target = "flipper.session",
						id = response.id,
						success = response.is_success(),
						"responding"
					);
					self.send_outbound(response.into());
				}
			}
			Frame::Binary(bytes) => {
				error!(target = "flipper.session", len = bytes.len(), "binary frames are not supported, dropping");
			}
		}
	}

	fn on_transport_error(&mut self, err: TransportError) {
		if err.is_alive() {
			warn!(target = "flipper.session", error = %err, "recoverable transport error");
			return;
		}
		warn!(target = "flipper.session", error = %err, "connection lost");
		if let Some(connection) = self.connection.take() {
			connection.abandon();
		}
		self.registry.deactivate_all();
		self.retry_or_give_up(&err);
	}

	fn retry_or_give_up(&mut self, err: &TransportError) {
		let policy = self.config.reconnect;
		if (policy.always_retry)(err) {
			debug!(target = "flipper.session", error = %err, "transient error, retrying without counting");
			self.schedule_reconnect();
		} else if self.retry_attempts < policy.max_attempts {
			self.retry_attempts += 1;
			self.schedule_reconnect();
		} else {
			warn!(
				target = "flipper.session",
				attempts = self.retry_attempts,
				"reconnect attempts exhausted, staying disconnected"
			);
			self.set_state(ConnectionState::Disconnected);
		}
	}

	fn schedule_reconnect(&mut self) {
		if let Some(timer) = self.reconnect_timer.take() {
			timer.abort();
		}
		let Some(tx) = self.tx.upgrade() else {
			return;
		};
		let generation = self.generation;
		let interval = self.config.reconnect.interval;
		info!(
			target = "flipper.session",
			attempt = self.retry_attempts,
			delay_ms = interval.as_millis() as u64,
			"reconnect scheduled"
		);
		self.set_state(ConnectionState::ReconnectPending);

		self.reconnect_timer = Some(tokio::spawn(async move {
			tokio::time::sleep(interval).await;
			let _ = tx.send(Command::ReconnectDue { generation });
		}));
	}

	fn disconnect(&mut self, code: CloseCode) {
		self.cancel_pending();
		if let Some(connection) = self.connection.take() {
			connection.close(code);
		}
		self.registry.disconnect_all();
		self.generation += 1;
		info!(target = "flipper.session", code = code.as_u16(), "disconnected");
		self.set_state(ConnectionState::Disconnected);
	}

	fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
		let id = plugin.id().to_string();
		self.registry.register(plugin);
		debug!(target = "flipper.session", plugin = %id, "plugin registered");
		if self.state == ConnectionState::Connected {
			self.send_outbound(Outbound::RefreshPlugins);
		}
	}

	fn reply_plugins(&self, reply: oneshot::Sender<Vec<String>>) {
		let _ = reply.send(self.registry.plugin_ids());
	}

	fn send_outbound(&mut self, message: Outbound) {
		let Some(connection) = &self.connection else {
			debug!(target = "flipper.session", "not connected, dropping outbound message");
			return;
		};
		let text = match message.encode() {
			Ok(text) => text,
			Err(err) => {
				error!(target = "flipper.session", error = %err, "failed to encode message, send abandoned");
				return;
			}
		};
		debug!(target = "flipper.session", len = text.len(), "frame queued");
		if connection.outbound.send(WriterCommand::Text(text)).is_err() {
			warn!(target = "flipper.session", "writer stopped, dropping outbound message");
		}
	}

	fn cancel_pending(&mut self) {
		if let Some(timer) = self.reconnect_timer.take() {
			timer.abort();
		}
		if let Some(task) = self.connect_task.take() {
			task.abort();
		}
	}

	fn set_state(&mut self, state: ConnectionState) {
		self.state = state;
		self.status.send_replace(SessionStatus {
			state,
			retry_attempts: self.retry_attempts,
		});
	}
}

async fn write_loop(mut sender: Box<dyn TransportSender>, mut rx: mpsc::UnboundedReceiver<WriterCommand>) {
	while let Some(command) = rx.recv().await {
		match command {
			WriterCommand::Text(text) => {
				if let Err(err) = sender.send_text(text).await {
					error!(target = "flipper.session", error = %err, "transport write error");
				}
			}
			WriterCommand::Close(code) => {
				if let Err(err) = sender.close(code).await {
					debug!(target = "flipper.session", error = %err, "close frame not delivered");
				}
				break;
			}
		}
	}
}

/// Issues one receive at a time and forwards the result to the actor.
///
/// Stops after the first error that leaves the connection dead.
async fn read_loop(mut receiver: Box<dyn TransportReceiver>, tx: mpsc::UnboundedSender<Command>, generation: u64) {
	loop {
		let (command, done) = match receiver.recv().await {
			Some(Ok(frame)) => (Command::Frame { generation, frame }, false),
			Some(Err(error)) => {
				let done = !error.is_alive();
				(Command::TransportFailed { generation, error }, done)
			}
			None => (
				Command::TransportFailed {
					generation,
					error: TransportError::closed("connection ended"),
				},
				true,
			),
		};
		if tx.send(command).is_err() || done {
			break;
		}
	}
}
