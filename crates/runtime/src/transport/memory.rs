//! In-process transport.
//!
//! [`MemoryConnector::new`] returns the connector plus a [`MemoryHost`] that
//! plays the host's side: it scripts connect failures, accepts connections as
//! [`MemoryPeer`]s, and exchanges frames with the session.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
	CloseCode, Connector, Endpoint, Frame, TransportError, TransportErrorKind, TransportFuture, TransportParts,
	TransportReceiver, TransportSender,
};

/// Frame written by the session, as seen by the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryFrame {
	Text(String),
	Close(CloseCode),
}

struct HostState {
	failures: VecDeque<TransportError>,
	endpoints: Vec<Endpoint>,
	accepted: mpsc::UnboundedSender<MemoryPeer>,
}

/// Connector whose connections terminate at a [`MemoryHost`].
#[derive(Clone)]
pub struct MemoryConnector {
	state: Arc<Mutex<HostState>>,
}

impl MemoryConnector {
	pub fn new() -> (Self, MemoryHost) {
		let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
		let state = Arc::new(Mutex::new(HostState {
			failures: VecDeque::new(),
			endpoints: Vec::new(),
			accepted: accepted_tx,
		}));
		let host = MemoryHost {
			state: Arc::clone(&state),
			accepted: accepted_rx,
		};
		(Self { state }, host)
	}
}

impl Connector for MemoryConnector {
	fn connect(&self, endpoint: Endpoint) -> TransportFuture<'_, Result<TransportParts, TransportError>> {
		let result = self.open(endpoint);
		Box::pin(async move { result })
	}
}

impl MemoryConnector {
	fn open(&self, endpoint: Endpoint) -> Result<TransportParts, TransportError> {
		let mut state = self.state.lock();
		state.endpoints.push(endpoint.clone());
		if let Some(err) = state.failures.pop_front() {
			return Err(err);
		}

		let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
		let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
		let peer = MemoryPeer {
			endpoint,
			to_client: Some(to_client_tx),
			from_client: from_client_rx,
		};
		state
			.accepted
			.send(peer)
			.map_err(|_| TransportError::new(TransportErrorKind::Refused, "memory host dropped"))?;

		Ok(TransportParts {
			sender: Box::new(MemorySender { tx: from_client_tx }),
			receiver: Box::new(MemoryReceiver { rx: to_client_rx }),
		})
	}
}

/// Host side of a [`MemoryConnector`].
pub struct MemoryHost {
	state: Arc<Mutex<HostState>>,
	accepted: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryHost {
	/// Makes the next connect attempt fail with `err`. Failures queue up.
	pub fn fail_next(&self, err: TransportError) {
		self.state.lock().failures.push_back(err);
	}

	/// Number of connect attempts made so far, successful or not.
	pub fn attempts(&self) -> usize {
		self.state.lock().endpoints.len()
	}

	/// Endpoints of all connect attempts, in order.
	pub fn endpoints(&self) -> Vec<Endpoint> {
		self.state.lock().endpoints.clone()
	}

	/// Waits for the next successful connection.
	pub async fn accept(&mut self) -> Option<MemoryPeer> {
		self.accepted.recv().await
	}
}

/// One accepted connection, seen from the host.
pub struct MemoryPeer {
	endpoint: Endpoint,
	to_client: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
	from_client: mpsc::UnboundedReceiver<MemoryFrame>,
}

impl MemoryPeer {
	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	/// Delivers a text frame to the session.
	pub fn send_text(&self, text: impl Into<String>) {
		self.deliver(Ok(Frame::Text(text.into())));
	}

	/// Delivers a JSON text frame to the session.
	pub fn send_json(&self, value: &Value) {
		self.send_text(value.to_string());
	}

	/// Delivers a binary frame to the session.
	pub fn send_binary(&self, bytes: Vec<u8>) {
		self.deliver(Ok(Frame::Binary(bytes)));
	}

	/// Delivers a transport error to the session's pending receive.
	pub fn fail(&self, err: TransportError) {
		self.deliver(Err(err));
	}

	/// Ends the connection from the host side.
	pub fn close(&mut self) {
		self.to_client = None;
	}

	/// Next frame written by the session; `None` once the session dropped its sender.
	pub async fn recv(&mut self) -> Option<MemoryFrame> {
		self.from_client.recv().await
	}

	/// Next text frame parsed as JSON, skipping close frames.
	pub async fn recv_json(&mut self) -> Option<Value> {
		loop {
			match self.recv().await? {
				MemoryFrame::Text(text) => return serde_json::from_str(&text).ok(),
				MemoryFrame::Close(_) => continue,
			}
		}
	}

	/// Frame already written by the session, without waiting.
	pub fn try_recv(&mut self) -> Option<MemoryFrame> {
		self.from_client.try_recv().ok()
	}

	fn deliver(&self, frame: Result<Frame, TransportError>) {
		if let Some(tx) = &self.to_client {
			let _ = tx.send(frame);
		}
	}
}

struct MemorySender {
	tx: mpsc::UnboundedSender<MemoryFrame>,
}

impl TransportSender for MemorySender {
	fn send_text(&mut self, text: String) -> TransportFuture<'_, Result<(), TransportError>> {
		let result = self
			.tx
			.send(MemoryFrame::Text(text))
			.map_err(|_| TransportError::new(TransportErrorKind::ConnectionLost, "memory peer dropped"));
		Box::pin(async move { result })
	}

	fn close(&mut self, code: CloseCode) -> TransportFuture<'_, Result<(), TransportError>> {
		let result = self
			.tx
			.send(MemoryFrame::Close(code))
			.map_err(|_| TransportError::new(TransportErrorKind::ConnectionLost, "memory peer dropped"));
		Box::pin(async move { result })
	}
}

struct MemoryReceiver {
	rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

impl TransportReceiver for MemoryReceiver {
	fn recv(&mut self) -> TransportFuture<'_, Option<Result<Frame, TransportError>>> {
		Box::pin(async move { self.rx.recv().await })
	}
}
