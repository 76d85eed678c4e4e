use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flipper_protocol::Payload;
use parking_lot::Mutex;
use serde_json::Value;

use crate::channel::Channel;
use crate::error::Error;
use crate::plugin::Plugin;

enum HandlerKind {
	Echo,
	Fail,
}

/// Plugin that records its lifecycle and handler calls.
pub(crate) struct TestPlugin {
	id: String,
	background: bool,
	handlers: Vec<(String, HandlerKind)>,
	connects: AtomicUsize,
	disconnects: AtomicUsize,
	calls: Arc<Mutex<Vec<(String, Value)>>>,
	channel: Mutex<Option<Channel>>,
}

impl TestPlugin {
	pub(crate) fn new(id: &str) -> Self {
		Self {
			id: id.to_string(),
			background: false,
			handlers: Vec::new(),
			connects: AtomicUsize::new(0),
			disconnects: AtomicUsize::new(0),
			calls: Arc::new(Mutex::new(Vec::new())),
			channel: Mutex::new(None),
		}
	}

	pub(crate) fn background(mut self) -> Self {
		self.background = true;
		self
	}

	/// Handler that records the call and echoes its params back.
	pub(crate) fn with_handler(mut self, method: &str) -> Self {
		self.handlers.push((method.to_string(), HandlerKind::Echo));
		self
	}

	/// Handler that fails with `TestError: <method> failed`.
	pub(crate) fn with_failing_handler(mut self, method: &str) -> Self {
		self.handlers.push((method.to_string(), HandlerKind::Fail));
		self
	}

	pub(crate) fn into_arc(self) -> Arc<dyn Plugin> {
		Arc::new(self)
	}

	pub(crate) fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}

	pub(crate) fn disconnects(&self) -> usize {
		self.disconnects.load(Ordering::SeqCst)
	}

	pub(crate) fn calls(&self) -> Vec<(String, Value)> {
		self.calls.lock().clone()
	}

	/// Channel from the most recent `on_connect`.
	pub(crate) fn channel(&self) -> Option<Channel> {
		self.channel.lock().clone()
	}
}

impl Plugin for TestPlugin {
	fn id(&self) -> &str {
		&self.id
	}

	fn runs_in_background(&self) -> bool {
		self.background
	}

	fn on_connect(&self, channel: Channel) {
		self.connects.fetch_add(1, Ordering::SeqCst);
		for (method, kind) in &self.handlers {
			let name = method.clone();
			match kind {
				HandlerKind::Echo => {
					let calls = Arc::clone(&self.calls);
					channel.register_handler(method.clone(), move |params: Value| {
						calls.lock().push((name.clone(), params.clone()));
						Ok(Payload::from(params))
					});
				}
				HandlerKind::Fail => {
					channel.register_handler(method.clone(), move |_| {
						Err(Error::handler("TestError", format!("{name} failed")))
					});
				}
			}
		}
		*self.channel.lock() = Some(channel);
	}

	fn on_disconnect(&self) {
		self.disconnects.fetch_add(1, Ordering::SeqCst);
	}
}
