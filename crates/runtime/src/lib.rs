//! Flipper Runtime - session, plugin registry, and request routing
//!
//! This crate keeps a client connected to the Flipper desktop app and lets
//! in-process plugins answer the app's requests:
//!
//! - **Session**: connect/reconnect state machine run by a single actor task
//! - **Registry**: registered plugins and their active channels
//! - **Channel**: per-plugin method handlers and event sending
//! - **Router**: host and plugin request dispatch
//! - **Transport**: WebSocket and in-memory connections
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   plugins    │  Plugin impls (logs, network, ...)
//! └──────┬───────┘
//!        │ on_connect(Channel)
//! ┌──────▼───────┐
//! │   Session    │  Actor: registry, channels, retry state
//! │  ┌────────┐  │
//! │  │ Router │  │  getPlugins / init / execute / ...
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  reader + writer tasks
//! │  └────────┘  │
//! └──────┬───────┘
//!        │ ws://host?os=..&app=..
//!   desktop app
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, Handler};
pub use config::{DEFAULT_ORIGIN, DEFAULT_URL_BASE, DeviceInfo, ReconnectPolicy, SessionConfig};
pub use error::{Error, Result};
pub use plugin::Plugin;
pub use registry::PluginRegistry;
pub use session::{ConnectionState, Session, SessionStatus};
pub use transport::{
	CloseCode, Connector, Endpoint, Frame, MemoryConnector, MemoryFrame, MemoryHost, MemoryPeer, TransportError,
	TransportErrorKind, TransportParts, TransportReceiver, TransportSender, WebSocketConnector,
};
