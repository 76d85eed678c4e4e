//! Flipper Protocol - wire types shared by the session runtime.
//!
//! - **Payload**: outbound value model and its normalization to JSON
//! - **Inbound**: host/plugin request shapes and frame classification
//! - **Outbound**: response, notification, and event envelopes
//!
//! The session runtime owns the transport; this crate only turns frames into
//! typed values and back.

pub mod error;
pub mod inbound;
pub mod outbound;
pub mod payload;

pub use error::{ProtocolError, Result};
pub use inbound::{HostMethod, HostRequest, Inbound, PluginMethod, PluginRequest, classify, decode};
pub use outbound::{ErrorPayload, Outbound, Response, ResponseBody};
pub use payload::Payload;
