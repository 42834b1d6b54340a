//! Duplex connections between the host page and the wallet frame.
//!
//! A transport is split into a sending half ([`Transport`]) and a reading half
//! ([`TransportReceiver`]) whose `run` loop forwards every inbound JSON message
//! into an unbounded channel. The multiplexer owns all three pieces via
//! [`TransportParts`].
//!
//! Implementations:
//!
//! - [`PipeTransport`]: length-prefixed JSON over any async byte stream
//! - [`MessagePort`]: in-memory JSON message channel (the `postMessage` analogue)
//! - [`WebSocketTransport`]: JSON text frames over a WebSocket

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

mod channel;
mod pipe;
mod websocket;

#[cfg(test)]
mod tests;

pub use channel::{MessagePort, MessagePortReceiver, MessagePortSender};
pub use pipe::{PipeTransport, PipeTransportReceiver, PipeTransportSender};
pub use websocket::{WebSocketTransport, WebSocketTransportReceiver, WebSocketTransportSender};

/// Sending half of a connection.
pub trait Transport: Send {
	/// Writes one JSON message to the far endpoint.
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Reading half of a connection.
pub trait TransportReceiver: Send {
	/// Reads until the connection ends, forwarding each message.
	///
	/// Returns `Ok(())` when the peer closes cleanly or the consumer goes away,
	/// and `Err` on any read or decode failure.
	fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Identifies both ends of a connection, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
	/// Local stream name (e.g. `embed_provider`).
	pub name: String,
	/// Remote stream name (e.g. `iframe_provider`).
	pub target: String,
	/// Origin the far endpoint is expected to live at, if known.
	pub origin: Option<String>,
}

impl ConnectionDescriptor {
	pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			target: target.into(),
			origin: None,
		}
	}

	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = Some(origin.into());
		self
	}
}

impl fmt::Display for ConnectionDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.name, self.target)?;
		if let Some(origin) = &self.origin {
			write!(f, " ({origin})")?;
		}
		Ok(())
	}
}

/// Everything the multiplexer needs to drive one connection.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	/// Messages forwarded by `receiver.run()`.
	pub message_rx: mpsc::UnboundedReceiver<Value>,
	pub descriptor: ConnectionDescriptor,
}
