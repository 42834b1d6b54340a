//! In-memory message channel between two endpoints.
//!
//! Models the browser's `postMessage` pair: each side posts whole JSON
//! messages and receives the other's in order. Either side can end the
//! connection cleanly (drop) or with an error ([`MessagePort::close_with_error`]).

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use super::{ConnectionDescriptor, Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

#[derive(Debug)]
enum PortEvent {
	Message(Value),
	Error(String),
}

/// One end of an in-memory connection.
#[derive(Debug)]
pub struct MessagePort {
	descriptor: ConnectionDescriptor,
	tx: mpsc::UnboundedSender<PortEvent>,
	rx: mpsc::UnboundedReceiver<PortEvent>,
}

impl MessagePort {
	/// Creates two connected ports. `local` faces the host page, `remote` the frame.
	pub fn pair(local: ConnectionDescriptor) -> (Self, Self) {
		let (tx_a, rx_a) = mpsc::unbounded_channel();
		let (tx_b, rx_b) = mpsc::unbounded_channel();

		let remote = ConnectionDescriptor {
			name: local.target.clone(),
			target: local.name.clone(),
			origin: local.origin.clone(),
		};

		(
			Self {
				descriptor: local,
				tx: tx_b,
				rx: rx_a,
			},
			Self {
				descriptor: remote,
				tx: tx_a,
				rx: rx_b,
			},
		)
	}

	pub fn descriptor(&self) -> &ConnectionDescriptor {
		&self.descriptor
	}

	/// Posts a message to the other end.
	pub fn send(&self, message: Value) -> Result<()> {
		self.tx
			.send(PortEvent::Message(message))
			.map_err(|_| Error::TransportError("Message port closed".to_string()))
	}

	/// Receives the next message. `None` once the other end is gone or failed.
	pub async fn recv(&mut self) -> Option<Value> {
		match self.rx.recv().await? {
			PortEvent::Message(value) => Some(value),
			PortEvent::Error(_) => None,
		}
	}

	/// Ends the connection, making the other end's read loop fail with `reason`.
	pub fn close_with_error(self, reason: impl Into<String>) {
		let _ = self.tx.send(PortEvent::Error(reason.into()));
	}

	pub fn into_parts(self) -> (MessagePortSender, MessagePortReceiver, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(
			MessagePortSender { tx: self.tx },
			MessagePortReceiver { rx: self.rx, message_tx },
			message_rx,
		)
	}

	pub fn into_transport_parts(self) -> TransportParts {
		let descriptor = self.descriptor.clone();
		let (sender, receiver, message_rx) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
			descriptor,
		}
	}
}

pub struct MessagePortSender {
	tx: mpsc::UnboundedSender<PortEvent>,
}

impl Transport for MessagePortSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let sent = self
			.tx
			.send(PortEvent::Message(message))
			.map_err(|_| Error::TransportError("Message port closed".to_string()));
		Box::pin(async move { sent })
	}
}

pub struct MessagePortReceiver {
	rx: mpsc::UnboundedReceiver<PortEvent>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for MessagePortReceiver {
	fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			while let Some(event) = self.rx.recv().await {
				match event {
					PortEvent::Message(value) => {
						if self.message_tx.send(value).is_err() {
							return Ok(());
						}
					}
					PortEvent::Error(reason) => return Err(Error::TransportError(reason)),
				}
			}
			Ok(())
		})
	}
}
