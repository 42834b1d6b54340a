//! Channel multiplexing over a single connection.
//!
//! Every message on the wire is a [`Frame`] `{ channel, payload }`. The
//! [`Multiplexer`] owns the connection, hands out named [`SubChannel`]s, and
//! routes inbound frames to the sub-channel registered under their tag.
//! Frames for unknown or ignored names are dropped.
//!
//! # Failure
//!
//! [`Multiplexer::run`] pumps both directions. The first failure on either side
//! (read error, write error, or peer closing) stops both pumps for good, ends
//! every sub-channel's inbound stream, and invokes the disconnect handler once.

use std::sync::Arc;

use dashmap::DashMap;
use inpage_protocol::Frame;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::transport::{ConnectionDescriptor, TransportParts};


type DisconnectHandler = Box<dyn FnOnce(Error) + Send>;

enum Route {
	Open(mpsc::UnboundedSender<Value>),
	Ignored,
}

struct Shared {
	descriptor: ConnectionDescriptor,
	outbound_tx: mpsc::UnboundedSender<Value>,
	routes: DashMap<Arc<str>, Route>,
	/// Set once, when the connection is torn down.
	closed: Mutex<Option<String>>,
	/// Wakes the pump when the host shuts the connection down.
	shutdown: Notify,
	on_disconnect: Mutex<Option<DisconnectHandler>>,
}

impl Shared {
	fn closed_reason(&self) -> Option<String> {
		self.closed.lock().clone()
	}
}

struct PumpParts {
	transport: TransportParts,
	outbound_rx: mpsc::UnboundedReceiver<Value>,
}

/// Demultiplexes one connection into named sub-channels.
pub struct Multiplexer {
	shared: Arc<Shared>,
	/// Taken by the first call to `run()`.
	pump: Mutex<Option<PumpParts>>,
}

impl Multiplexer {
	pub fn new(transport: TransportParts) -> Self {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		Self {
			shared: Arc::new(Shared {
				descriptor: transport.descriptor.clone(),
				outbound_tx,
				routes: DashMap::new(),
				closed: Mutex::new(None),
				shutdown: Notify::new(),
				on_disconnect: Mutex::new(None),
			}),
			pump: Mutex::new(Some(PumpParts { transport, outbound_rx })),
		}
	}

	pub fn descriptor(&self) -> &ConnectionDescriptor {
		&self.shared.descriptor
	}

	/// Registers a sub-channel under `name`.
	pub fn create_sub_channel(&self, name: &str) -> Result<SubChannel> {
		if let Some(reason) = self.shared.closed_reason() {
			return Err(Error::Disconnected(reason));
		}

		let name: Arc<str> = Arc::from(name);
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

		match self.shared.routes.entry(Arc::clone(&name)) {
			dashmap::mapref::entry::Entry::Occupied(_) => return Err(Error::DuplicateChannel(name.to_string())),
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(Route::Open(inbound_tx));
			}
		}

		// A close that ran after the first check has already cleared the routes.
		if let Some(reason) = self.shared.closed_reason() {
			self.shared.routes.remove(name.as_ref());
			return Err(Error::Disconnected(reason));
		}

		tracing::debug!(channel = %name, connection = %self.shared.descriptor, "Created sub-channel");

		Ok(SubChannel {
			sender: SubChannelSender {
				name,
				shared: Arc::clone(&self.shared),
			},
			inbound: inbound_rx,
			finished: false,
		})
	}

	/// Reads and discards every frame tagged `name`.
	pub fn ignore_channel(&self, name: &str) {
		self.shared.routes.insert(Arc::from(name), Route::Ignored);
	}

	/// Removes a sub-channel. Its inbound stream ends; later frames for it are dropped.
	pub fn unsubscribe(&self, name: &str) -> bool {
		self.shared.routes.remove(name).is_some()
	}

	/// Installs the handler invoked when the connection fails.
	///
	/// Runs at most once. If the connection has already failed, runs immediately.
	pub fn on_disconnect<F>(&self, handler: F)
	where
		F: FnOnce(Error) + Send + 'static,
	{
		if let Some(reason) = self.shared.closed_reason() {
			handler(Error::Disconnected(reason));
			return;
		}
		*self.shared.on_disconnect.lock() = Some(Box::new(handler));
		// Closed between the check and the install: fire now.
		if let Some(reason) = self.shared.closed_reason() {
			if let Some(handler) = self.shared.on_disconnect.lock().take() {
				handler(Error::Disconnected(reason));
			}
		}
	}

	pub fn is_closed(&self) -> bool {
		self.shared.closed.lock().is_some()
	}

	/// Tears the connection down from the host side.
	pub fn shutdown(&self, reason: &str) {
		self.close(Error::Disconnected(reason.to_string()));
	}

	/// Pumps the connection until either direction fails.
	///
	/// Can only run once per multiplexer; a second call returns [`Error::AlreadyRunning`].
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let PumpParts { transport, mut outbound_rx } = self.pump.lock().take().ok_or(Error::AlreadyRunning)?;
		let TransportParts {
			mut sender,
			mut receiver,
			mut message_rx,
			descriptor,
		} = transport;

		tracing::debug!(connection = %descriptor, "Starting connection pump");

		let mut reader: JoinHandle<Result<()>> = tokio::spawn(async move { receiver.run().await });

		let mut writer: JoinHandle<Result<()>> = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				sender.send(message).await?;
			}
			Ok(())
		});

		let failure = loop {
			tokio::select! {
				biased;
				message = message_rx.recv() => match message {
					Some(value) => self.route(value),
					None => break join_outcome(&mut reader, "reader").await,
				},
				_ = self.shared.shutdown.notified() => {
					break Error::Disconnected("Connection shut down by host".to_string());
				}
				outcome = &mut writer => break task_outcome(outcome, "writer"),
				outcome = &mut reader => {
					while let Ok(value) = message_rx.try_recv() {
						self.route(value);
					}
					break task_outcome(outcome, "reader");
				}
			}
		};

		reader.abort();
		writer.abort();

		tracing::warn!(connection = %descriptor, error = %failure, "Connection pump stopped");
		self.close(failure);
		Ok(())
	}

	fn route(&self, value: Value) {
		let Some(frame) = Frame::from_value(value) else {
			tracing::warn!(connection = %self.shared.descriptor, "Dropping malformed frame");
			return;
		};

		let mut dead = false;
		match self.shared.routes.get(frame.channel.as_str()).as_deref() {
			Some(Route::Open(tx)) => {
				tracing::trace!(channel = %frame.channel, "Routing frame");
				dead = tx.send(frame.payload).is_err();
			}
			Some(Route::Ignored) => {
				tracing::trace!(channel = %frame.channel, "Dropping frame for ignored channel");
			}
			None => {
				tracing::debug!(channel = %frame.channel, "Dropping frame for unregistered channel");
			}
		}

		if dead {
			tracing::debug!(channel = %frame.channel, "Sub-channel receiver dropped, unregistering");
			self.shared.routes.remove(frame.channel.as_str());
		}
	}

	fn close(&self, error: Error) {
		{
			let mut closed = self.shared.closed.lock();
			if closed.is_some() {
				return;
			}
			*closed = Some(error.to_string());
		}

		// Dropping the route senders ends every sub-channel's inbound stream.
		self.shared.routes.clear();
		self.shared.shutdown.notify_one();

		let handler = self.shared.on_disconnect.lock().take();
		if let Some(handler) = handler {
			handler(error);
		}
	}
}

impl Drop for Multiplexer {
	fn drop(&mut self) {
		self.shared.routes.clear();
	}
}

async fn join_outcome(handle: &mut JoinHandle<Result<()>>, side: &str) -> Error {
	task_outcome(handle.await, side)
}

fn task_outcome(outcome: std::result::Result<Result<()>, tokio::task::JoinError>, side: &str) -> Error {
	match outcome {
		Ok(Ok(())) => Error::Disconnected(format!("Connection closed ({side} finished)")),
		Ok(Err(error)) => error,
		Err(join_error) => Error::Internal(format!("Connection {side} task failed: {join_error}")),
	}
}

/// A named stream over the shared connection.
#[derive(Debug)]
pub struct SubChannel {
	sender: SubChannelSender,
	inbound: mpsc::UnboundedReceiver<Value>,
	finished: bool,
}

impl SubChannel {
	pub fn name(&self) -> &str {
		&self.sender.name
	}

	pub fn send(&self, payload: Value) -> Result<()> {
		self.sender.send(payload)
	}

	/// Next inbound payload in connection order. `None` once the channel has closed.
	pub async fn recv(&mut self) -> Option<Value> {
		if self.finished {
			return None;
		}
		let next = self.inbound.recv().await;
		if next.is_none() {
			self.finished = true;
		}
		next
	}

	/// Cloneable sending half.
	pub fn sender(&self) -> SubChannelSender {
		self.sender.clone()
	}

	pub fn split(self) -> (SubChannelSender, SubChannelReceiver) {
		(
			self.sender,
			SubChannelReceiver {
				inbound: self.inbound,
				finished: self.finished,
			},
		)
	}
}

/// Sending half of a [`SubChannel`].
#[derive(Clone)]
pub struct SubChannelSender {
	name: Arc<str>,
	shared: Arc<Shared>,
}

impl std::fmt::Debug for SubChannelSender {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SubChannelSender")
			.field("name", &self.name)
			.field("connection", &self.shared.descriptor)
			.finish()
	}
}

impl SubChannelSender {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Wraps `payload` as `{ channel, payload }` and queues it on the connection.
	pub fn send(&self, payload: Value) -> Result<()> {
		if let Some(reason) = self.shared.closed_reason() {
			return Err(Error::Disconnected(reason));
		}
		let frame = Frame::new(self.name.as_ref(), payload).into_value();
		self.shared.outbound_tx.send(frame).map_err(|_| Error::ChannelClosed)
	}
}

/// Receiving half of a [`SubChannel`].
#[derive(Debug)]
pub struct SubChannelReceiver {
	inbound: mpsc::UnboundedReceiver<Value>,
	finished: bool,
}

impl SubChannelReceiver {
	pub async fn recv(&mut self) -> Option<Value> {
		if self.finished {
			return None;
		}
		let next = self.inbound.recv().await;
		if next.is_none() {
			self.finished = true;
		}
		next
	}
}
