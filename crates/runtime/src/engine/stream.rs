//! Terminal stage: correlates requests with response frames on the RPC sub-channel.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use inpage_protocol::{Id, Message, Request, Response};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{BoxFuture, Middleware, Next};
use crate::error::{Error, Result};
use crate::mux::{SubChannelReceiver, SubChannelSender};

struct PendingRequest {
	tx: oneshot::Sender<Result<Response>>,
	method: String,
	created_at: Instant,
}

#[derive(Default)]
struct PendingState {
	requests: HashMap<Id, PendingRequest>,
	/// Once set, no new request can register.
	closed: Option<String>,
}

/// Requests written to the stream and still waiting for their response.
#[derive(Clone, Default)]
pub struct PendingRequests {
	inner: Arc<Mutex<PendingState>>,
}

impl PendingRequests {
	pub fn new() -> Self {
		Self::default()
	}

	fn register(&self, id: Id, method: &str) -> Result<oneshot::Receiver<Result<Response>>> {
		let mut state = self.inner.lock();
		if let Some(reason) = &state.closed {
			return Err(Error::Disconnected(reason.clone()));
		}
		if state.requests.contains_key(&id) {
			return Err(Error::Internal(format!("Request id {id} is already pending")));
		}
		let (tx, rx) = oneshot::channel();
		state.requests.insert(
			id,
			PendingRequest {
				tx,
				method: method.to_string(),
				created_at: Instant::now(),
			},
		);
		Ok(rx)
	}

	fn remove(&self, id: &Id) -> bool {
		self.inner.lock().requests.remove(id).is_some()
	}

	/// Completes the request matching `response.id`. Returns false if nothing was waiting for it.
	pub fn resolve(&self, response: Response) -> bool {
		let Some(id) = response.id.clone() else {
			return false;
		};
		let Some(pending) = self.inner.lock().requests.remove(&id) else {
			return false;
		};
		tracing::trace!(
			%id,
			method = %pending.method,
			elapsed_ms = elapsed_ms(pending.created_at),
			"Response matched"
		);
		let _ = pending.tx.send(Ok(response));
		true
	}

	/// Rejects every pending request and refuses new ones.
	///
	/// Only the first call's reason sticks; later calls still drain anything pending.
	pub fn close(&self, reason: &str) {
		let drained: Vec<_> = {
			let mut state = self.inner.lock();
			state.closed.get_or_insert_with(|| reason.to_string());
			state.requests.drain().collect()
		};

		if !drained.is_empty() {
			tracing::debug!(count = drained.len(), reason, "Rejecting pending requests");
		}
		for (_, pending) in drained {
			let _ = pending.tx.send(Err(Error::Disconnected(reason.to_string())));
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed.is_some()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().requests.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn pending_ids(&self) -> Vec<Id> {
		self.inner.lock().requests.keys().cloned().collect()
	}
}

fn elapsed_ms(since: Instant) -> u64 {
	u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Drops the pending entry when a [`ResponseFuture`] is dropped before completion.
struct CancelGuard {
	id: Id,
	pending: PendingRequests,
	completed: bool,
}

impl CancelGuard {
	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.pending.remove(&self.id) {
			tracing::debug!(id = %self.id, "Removed abandoned pending request");
		}
	}
}

/// Resolves with the response frame matching a dispatched request.
pub struct ResponseFuture {
	rx: oneshot::Receiver<Result<Response>>,
	guard: CancelGuard,
}

impl ResponseFuture {
	pub fn id(&self) -> &Id {
		&self.guard.id
	}
}

impl Future for ResponseFuture {
	type Output = Result<Response>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Writes requests to the RPC sub-channel and matches responses back by id.
pub struct StreamBridge {
	sender: SubChannelSender,
	pending: PendingRequests,
}

impl StreamBridge {
	pub fn new(sender: SubChannelSender) -> Self {
		Self {
			sender,
			pending: PendingRequests::new(),
		}
	}

	pub fn pending(&self) -> &PendingRequests {
		&self.pending
	}

	/// Registers `request` and writes it to the stream.
	///
	/// The entry is registered before the write, so a fast response cannot be missed.
	/// If the write fails, the entry is removed again and the error returned.
	pub fn dispatch(&self, request: Request) -> Result<ResponseFuture> {
		let Some(id) = request.id.clone() else {
			return Err(Error::Internal(format!(
				"Request for '{}' reached the stream without an id",
				request.method
			)));
		};

		let rx = self.pending.register(id.clone(), &request.method)?;
		let guard = CancelGuard {
			id,
			pending: self.pending.clone(),
			completed: false,
		};

		let payload = serde_json::to_value(&request)?;
		self.sender.send(payload)?;

		Ok(ResponseFuture { rx, guard })
	}

	pub fn resolve(&self, response: Response) -> bool {
		self.pending.resolve(response)
	}

	pub fn reject_all(&self, reason: &str) {
		self.pending.close(reason);
	}

	/// Reads the sub-channel until it ends.
	///
	/// Responses resolve pending requests; unmatched ones are dropped. Requests
	/// without a pending counterpart are wallet-originated notifications and go
	/// to `notifications`. When the channel ends, everything still pending is rejected.
	pub async fn run(&self, mut receiver: SubChannelReceiver, notifications: mpsc::UnboundedSender<Request>) {
		while let Some(payload) = receiver.recv().await {
			match Message::from_value(payload) {
				Message::Response(response) => {
					let id = response.id.clone();
					if !self.resolve(response) {
						tracing::debug!(id = ?id, "Dropping response with no pending request");
					}
				}
				Message::Request(request) => {
					tracing::trace!(method = %request.method, "Inbound notification");
					let _ = notifications.send(request);
				}
				Message::Unknown(value) => {
					tracing::warn!(payload = %value, "Dropping unrecognized payload on RPC stream");
				}
			}
		}
		self.pending.close("RPC stream ended");
	}
}

impl Middleware for StreamBridge {
	fn name(&self) -> &'static str {
		"stream"
	}

	fn handle<'a>(&'a self, request: Request, _next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
		let dispatched = self.dispatch(request);
		Box::pin(async move { dispatched?.await })
	}
}
