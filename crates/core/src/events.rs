//! Provider lifecycle and notification events.
//!
//! - [`ProviderEvent`] - everything a provider announces to the embedding page
//! - [`EventBus`] - broadcast channel plus predicate-based one-shot waiters
//! - [`EventStream`] - subscriber handle that skips over lag instead of failing
//! - [`EventWaiter`] - resolves with the first matching event
//!
//! Waiters are served before broadcast subscribers, so `wait_for_event` never
//! misses an event because a slow subscriber made the channel lag.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use inpage_protocol::Request;
use inpage_runtime::{DisconnectInfo, Error, Result};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

/// Something the provider announces.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
	/// Initialization finished; the provider is talking to `chain_id`.
	Connect { chain_id: String },
	/// The connection to the frame was lost.
	Disconnect(DisconnectInfo),
	AccountsChanged(Vec<String>),
	ChainChanged {
		chain_id: String,
		network_version: Option<String>,
	},
	UnlockStateChanged { is_unlocked: bool },
	/// A request without id pushed by the frame.
	Notification(Request),
}

impl ProviderEvent {
	/// Event name as the page-facing API spells it.
	pub fn name(&self) -> &'static str {
		match self {
			ProviderEvent::Connect { .. } => "connect",
			ProviderEvent::Disconnect(_) => "disconnect",
			ProviderEvent::AccountsChanged(_) => "accountsChanged",
			ProviderEvent::ChainChanged { .. } => "chainChanged",
			ProviderEvent::UnlockStateChanged { .. } => "unlockStateChanged",
			ProviderEvent::Notification(_) => "notification",
		}
	}

	pub fn is_disconnect(&self) -> bool {
		matches!(self, ProviderEvent::Disconnect(_))
	}
}

struct WaiterEntry<E> {
	predicate: Box<dyn Fn(&E) -> bool + Send + Sync>,
	complete_tx: oneshot::Sender<E>,
}

/// Broadcast channel combined with predicate-based waiters.
pub(crate) struct EventBus<E: Clone + Send + 'static> {
	tx: broadcast::Sender<E>,
	waiters: Mutex<Vec<WaiterEntry<E>>>,
	/// Serializes emits, so every waiter sees events in emission order.
	emitting: Mutex<()>,
	max_listeners: usize,
}

impl<E: Clone + Send + 'static> EventBus<E> {
	pub fn new(capacity: usize, max_listeners: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			tx,
			waiters: Mutex::new(Vec::new()),
			emitting: Mutex::new(()),
			max_listeners,
		}
	}

	/// Delivers `event` to matching waiters first, then to every subscriber.
	///
	/// Predicates run without the waiter lock held, so they may register new waiters.
	pub fn emit(&self, event: E) {
		let _emitting = self.emitting.lock();
		let candidates = std::mem::take(&mut *self.waiters.lock());
		let mut remaining = Vec::with_capacity(candidates.len());
		for entry in candidates {
			if entry.complete_tx.is_closed() {
				continue;
			}
			if (entry.predicate)(&event) {
				let _ = entry.complete_tx.send(event.clone());
			} else {
				remaining.push(entry);
			}
		}
		self.waiters.lock().extend(remaining);
		let _ = self.tx.send(event);
	}

	/// Subscribes to events emitted from now on.
	///
	/// Going past the listener cap still subscribes, but logs a warning: it
	/// usually means handles are being leaked.
	pub fn subscribe(&self) -> broadcast::Receiver<E> {
		let rx = self.tx.subscribe();
		let count = self.tx.receiver_count();
		if count > self.max_listeners {
			tracing::warn!(
				count,
				max = self.max_listeners,
				"Possible event listener leak: more subscribers than maxEventListeners"
			);
		}
		rx
	}

	pub fn register_waiter<F>(&self, predicate: F) -> oneshot::Receiver<E>
	where
		F: Fn(&E) -> bool + Send + Sync + 'static,
	{
		let (complete_tx, complete_rx) = oneshot::channel();
		self.waiters.lock().push(WaiterEntry {
			predicate: Box::new(predicate),
			complete_tx,
		});
		complete_rx
	}

	#[cfg(test)]
	pub fn subscriber_count(&self) -> usize {
		self.tx.receiver_count()
	}

	#[cfg(test)]
	pub fn waiter_count(&self) -> usize {
		self.waiters.lock().len()
	}
}

/// Subscriber handle over the provider's events.
///
/// Lag is logged and skipped rather than surfaced as an error.
pub struct EventStream<E: Clone + Send + 'static> {
	rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> EventStream<E> {
	pub(crate) fn new(rx: broadcast::Receiver<E>) -> Self {
		Self { rx }
	}

	/// Next event, or `None` once the provider is gone.
	pub async fn recv(&mut self) -> Option<E> {
		loop {
			match self.rx.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Next already-queued event, without waiting.
	pub fn try_recv(&mut self) -> Option<E> {
		loop {
			match self.rx.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => return None,
			}
		}
	}
}

/// Resolves with the first event matching a predicate.
///
/// Await it directly to wait indefinitely, or use [`wait`](Self::wait) for a deadline.
pub struct EventWaiter<E> {
	rx: oneshot::Receiver<E>,
}

impl<E: Send + 'static> EventWaiter<E> {
	pub(crate) fn new(rx: oneshot::Receiver<E>) -> Self {
		Self { rx }
	}

	/// Waits at most `timeout`.
	///
	/// # Errors
	///
	/// - [`Error::Timeout`] if nothing matched in time
	/// - [`Error::ChannelClosed`] if the provider went away first
	pub async fn wait(self, timeout: Duration) -> Result<E> {
		tokio::time::timeout(timeout, self.rx)
			.await
			.map_err(|_| Error::Timeout(format!("No matching event within {}ms", timeout.as_millis())))?
			.map_err(|_| Error::ChannelClosed)
	}
}

impl<E: Send + 'static> Future for EventWaiter<E> {
	type Output = Result<E>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(event)) => Poll::Ready(Ok(event)),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ChannelClosed)),
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	fn connect(chain_id: &str) -> ProviderEvent {
		ProviderEvent::Connect {
			chain_id: chain_id.to_string(),
		}
	}

	#[tokio::test]
	async fn every_subscriber_sees_every_event() {
		let bus = EventBus::new(16, 10);
		let mut a = EventStream::new(bus.subscribe());
		let mut b = EventStream::new(bus.subscribe());

		bus.emit(connect("0x1"));

		assert_eq!(a.recv().await, Some(connect("0x1")));
		assert_eq!(b.recv().await, Some(connect("0x1")));
		assert_eq!(a.try_recv(), None);
	}

	#[tokio::test]
	async fn waiter_takes_first_match_only() {
		let bus = EventBus::new(16, 10);
		let waiter = EventWaiter::new(bus.register_waiter(ProviderEvent::is_disconnect));

		bus.emit(connect("0x1"));
		assert_eq!(bus.waiter_count(), 1);

		let info = DisconnectInfo {
			is_recoverable: false,
			code: 1011,
			message: "gone".to_string(),
		};
		bus.emit(ProviderEvent::Disconnect(info.clone()));
		bus.emit(ProviderEvent::Disconnect(info.clone()));

		assert_eq!(waiter.await.unwrap(), ProviderEvent::Disconnect(info));
		assert_eq!(bus.waiter_count(), 0);
	}

	#[tokio::test]
	async fn waiter_times_out() {
		let bus: EventBus<ProviderEvent> = EventBus::new(16, 10);
		let waiter = EventWaiter::new(bus.register_waiter(|_| true));
		let error = waiter.wait(Duration::from_millis(20)).await.unwrap_err();
		assert!(matches!(error, Error::Timeout(_)));
	}

	#[tokio::test]
	async fn abandoned_waiters_are_pruned() {
		let bus = EventBus::new(16, 10);
		drop(bus.register_waiter(|_: &ProviderEvent| false));
		bus.emit(connect("0x1"));
		assert_eq!(bus.waiter_count(), 0);
	}

	#[tokio::test]
	async fn predicates_can_register_more_waiters() {
		let bus = Arc::new(EventBus::new(16, 10));
		let nested = Arc::new(Mutex::new(None));
		let first = EventWaiter::new(bus.register_waiter({
			let bus = Arc::clone(&bus);
			let nested = Arc::clone(&nested);
			move |event: &ProviderEvent| {
				if nested.lock().is_none() {
					*nested.lock() = Some(bus.register_waiter(ProviderEvent::is_disconnect));
				}
				!event.is_disconnect()
			}
		}));

		bus.emit(connect("0x1"));
		assert_eq!(first.await.unwrap(), connect("0x1"));
		assert_eq!(bus.waiter_count(), 1);
	}

	#[tokio::test]
	async fn lagging_stream_skips_ahead() {
		let bus = EventBus::new(2, 10);
		let mut stream = EventStream::new(bus.subscribe());
		for i in 0..5 {
			bus.emit(connect(&format!("0x{i}")));
		}
		assert_eq!(stream.recv().await, Some(connect("0x3")));
		assert_eq!(stream.recv().await, Some(connect("0x4")));
	}

	#[tokio::test]
	async fn subscribing_past_the_cap_still_works() {
		let bus = Arc::new(EventBus::new(4, 1));
		let _first = bus.subscribe();
		let mut second = EventStream::new(bus.subscribe());
		assert_eq!(bus.subscriber_count(), 2);
		bus.emit(connect("0x1"));
		assert_eq!(second.recv().await, Some(connect("0x1")));
	}
}
