//! Scripted far end for exercising a provider without a real wallet frame.
//!
//! ```ignore
//! let (transport, mut frame) = MockFrame::pair();
//! let provider = Provider::connect(transport)?;
//! let init = tokio::spawn({ let p = provider.clone(); async move { p.initialize().await } });
//! frame.serve_handshake(InitialState { chain_id: "0x1".into(), ..Default::default() }).await;
//! ```

use std::time::Duration;

use inpage_protocol::{ErrorObject, Frame, Id, Message, Request, Response};
use inpage_runtime::{ConnectionDescriptor, MessagePort, TransportParts};
use serde_json::{Value, json};

use crate::config::DEFAULT_JSON_RPC_STREAM_NAME;
use crate::provider::GET_PROVIDER_STATE;
use crate::state::InitialState;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// The wallet frame's end of an in-memory connection.
pub struct MockFrame {
	port: MessagePort,
	channel: String,
}

impl MockFrame {
	/// Returns the host's transport and the frame end, talking on the default RPC channel.
	pub fn pair() -> (TransportParts, Self) {
		Self::pair_on(DEFAULT_JSON_RPC_STREAM_NAME)
	}

	pub fn pair_on(channel: &str) -> (TransportParts, Self) {
		let (local, port) = MessagePort::pair(ConnectionDescriptor::new("embed_provider", "iframe_provider"));
		(
			local.into_transport_parts(),
			Self {
				port,
				channel: channel.to_string(),
			},
		)
	}

	/// Next frame from the host, on any channel. `None` on close or after five seconds of silence.
	pub async fn next_frame(&mut self) -> Option<Frame> {
		let value = tokio::time::timeout(RECV_TIMEOUT, self.port.recv()).await.ok()??;
		Frame::from_value(value)
	}

	/// Next request on the RPC channel. Frames on other channels are skipped.
	pub async fn next_request(&mut self) -> Option<Request> {
		loop {
			let frame = self.next_frame().await?;
			if frame.channel != self.channel {
				continue;
			}
			if let Message::Request(request) = Message::from_value(frame.payload) {
				return Some(request);
			}
		}
	}

	/// Answers the request with `id` successfully.
	pub fn respond(&self, id: Option<Id>, result: Value) {
		self.send_payload(serde_json::to_value(Response::success(id, result)).unwrap_or(Value::Null));
	}

	pub fn respond_error(&self, id: Option<Id>, error: ErrorObject) {
		self.send_payload(serde_json::to_value(Response::failure(id, error)).unwrap_or(Value::Null));
	}

	/// Pushes a wallet notification (a request without id).
	pub fn notify(&self, method: &str, params: Value) {
		self.send_payload(json!({"jsonrpc": "2.0", "method": method, "params": params}));
	}

	/// Sends `payload` tagged with the RPC channel.
	pub fn send_payload(&self, payload: Value) {
		self.send_frame(&self.channel, payload);
	}

	pub fn send_frame(&self, channel: &str, payload: Value) {
		self.send_raw(Frame::new(channel, payload).into_value());
	}

	/// Sends `value` as-is, without channel framing.
	pub fn send_raw(&self, value: Value) {
		if let Err(error) = self.port.send(value) {
			tracing::debug!(%error, "Mock frame send after host went away");
		}
	}

	/// Waits for the handshake request and answers it with `state`. Returns the request seen.
	pub async fn serve_handshake(&mut self, state: InitialState) -> Option<Request> {
		let request = self.next_request().await?;
		assert_eq!(request.method, GET_PROVIDER_STATE, "expected the handshake first");
		self.respond(request.id.clone(), serde_json::to_value(&state).unwrap_or(Value::Null));
		Some(request)
	}

	/// Closes the connection with a transport error.
	pub fn fail(self, reason: &str) {
		self.port.close_with_error(reason);
	}

	/// Closes the connection cleanly.
	pub fn close(self) {
		drop(self);
	}
}
