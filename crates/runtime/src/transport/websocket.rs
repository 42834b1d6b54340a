//! JSON text frames over a WebSocket.
//!
//! Used when the wallet frame is bridged to a socket (development relays,
//! headless test harnesses) rather than reachable through `postMessage`.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{ConnectionDescriptor, Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to `url` and returns the parts for a multiplexer.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		tracing::debug!(url, "Connecting WebSocket transport");
		let (stream, _response) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::TransportError(format!("WebSocket connect to {url} failed: {e}")))?;

		let descriptor = ConnectionDescriptor::new("embed_provider", "ws_provider").with_origin(url);
		Ok(Self::from_stream::<MaybeTlsStream<TcpStream>>(stream, descriptor))
	}

	/// Wraps an already-established WebSocket.
	pub fn from_stream<S>(stream: WebSocketStream<S>, descriptor: ConnectionDescriptor) -> TransportParts
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, source) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver { source, message_tx }),
			message_rx,
			descriptor,
		}
	}
}

pub struct WebSocketTransportSender<S> {
	sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> Transport for WebSocketTransportSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(Message::Text(text))
				.await
				.map_err(|e| Error::TransportError(format!("WebSocket send failed: {e}")))
		})
	}
}

pub struct WebSocketTransportReceiver<S> {
	source: SplitStream<WebSocketStream<S>>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<S> TransportReceiver for WebSocketTransportReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			while let Some(next) = self.source.next().await {
				let message = next.map_err(|e| Error::TransportError(format!("WebSocket read failed: {e}")))?;
				let parsed = match message {
					Message::Text(text) => serde_json::from_str::<Value>(&text),
					Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
					Message::Close(frame) => {
						tracing::debug!(?frame, "WebSocket closed by peer");
						return Ok(());
					}
					Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
				};
				let value = match parsed {
					Ok(value) => value,
					Err(error) => {
						tracing::warn!(%error, "Dropping non-JSON WebSocket message");
						continue;
					}
				};

				if self.message_tx.send(value).is_err() {
					return Ok(());
				}
			}
			Ok(())
		})
	}
}
