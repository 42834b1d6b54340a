//! Length-prefixed JSON over an async byte stream.
//!
//! Each message is `[u32 little-endian length][JSON bytes]`.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::{ConnectionDescriptor, Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// Upper bound on a single message, guarding against a corrupt length prefix.
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// Byte-stream transport. Split with [`into_parts`](Self::into_parts) or
/// [`into_transport_parts`](Self::into_transport_parts).
pub struct PipeTransport<W, R> {
	writer: W,
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport and the receiver its read loop forwards into.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(
			Self {
				writer,
				reader,
				message_tx,
			},
			message_rx,
		)
	}

	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(
			PipeTransportSender { writer: self.writer },
			PipeTransportReceiver {
				reader: self.reader,
				message_tx: self.message_tx,
			},
		)
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		self.into_transport_parts_with(message_rx, ConnectionDescriptor::new("pipe", "pipe"))
	}

	pub fn into_transport_parts_with(
		self,
		message_rx: mpsc::UnboundedReceiver<Value>,
		descriptor: ConnectionDescriptor,
	) -> TransportParts {
		let (sender, receiver) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
			descriptor,
		}
	}

	/// Runs the read loop without splitting.
	pub async fn run(&mut self) -> Result<()> {
		read_loop(&mut self.reader, &self.message_tx).await
	}
}

pub struct PipeTransportSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin + Send> PipeTransportSender<W> {
	pub async fn send(&mut self, message: Value) -> Result<()> {
		let bytes = serde_json::to_vec(&message)?;
		if bytes.len() > MAX_MESSAGE_SIZE {
			return Err(Error::TransportError(format!(
				"Message of {} bytes exceeds limit of {MAX_MESSAGE_SIZE}",
				bytes.len()
			)));
		}
		let length = bytes.len() as u32;

		self.writer
			.write_all(&length.to_le_bytes())
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
		self.writer
			.write_all(&bytes)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write message: {e}")))?;
		self.writer
			.flush()
			.await
			.map_err(|e| Error::TransportError(format!("Failed to flush: {e}")))?;
		Ok(())
	}
}

impl<W: AsyncWrite + Unpin + Send> Transport for PipeTransportSender<W> {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(PipeTransportSender::send(self, message))
	}
}

pub struct PipeTransportReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin + Send> TransportReceiver for PipeTransportReceiver<R> {
	fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(read_loop(&mut self.reader, &self.message_tx))
	}
}

async fn read_loop<R: AsyncRead + Unpin>(reader: &mut R, message_tx: &mpsc::UnboundedSender<Value>) -> Result<()> {
	loop {
		let mut len_buf = [0u8; 4];
		let first = reader
			.read(&mut len_buf)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;
		if first == 0 {
			tracing::debug!("Pipe closed by peer");
			return Ok(());
		}
		reader
			.read_exact(&mut len_buf[first..])
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;

		let length = u32::from_le_bytes(len_buf) as usize;
		if length > MAX_MESSAGE_SIZE {
			return Err(Error::TransportError(format!(
				"Message of {length} bytes exceeds limit of {MAX_MESSAGE_SIZE}"
			)));
		}

		let mut message_buf = vec![0u8; length];
		reader
			.read_exact(&mut message_buf)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read message body: {e}")))?;

		let message: Value = serde_json::from_slice(&message_buf)?;

		if message_tx.send(message).is_err() {
			tracing::debug!("Pipe reader stopping: consumer dropped");
			return Ok(());
		}
	}
}
