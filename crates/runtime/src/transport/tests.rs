use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

#[tokio::test]
async fn pipe_send_writes_length_prefixed_json() {
	let (mut far_read, local_write) = tokio::io::duplex(1024);
	let (local_read, _far_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(local_write, local_read);
	let (mut sender, _receiver) = transport.into_parts();

	let message = json!({"channel": "provider", "payload": {"id": 1, "method": "ping"}});
	sender.send(message.clone()).await.unwrap();

	let mut len_buf = [0u8; 4];
	far_read.read_exact(&mut len_buf).await.unwrap();
	let length = u32::from_le_bytes(len_buf) as usize;

	let mut body = vec![0u8; length];
	far_read.read_exact(&mut body).await.unwrap();

	let received: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(received, message);
}

#[tokio::test]
async fn pipe_reads_messages_in_order() {
	let (_far_read, local_write) = tokio::io::duplex(4096);
	let (local_read, mut far_write) = tokio::io::duplex(4096);

	let (mut transport, mut rx) = PipeTransport::new(local_write, local_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let messages = vec![
		json!({"channel": "provider", "payload": {"id": 1, "result": "a"}}),
		json!({"channel": "provider", "payload": {"id": 2, "result": "b"}}),
		json!({"channel": "phishing", "payload": {"hostname": "evil.example"}}),
	];

	for message in &messages {
		let bytes = serde_json::to_vec(message).unwrap();
		far_write.write_all(&(bytes.len() as u32).to_le_bytes()).await.unwrap();
		far_write.write_all(&bytes).await.unwrap();
	}
	far_write.flush().await.unwrap();

	for expected in &messages {
		assert_eq!(&rx.recv().await.unwrap(), expected);
	}

	drop(far_write);
	drop(rx);
	let _ = read_task.await;
}

#[tokio::test]
async fn pipe_truncated_length_prefix_is_an_error() {
	let (_far_read, local_write) = tokio::io::duplex(1024);
	let (local_read, mut far_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(local_write, local_read);

	far_write.write_all(&[0x01, 0x02]).await.unwrap();
	far_write.flush().await.unwrap();
	drop(far_write);

	let result = transport.run().await;
	assert!(result.unwrap_err().to_string().contains("Failed to read length prefix"));
}

#[tokio::test]
async fn pipe_eof_between_messages_is_a_clean_close() {
	let (_far_read, local_write) = tokio::io::duplex(1024);
	let (local_read, mut far_write) = tokio::io::duplex(1024);

	let (mut transport, mut rx) = PipeTransport::new(local_write, local_read);

	let bytes = serde_json::to_vec(&json!({"id": 1})).unwrap();
	far_write.write_all(&(bytes.len() as u32).to_le_bytes()).await.unwrap();
	far_write.write_all(&bytes).await.unwrap();
	drop(far_write);

	transport.run().await.unwrap();
	assert_eq!(rx.recv().await.unwrap(), json!({"id": 1}));
}

#[tokio::test]
async fn pipe_rejects_oversized_length_prefix() {
	let (_far_read, local_write) = tokio::io::duplex(1024);
	let (local_read, mut far_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(local_write, local_read);

	far_write.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
	far_write.flush().await.unwrap();

	let result = transport.run().await;
	assert!(result.unwrap_err().to_string().contains("exceeds limit"));
}

#[tokio::test]
async fn message_port_delivers_both_directions() {
	let (local, mut remote) = MessagePort::pair(ConnectionDescriptor::new("embed_provider", "iframe_provider"));
	assert_eq!(remote.descriptor().name, "iframe_provider");

	let parts = local.into_transport_parts();
	let TransportParts {
		mut sender,
		mut receiver,
		mut message_rx,
		descriptor,
	} = parts;
	assert_eq!(descriptor.to_string(), "embed_provider -> iframe_provider");

	let read_task = tokio::spawn(async move { receiver.run().await });

	sender.send(json!({"hello": "frame"})).await.unwrap();
	assert_eq!(remote.recv().await.unwrap(), json!({"hello": "frame"}));

	remote.send(json!({"hello": "host"})).unwrap();
	assert_eq!(message_rx.recv().await.unwrap(), json!({"hello": "host"}));

	drop(remote);
	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn message_port_close_with_error_fails_reader() {
	let (local, remote) = MessagePort::pair(ConnectionDescriptor::new("a", "b"));
	let (_sender, mut receiver, _message_rx) = local.into_parts();

	remote.close_with_error("frame crashed");

	let error = receiver.run().await.unwrap_err();
	assert!(error.to_string().contains("frame crashed"));
	assert!(error.is_disconnected());
}

#[tokio::test]
async fn websocket_round_trip_over_loopback() {
	use futures_util::{SinkExt, StreamExt};
	use tokio_tungstenite::tungstenite::Message;

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let Some(Ok(Message::Text(text))) = ws.next().await else {
			panic!("expected a text frame");
		};
		let value: Value = serde_json::from_str(&text).unwrap();
		ws.send(Message::Text(json!({"echo": value}).to_string())).await.unwrap();
		ws.close(None).await.unwrap();
	});

	let TransportParts {
		mut sender,
		mut receiver,
		mut message_rx,
		descriptor,
	} = WebSocketTransport::connect(&format!("ws://{addr}")).await.unwrap();
	assert!(descriptor.origin.unwrap().starts_with("ws://127.0.0.1"));

	let read_task = tokio::spawn(async move { receiver.run().await });
	sender.send(json!({"ping": 1})).await.unwrap();

	assert_eq!(message_rx.recv().await.unwrap(), json!({"echo": {"ping": 1}}));
	assert!(read_task.await.unwrap().is_ok());
	server.await.unwrap();
}

#[tokio::test]
async fn websocket_skips_messages_that_are_not_json() {
	use futures_util::{SinkExt, StreamExt};
	use tokio_tungstenite::tungstenite::Message;

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		ws.send(Message::Text("keepalive".to_string())).await.unwrap();
		ws.send(Message::Binary(vec![0xff, 0x00])).await.unwrap();
		ws.send(Message::Text(json!({"after": 1}).to_string())).await.unwrap();
		ws.close(None).await.unwrap();
	});

	let TransportParts {
		mut receiver,
		mut message_rx,
		..
	} = WebSocketTransport::connect(&format!("ws://{addr}")).await.unwrap();

	receiver.run().await.unwrap();
	assert_eq!(message_rx.recv().await.unwrap(), json!({"after": 1}));
	assert!(message_rx.try_recv().is_err());
	server.await.unwrap();
}
