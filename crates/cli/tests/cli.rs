//! End-to-end checks for the `inpage` binary and its commands.

use std::process::Command;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use inpage_cli::cli::{Cli, Commands};
use inpage_cli::commands;
use inpage_cli::error::CliError;
use inpage_runtime::WebSocketTransport;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

fn inpage() -> Command {
	Command::new(env!("CARGO_BIN_EXE_inpage"))
}

#[test]
fn config_command_prints_effective_config() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("provider.json");
	std::fs::write(&path, r#"{ "jsonRpcStreamName": "rpc", "ignoredChannels": [] }"#).unwrap();

	let output = inpage().arg("--config").arg(&path).arg("config").output().unwrap();
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

	let printed: Value = serde_json::from_slice(&output.stdout).unwrap();
	assert_eq!(printed["jsonRpcStreamName"], "rpc");
	assert_eq!(printed["ignoredChannels"], json!([]));
	assert_eq!(printed["maxEventListeners"], 100);
}

#[test]
fn bad_config_exits_nonzero_with_context() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("provider.json");
	std::fs::write(&path, r#"{ "maxEventListeners": 0 }"#).unwrap();

	let output = inpage().arg("--config").arg(&path).arg("config").output().unwrap();
	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("failed to load provider config"), "{stderr}");
	assert!(stderr.contains("Invalid options"), "{stderr}");
}

#[test]
fn call_arguments_parse() {
	let cli = Cli::try_parse_from(["inpage", "-vv", "--url", "ws://localhost:1", "call", "eth_getBalance", r#"["0xabc"]"#])
		.unwrap();
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.url, "ws://localhost:1");
	let Commands::Call { method, params, no_init } = cli.command else {
		panic!("expected call");
	};
	assert_eq!(method, "eth_getBalance");
	assert_eq!(params.as_deref(), Some(r#"["0xabc"]"#));
	assert!(!no_init);
}

/// Minimal frame bridge: answers the handshake, then echoes each request's params as its result.
async fn serve_bridge(listener: tokio::net::TcpListener) {
	let (stream, _) = listener.accept().await.unwrap();
	let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
	while let Some(Ok(Message::Text(text))) = ws.next().await {
		let frame: Value = serde_json::from_str(&text).unwrap();
		let request = &frame["payload"];
		let payload = match request["method"].as_str() {
			Some("wallet_getProviderState") => {
				json!({"id": request["id"], "result": {"accounts": [], "chainId": "0x1", "isUnlocked": false}})
			}
			Some("eth_fail") => json!({"id": request["id"], "error": {"code": 4100, "message": "locked"}}),
			_ => json!({"id": request["id"], "result": request["params"]}),
		};
		let reply = json!({"channel": frame["channel"], "payload": payload});
		ws.send(Message::Text(reply.to_string())).await.unwrap();
	}
}

#[tokio::test]
async fn call_round_trips_through_a_websocket_bridge() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let url = format!("ws://{}", listener.local_addr().unwrap());
	tokio::spawn(serve_bridge(listener));

	let transport = WebSocketTransport::connect(&url).await.unwrap();
	let provider = commands::build_provider(transport, commands::load_config(None).unwrap()).unwrap();
	provider.initialize().await.unwrap();
	assert_eq!(provider.chain_id().as_deref(), Some("0x1"));

	let params = commands::parse_params(Some(r#"{"echo": true}"#)).unwrap();
	let result = commands::call(&provider, "eth_echo", params).await.unwrap();
	assert_eq!(result, json!({"echo": true}));

	let error = commands::call(&provider, "eth_fail", None).await.unwrap_err();
	assert!(matches!(&error, CliError::Rpc(object) if object.code == 4100));
}
