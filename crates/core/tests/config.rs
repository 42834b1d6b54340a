// Loading provider configuration from disk and wiring it into a provider.

use std::io::Write;

use inpage::testing::MockFrame;
use inpage::{Provider, ProviderConfig};
use serde_json::json;

#[test]
fn loads_partial_config_file() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	write!(
		file,
		r#"{{ "maxEventListeners": 3, "jsonRpcStreamName": "rpc", "capabilities": {{ "persistentStorage": true }} }}"#
	)
	.unwrap();

	let config = ProviderConfig::from_path(file.path()).unwrap();
	assert_eq!(config.max_event_listeners, 3);
	assert_eq!(config.json_rpc_stream_name, "rpc");
	assert!(config.capabilities.persistent_storage);
	assert_eq!(config.ignored_channels, vec!["phishing".to_string()]);
}

#[test]
fn rejects_invalid_options() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("provider.json");
	std::fs::write(&path, r#"{ "maxEventListeners": 0 }"#).unwrap();

	let error = ProviderConfig::from_path(&path).unwrap_err();
	assert!(error.is_invalid_request());
	assert!(error.to_string().contains("Invalid options"));
}

#[test]
fn malformed_file_is_a_json_error() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("provider.json");
	std::fs::write(&path, "{ not json").unwrap();

	assert!(matches!(ProviderConfig::from_path(&path), Err(inpage::Error::Json(_))));
	assert!(matches!(
		ProviderConfig::from_path(dir.path().join("missing.json")),
		Err(inpage::Error::Io(_))
	));
}

#[tokio::test]
async fn custom_stream_name_and_quiet_chain() {
	let config: ProviderConfig = serde_json::from_value(json!({
		"jsonRpcStreamName": "rpc",
		"enableLoggingMiddleware": false
	}))
	.unwrap();

	let (transport, mut frame) = MockFrame::pair_on("rpc");
	let provider = Provider::builder().config(config).build(transport).unwrap();
	assert_eq!(provider.middleware_names(), vec!["id-remap", "error-normalize", "stream"]);

	let call = tokio::spawn({
		let provider = provider.clone();
		async move { provider.request(json!({"method": "eth_chainId"})).await }
	});
	let request = frame.next_request().await.unwrap();
	frame.respond(request.id, json!("0x1"));
	assert_eq!(call.await.unwrap().unwrap(), json!("0x1"));
}

#[tokio::test]
async fn invalid_config_fails_the_build() {
	let (transport, _frame) = MockFrame::pair();
	let error = Provider::builder().max_event_listeners(0).build(transport).unwrap_err();
	assert!(error.is_invalid_request());
}
