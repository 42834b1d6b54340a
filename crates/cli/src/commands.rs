//! Subcommand implementations.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use inpage::{DisconnectInfo, Params, Provider, ProviderConfig, ProviderEvent};
use inpage_runtime::{TransportParts, WebSocketTransport};
use serde_json::{Value, json};

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result, classify};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = load_config(cli.config.as_deref())?;
	match cli.command {
		Commands::Config => {
			print_json(&serde_json::to_value(&config)?)?;
			Ok(())
		}
		Commands::Call { method, params, no_init } => {
			let params = parse_params(params.as_deref())?;
			let provider = build_provider(open(&cli.url).await?, config)?;
			if !no_init {
				provider.initialize().await.map_err(classify)?;
			}
			let result = call(&provider, &method, params).await?;
			print_json(&result)
		}
		Commands::Watch { limit } => {
			let provider = build_provider(open(&cli.url).await?, config)?;
			watch(&provider, limit, &mut std::io::stdout()).await
		}
	}
}

pub fn load_config(path: Option<&Path>) -> Result<ProviderConfig> {
	match path {
		Some(path) => {
			let config = ProviderConfig::from_path(path)
				.with_context(|| format!("failed to load provider config from {}", path.display()))?;
			Ok(config)
		}
		None => Ok(ProviderConfig::default()),
	}
}

/// Parses the optional positional params argument.
pub fn parse_params(raw: Option<&str>) -> Result<Option<Params>> {
	let Some(raw) = raw else {
		return Ok(None);
	};
	let value: Value = serde_json::from_str(raw).map_err(|error| CliError::InvalidParams(error.to_string()))?;
	Params::from_value(value)
		.map(Some)
		.ok_or_else(|| CliError::InvalidParams("params must be a JSON array or object".to_string()))
}

async fn open(url: &str) -> Result<TransportParts> {
	tracing::info!(url, "Connecting to frame bridge");
	WebSocketTransport::connect(url).await.map_err(|source| CliError::Connect {
		url: url.to_string(),
		source,
	})
}

pub fn build_provider(transport: TransportParts, config: ProviderConfig) -> Result<Provider> {
	Ok(Provider::builder().config(config).build(transport)?)
}

pub async fn call(provider: &Provider, method: &str, params: Option<Params>) -> Result<Value> {
	let mut args = json!({ "method": method });
	if let Some(params) = params {
		args["params"] = params.into_value();
	}
	provider.request(args).await.map_err(classify)
}

/// Initializes the provider and writes one JSON line per event until disconnect or `limit`.
pub async fn watch<W: Write>(provider: &Provider, limit: Option<usize>, out: &mut W) -> Result<()> {
	let mut events = provider.subscribe();
	if let Err(error) = provider.initialize().await {
		tracing::warn!(%error, "Handshake failed, watching anyway");
	}

	let mut seen = 0;
	while let Some(event) = events.recv().await {
		writeln!(out, "{}", event_json(&event))?;
		seen += 1;
		if event.is_disconnect() || limit.is_some_and(|limit| seen >= limit) {
			break;
		}
	}
	Ok(())
}

pub fn event_json(event: &ProviderEvent) -> Value {
	let data = match event {
		ProviderEvent::Connect { chain_id } => json!({ "chainId": chain_id }),
		ProviderEvent::Disconnect(DisconnectInfo {
			is_recoverable,
			code,
			message,
		}) => json!({ "isRecoverable": is_recoverable, "code": code, "message": message }),
		ProviderEvent::AccountsChanged(accounts) => json!(accounts),
		ProviderEvent::ChainChanged {
			chain_id,
			network_version,
		} => json!({ "chainId": chain_id, "networkVersion": network_version }),
		ProviderEvent::UnlockStateChanged { is_unlocked } => json!({ "isUnlocked": is_unlocked }),
		ProviderEvent::Notification(request) => serde_json::to_value(request).unwrap_or(Value::Null),
	};
	json!({ "event": event.name(), "data": data })
}

fn print_json(value: &Value) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn params_must_be_structured() {
		assert_eq!(parse_params(None).unwrap(), None);
		assert!(matches!(parse_params(Some("[1, 2]")).unwrap(), Some(Params::Array(items)) if items.len() == 2));
		assert!(matches!(parse_params(Some("42")), Err(CliError::InvalidParams(_))));
		assert!(matches!(parse_params(Some("{oops")), Err(CliError::InvalidParams(_))));
	}

	#[test]
	fn events_render_with_page_names() {
		let line = event_json(&ProviderEvent::ChainChanged {
			chain_id: "0x5".to_string(),
			network_version: None,
		});
		assert_eq!(line, json!({"event": "chainChanged", "data": {"chainId": "0x5", "networkVersion": null}}));
	}
}
