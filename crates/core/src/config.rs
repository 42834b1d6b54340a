//! Provider configuration: [`ProviderConfig`] and [`Capabilities`].

use std::path::Path;

use inpage_protocol::messages;
use inpage_runtime::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_EVENT_LISTENERS: usize = 100;
pub const DEFAULT_JSON_RPC_STREAM_NAME: &str = "provider";
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Channel carrying phishing warnings. Read and discarded by default.
pub const PHISHING_CHANNEL: &str = "phishing";

/// Host features the provider may rely on, decided by the embedder.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
	/// Whether the host can persist small values across page loads.
	#[serde(default)]
	pub persistent_storage: bool,
}

/// Settings for one [`Provider`](crate::Provider).
///
/// Every field has a default, so partial JSON documents load fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
	/// Subscribers beyond this count log a warning.
	#[serde(default = "default_max_event_listeners")]
	pub max_event_listeners: usize,
	/// Sub-channel carrying JSON-RPC traffic.
	#[serde(default = "default_json_rpc_stream_name")]
	pub json_rpc_stream_name: String,
	#[serde(default = "default_ignored_channels")]
	pub ignored_channels: Vec<String>,
	#[serde(default = "default_true")]
	pub enable_logging_middleware: bool,
	#[serde(default)]
	pub capabilities: Capabilities,
	/// Buffer size of the lifecycle event broadcast.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

fn default_max_event_listeners() -> usize {
	DEFAULT_MAX_EVENT_LISTENERS
}

fn default_json_rpc_stream_name() -> String {
	DEFAULT_JSON_RPC_STREAM_NAME.to_string()
}

fn default_ignored_channels() -> Vec<String> {
	vec![PHISHING_CHANNEL.to_string()]
}

fn default_true() -> bool {
	true
}

fn default_event_capacity() -> usize {
	DEFAULT_EVENT_CAPACITY
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			max_event_listeners: DEFAULT_MAX_EVENT_LISTENERS,
			json_rpc_stream_name: default_json_rpc_stream_name(),
			ignored_channels: default_ignored_channels(),
			enable_logging_middleware: true,
			capabilities: Capabilities::default(),
			event_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}
}

impl ProviderConfig {
	/// Loads a JSON config file. Missing fields take their defaults.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&content)?;
		tracing::debug!(path = %path.display(), "Loaded provider config");
		config.validate()?;
		Ok(config)
	}

	/// Rejects settings the provider cannot run with.
	pub fn validate(&self) -> Result<()> {
		if self.max_event_listeners == 0 {
			return Err(Error::invalid_request(
				messages::errors::invalid_options(self.max_event_listeners),
				None,
			));
		}
		if self.json_rpc_stream_name.is_empty() {
			return Err(Error::invalid_request("JSON-RPC stream name must not be empty", None));
		}
		if self.ignored_channels.contains(&self.json_rpc_stream_name) {
			return Err(Error::invalid_request(
				format!("Channel '{}' cannot be both the RPC stream and ignored", self.json_rpc_stream_name),
				None,
			));
		}
		if self.event_capacity == 0 {
			return Err(Error::invalid_request("Event capacity must be at least 1", None));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn partial_documents_take_defaults() {
		let config: ProviderConfig = serde_json::from_value(json!({"maxEventListeners": 5})).unwrap();
		assert_eq!(config.max_event_listeners, 5);
		assert_eq!(config.json_rpc_stream_name, "provider");
		assert_eq!(config.ignored_channels, vec!["phishing".to_string()]);
		assert!(config.enable_logging_middleware);
		assert!(!config.capabilities.persistent_storage);
		assert_eq!(config.event_capacity, 256);
	}

	#[test]
	fn empty_document_equals_default() {
		let config: ProviderConfig = serde_json::from_value(json!({})).unwrap();
		assert_eq!(config, ProviderConfig::default());
	}

	#[test]
	fn zero_listeners_is_invalid() {
		let config = ProviderConfig {
			max_event_listeners: 0,
			..Default::default()
		};
		let error = config.validate().unwrap_err();
		assert!(error.is_invalid_request());
		assert!(error.to_string().contains("maxEventListeners: 0"));
	}

	#[test]
	fn rpc_stream_cannot_be_ignored() {
		let config = ProviderConfig {
			ignored_channels: vec!["provider".to_string()],
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
