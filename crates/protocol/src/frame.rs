//! Multiplexing envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit on the underlying connection: a payload tagged with its sub-channel name.
///
/// ```text
/// { "channel": "provider", "payload": { "id": 3, "method": "eth_chainId" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
	/// Sub-channel the payload belongs to.
	pub channel: String,
	/// JSON-RPC request or response object.
	#[serde(default)]
	pub payload: Value,
}

impl Frame {
	pub fn new(channel: impl Into<String>, payload: Value) -> Self {
		Self {
			channel: channel.into(),
			payload,
		}
	}

	/// Parses a raw connection message into a frame.
	///
	/// Returns `None` for anything that is not a `{ channel: string, payload }` object.
	pub fn from_value(value: Value) -> Option<Self> {
		serde_json::from_value(value).ok()
	}

	pub fn into_value(self) -> Value {
		serde_json::json!({
			"channel": self.channel,
			"payload": self.payload,
		})
	}
}
