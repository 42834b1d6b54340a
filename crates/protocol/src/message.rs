//! JSON-RPC 2.0 messages carried inside [`Frame`](crate::Frame) payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
	JSONRPC_VERSION.to_string()
}

/// Request identifier.
///
/// Callers may use numbers or strings. Ids minted by the correlation engine are always numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
	Number(i64),
	String(String),
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Id::Number(n) => write!(f, "{n}"),
			Id::String(s) => write!(f, "{s:?}"),
		}
	}
}

impl From<i64> for Id {
	fn from(value: i64) -> Self {
		Id::Number(value)
	}
}

impl From<&str> for Id {
	fn from(value: &str) -> Self {
		Id::String(value.to_string())
	}
}

/// Positional or named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
	Array(Vec<Value>),
	Object(Map<String, Value>),
}

impl Params {
	/// Accepts only arrays and non-null objects.
	pub fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Array(items) => Some(Params::Array(items)),
			Value::Object(map) => Some(Params::Object(map)),
			_ => None,
		}
	}

	pub fn into_value(self) -> Value {
		match self {
			Params::Array(items) => Value::Array(items),
			Params::Object(map) => Value::Object(map),
		}
	}
}

/// JSON-RPC request or notification (a request without `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	#[serde(default = "jsonrpc_version")]
	pub jsonrpc: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Id>,
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Params>,
	/// Out-of-band fields some wallet methods expect next to `params` (e.g. `windowId`).
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Request {
	pub fn new(method: impl Into<String>, params: Option<Params>) -> Self {
		Self {
			jsonrpc: jsonrpc_version(),
			id: None,
			method: method.into(),
			params,
			extra: Map::new(),
		}
	}

	pub fn with_id(mut self, id: impl Into<Id>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn is_notification(&self) -> bool {
		self.id.is_none()
	}
}

/// The canonical error triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
	pub code: i64,
	#[serde(default)]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl ErrorObject {
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}
}

impl fmt::Display for ErrorObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} (code {})", self.message, self.code)
	}
}

/// JSON-RPC response. Exactly one of `result` and `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	#[serde(default = "jsonrpc_version")]
	pub jsonrpc: String,
	#[serde(default)]
	pub id: Option<Id>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorObject>,
}

impl Response {
	pub fn success(id: Option<Id>, result: Value) -> Self {
		Self {
			jsonrpc: jsonrpc_version(),
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: Option<Id>, error: ErrorObject) -> Self {
		Self {
			jsonrpc: jsonrpc_version(),
			id,
			result: None,
			error: Some(error),
		}
	}

	/// Splits into the caller-facing outcome. A missing `result` is `null`.
	pub fn into_result(self) -> Result<Value, ErrorObject> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}

/// Classified payload of an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	/// Has `method`. Carries an `id` unless it is a notification.
	Request(Request),
	/// Has `result` or `error`.
	Response(Response),
	/// Anything else (forward-compatible catch-all).
	Unknown(Value),
}

impl Message {
	pub fn from_value(value: Value) -> Self {
		let Some(object) = value.as_object() else {
			return Message::Unknown(value);
		};

		if object.contains_key("method") {
			return match serde_json::from_value::<Request>(value.clone()) {
				Ok(request) => Message::Request(request),
				Err(_) => Message::Unknown(value),
			};
		}

		if object.contains_key("result") || object.contains_key("error") {
			return match serde_json::from_value::<Response>(value.clone()) {
				Ok(response) => Message::Response(response),
				Err(_) => Message::Unknown(value),
			};
		}

		Message::Unknown(value)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_omits_absent_fields() {
		let request = Request::new("eth_chainId", None);
		assert_eq!(serde_json::to_value(&request).unwrap(), json!({"jsonrpc": "2.0", "method": "eth_chainId"}));
	}

	#[test]
	fn request_keeps_out_of_band_fields() {
		let request: Request = serde_json::from_value(json!({
			"id": "a",
			"method": "sign_message",
			"params": {"data": "0x00"},
			"windowId": "w1"
		}))
		.unwrap();

		assert_eq!(request.id, Some(Id::from("a")));
		assert_eq!(request.extra["windowId"], "w1");
		assert_eq!(serde_json::to_value(&request).unwrap()["windowId"], "w1");
	}

	#[test]
	fn response_null_result_is_success() {
		let response: Response = serde_json::from_value(json!({"id": 1, "result": null})).unwrap();
		assert_eq!(response.into_result(), Ok(Value::Null));
	}

	#[test]
	fn response_error_without_message_defaults_to_empty() {
		let response: Response = serde_json::from_value(json!({"id": 1, "error": {"code": 4001}})).unwrap();
		let error = response.into_result().unwrap_err();
		assert_eq!(error.code, 4001);
		assert!(error.message.is_empty());
	}

	#[test]
	fn message_classification() {
		assert!(matches!(
			Message::from_value(json!({"id": 2, "result": "pong"})),
			Message::Response(Response { id: Some(Id::Number(2)), .. })
		));
		assert!(matches!(
			Message::from_value(json!({"method": "wallet_chainChanged", "params": {"chainId": "0x1"}})),
			Message::Request(Request { id: None, .. })
		));
		assert!(matches!(Message::from_value(json!({"hello": "world"})), Message::Unknown(_)));
		assert!(matches!(Message::from_value(json!({"method": 5})), Message::Unknown(_)));
		assert!(matches!(Message::from_value(json!([1, 2])), Message::Unknown(_)));
	}

	#[test]
	fn params_reject_scalars() {
		assert!(Params::from_value(json!("bar")).is_none());
		assert!(Params::from_value(Value::Null).is_none());
		assert_eq!(Params::from_value(json!([])), Some(Params::Array(vec![])));
	}
}
