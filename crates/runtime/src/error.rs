//! Error types for the provider runtime.

use inpage_protocol::{ErrorObject, codes};
use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur between the provider facade and the wallet frame.
#[derive(Debug, Error)]
pub enum Error {
	/// Malformed request arguments, rejected before anything is sent.
	#[error("Invalid request: {message}")]
	InvalidRequest {
		message: String,
		/// The offending arguments, echoed back for diagnostics.
		data: Option<Value>,
	},

	/// The connection to the frame is gone.
	#[error("Disconnected: {0}")]
	Disconnected(String),

	/// Canonical JSON-RPC error, either sent by the frame or produced by normalization.
	#[error("{0}")]
	Rpc(ErrorObject),

	/// Transport-level failure (read, write, or framing).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected message shape).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// A sub-channel with this name is already registered.
	#[error("Sub-channel already registered: {0}")]
	DuplicateChannel(String),

	/// The connection pump was started a second time.
	#[error("Connection pump already running")]
	AlreadyRunning,

	/// Waiting for an event took too long.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Anything that fits none of the above.
	#[error("Internal error: {0}")]
	Internal(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`], derived from its canonical code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	InvalidRequest,
	Disconnected,
	Remote,
	Internal,
}

impl ErrorKind {
	pub fn from_code(code: i64) -> Self {
		match code {
			codes::INVALID_REQUEST => ErrorKind::InvalidRequest,
			codes::DISCONNECTED | codes::CHAIN_DISCONNECTED => ErrorKind::Disconnected,
			codes::INTERNAL_ERROR => ErrorKind::Internal,
			_ => ErrorKind::Remote,
		}
	}
}

impl Error {
	pub fn invalid_request(message: impl Into<String>, data: Option<Value>) -> Self {
		Error::InvalidRequest {
			message: message.into(),
			data,
		}
	}

	/// Reshapes this error into the canonical `{ code, message, data }` triple.
	///
	/// Remote errors keep their content; an empty message is filled from the code.
	/// Transport failures map to `4900`, unclassified errors to `-32603`.
	pub fn to_error_object(&self) -> ErrorObject {
		match self {
			Error::InvalidRequest { message, data } => ErrorObject {
				code: codes::INVALID_REQUEST,
				message: message.clone(),
				data: data.clone(),
			},
			Error::Rpc(object) => normalize_error_object(object.clone()),
			Error::Disconnected(message) => ErrorObject::new(codes::DISCONNECTED, message.clone()),
			Error::TransportError(_) | Error::ChannelClosed | Error::Io(_) => {
				ErrorObject::new(codes::DISCONNECTED, codes::default_message(codes::DISCONNECTED))
					.with_data(json!({ "originalError": self.to_string() }))
			}
			_ => ErrorObject::new(codes::INTERNAL_ERROR, codes::default_message(codes::INTERNAL_ERROR))
				.with_data(json!({ "originalError": self.to_string() })),
		}
	}

	pub fn code(&self) -> i64 {
		match self {
			Error::Rpc(object) => object.code,
			other => other.to_error_object().code,
		}
	}

	pub fn kind(&self) -> ErrorKind {
		ErrorKind::from_code(self.code())
	}

	/// Returns true for malformed-argument rejections, before or after normalization.
	pub fn is_invalid_request(&self) -> bool {
		self.kind() == ErrorKind::InvalidRequest
	}

	/// Returns true if the request failed because the connection went away.
	pub fn is_disconnected(&self) -> bool {
		self.kind() == ErrorKind::Disconnected
	}

	/// Returns the error object if this is a canonical RPC error.
	pub fn as_error_object(&self) -> Option<&ErrorObject> {
		match self {
			Error::Rpc(object) => Some(object),
			_ => None,
		}
	}
}

impl From<ErrorObject> for Error {
	fn from(object: ErrorObject) -> Self {
		Error::Rpc(object)
	}
}

/// Fills an empty message from the code's standard text.
pub fn normalize_error_object(mut object: ErrorObject) -> ErrorObject {
	if object.message.trim().is_empty() {
		object.message = codes::default_message(object.code).to_string();
	}
	object
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_request_keeps_arguments_as_data() {
		let error = Error::invalid_request("bad", Some(json!({"method": 123})));
		let object = error.to_error_object();
		assert_eq!(object.code, codes::INVALID_REQUEST);
		assert_eq!(object.message, "bad");
		assert_eq!(object.data, Some(json!({"method": 123})));
		assert!(error.is_invalid_request());
	}

	#[test]
	fn transport_failures_classify_as_disconnected() {
		assert!(Error::TransportError("broken pipe".into()).is_disconnected());
		assert!(Error::ChannelClosed.is_disconnected());
		assert!(Error::Disconnected("gone".into()).is_disconnected());
	}

	#[test]
	fn unclassified_errors_become_internal() {
		let error = Error::ProtocolError("weird".into());
		let object = error.to_error_object();
		assert_eq!(object.code, codes::INTERNAL_ERROR);
		assert_eq!(object.data.unwrap()["originalError"], "Protocol error: weird");
		assert_eq!(error.kind(), ErrorKind::Internal);
	}

	#[test]
	fn remote_errors_keep_content() {
		let remote = ErrorObject::new(4001, "User rejected").with_data(json!({"reason": "closed popup"}));
		let error = Error::Rpc(remote.clone());
		assert_eq!(error.to_error_object(), remote);
		assert_eq!(error.kind(), ErrorKind::Remote);
	}

	#[test]
	fn empty_remote_message_is_filled() {
		let object = Error::Rpc(ErrorObject::new(codes::METHOD_NOT_FOUND, "")).to_error_object();
		assert_eq!(object.message, codes::default_message(codes::METHOD_NOT_FOUND));
	}
}
