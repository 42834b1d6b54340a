use inpage::{ErrorKind, ErrorObject};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid params: {0}")]
	InvalidParams(String),

	#[error("could not reach frame bridge at {url}")]
	Connect {
		url: String,
		#[source]
		source: inpage::Error,
	},

	/// The wallet answered with a JSON-RPC error.
	#[error("request failed ({}): {}", .0.code, .0.message)]
	Rpc(ErrorObject),

	#[error(transparent)]
	Provider(#[from] inpage::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Error object to print on stdout, if there is one.
	pub fn error_object(&self) -> Option<ErrorObject> {
		match self {
			CliError::Rpc(object) => Some(object.clone()),
			CliError::Provider(error) => Some(error.to_error_object()),
			_ => None,
		}
	}

	/// Process exit code: 2 for usage mistakes, 1 for everything else.
	pub fn exit_code(&self) -> i32 {
		match self {
			CliError::InvalidParams(_) => 2,
			CliError::Provider(error) if error.is_invalid_request() => 2,
			_ => 1,
		}
	}
}

/// Splits provider failures so remote JSON-RPC errors keep their own variant.
pub fn classify(error: inpage::Error) -> CliError {
	match error {
		inpage::Error::Rpc(object) if ErrorKind::from_code(object.code) != ErrorKind::Disconnected => CliError::Rpc(object),
		other => CliError::Provider(other),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_errors_stay_remote() {
		let error = classify(inpage::Error::Rpc(ErrorObject::new(4001, "User rejected the request.")));
		assert!(matches!(error, CliError::Rpc(_)));
		assert_eq!(error.to_string(), "request failed (4001): User rejected the request.");
		assert_eq!(error.exit_code(), 1);
	}

	#[test]
	fn disconnects_are_provider_errors() {
		let error = classify(inpage::Error::Rpc(ErrorObject::new(4900, "gone")));
		assert!(matches!(error, CliError::Provider(_)));
		assert_eq!(error.error_object().unwrap().code, 4900);
	}

	#[test]
	fn bad_params_are_usage_errors() {
		assert_eq!(CliError::InvalidParams("x".into()).exit_code(), 2);
		let invalid = CliError::Provider(inpage::Error::invalid_request("bad", None));
		assert_eq!(invalid.exit_code(), 2);
	}
}
