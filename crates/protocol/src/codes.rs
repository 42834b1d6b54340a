//! Error codes used by the provider.
//!
//! JSON-RPC 2.0 reserves `-32768..=-32000`; EIP-1193 defines the `4xxx` provider codes.
//! Disconnect notifications use WebSocket close codes (`1011`, `1013`).

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

pub const USER_REJECTED_REQUEST: i64 = 4001;
pub const UNAUTHORIZED: i64 = 4100;
pub const UNSUPPORTED_METHOD: i64 = 4200;
pub const DISCONNECTED: i64 = 4900;
pub const CHAIN_DISCONNECTED: i64 = 4901;

/// Close code carried by a terminal disconnect notification.
pub const CLOSE_INTERNAL_ERROR: i64 = 1011;
/// Close code carried by a recoverable disconnect notification.
pub const CLOSE_TRY_AGAIN_LATER: i64 = 1013;

const FALLBACK_MESSAGE: &str = "Unspecified error message. This is a bug, please report it.";

/// Standard message for a known code.
pub fn default_message(code: i64) -> &'static str {
	match code {
		PARSE_ERROR => "Invalid JSON was received by the server. An error occurred on the server while parsing the JSON text.",
		INVALID_REQUEST => "The JSON sent is not a valid Request object.",
		METHOD_NOT_FOUND => "The method does not exist / is not available.",
		INVALID_PARAMS => "Invalid method parameter(s).",
		INTERNAL_ERROR => "Internal JSON-RPC error.",
		USER_REJECTED_REQUEST => "User rejected the request.",
		UNAUTHORIZED => "The requested account and/or method has not been authorized by the user.",
		UNSUPPORTED_METHOD => "The requested method is not supported by this provider.",
		DISCONNECTED => "The provider is disconnected from all chains.",
		CHAIN_DISCONNECTED => "The provider is disconnected from the specified chain.",
		-32099..=-32000 => "Invalid input.",
		_ => FALLBACK_MESSAGE,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_error_range_has_generic_message() {
		assert_eq!(default_message(-32005), "Invalid input.");
		assert_eq!(default_message(-32000), "Invalid input.");
	}

	#[test]
	fn unknown_codes_fall_back() {
		assert_eq!(default_message(12345), FALLBACK_MESSAGE);
	}
}
