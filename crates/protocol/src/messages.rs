//! Fixed message text surfaced by the provider.

pub mod errors {
	pub fn disconnected() -> String {
		"Provider: Lost connection to the wallet frame.".to_string()
	}

	pub fn permanently_disconnected() -> String {
		"Provider: Disconnected from the wallet frame. Page reload required.".to_string()
	}

	pub fn invalid_request_args() -> String {
		"Expected a single, non-array, object argument.".to_string()
	}

	pub fn invalid_request_method() -> String {
		"'args.method' must be a non-empty string.".to_string()
	}

	pub fn invalid_request_params() -> String {
		"'args.params' must be an object or array if provided.".to_string()
	}

	pub fn empty_batch() -> String {
		"Batch requests must contain at least one request.".to_string()
	}

	pub fn invalid_options(max_event_listeners: usize) -> String {
		format!("Invalid options. Received: {{ maxEventListeners: {max_event_listeners} }}")
	}

	pub fn stream_lost(stream_name: &str, reason: &str) -> String {
		format!("Provider: Lost connection to \"{stream_name}\". {reason}")
	}
}

pub mod info {
	pub fn connected(chain_id: &str) -> String {
		format!("Provider: Connected to chain with ID \"{chain_id}\".")
	}
}
