//! Provider lifecycle: uninitialized, connected, disconnected.
//!
//! The machine only decides *whether* a transition emits a notification. The
//! caller owns the emission itself, so the transition and the decision stay
//! atomic under one lock.

use inpage_protocol::{codes, messages};

/// Where the provider is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Connected,
	Disconnected { is_recoverable: bool },
}

/// Payload of a `connect` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
	pub chain_id: String,
}

/// Payload of a `disconnect` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
	pub is_recoverable: bool,
	/// `1013` (try again later) when recoverable, `1011` (internal error) otherwise.
	pub code: i64,
	pub message: String,
}

#[derive(Debug)]
pub struct StateMachine {
	state: LifecycleState,
	/// Which recoverability flags have already been announced: `[terminal, recoverable]`.
	announced: [bool; 2],
}

impl Default for StateMachine {
	fn default() -> Self {
		Self::new()
	}
}

impl StateMachine {
	pub fn new() -> Self {
		Self {
			state: LifecycleState::Uninitialized,
			announced: [false; 2],
		}
	}

	pub fn state(&self) -> LifecycleState {
		self.state
	}

	pub fn is_connected(&self) -> bool {
		self.state == LifecycleState::Connected
	}

	/// True once a terminal disconnect has been seen. Never reset.
	pub fn is_permanently_disconnected(&self) -> bool {
		self.state == LifecycleState::Disconnected { is_recoverable: false }
	}

	/// Handshake succeeded. Returns the notification to emit, if any.
	///
	/// Only the first connect from `Uninitialized` emits; a disconnected
	/// provider never reconnects.
	pub fn handle_connect(&mut self, chain_id: &str) -> Option<ConnectInfo> {
		if self.state != LifecycleState::Uninitialized {
			tracing::trace!(state = ?self.state, "Ignoring connect");
			return None;
		}
		self.state = LifecycleState::Connected;
		tracing::debug!("{}", messages::info::connected(chain_id));
		Some(ConnectInfo {
			chain_id: chain_id.to_string(),
		})
	}

	/// Transport reported a disconnect. Returns the notification to emit, if any.
	///
	/// Emits once per distinct `is_recoverable` value. A terminal disconnect
	/// sticks: a later recoverable signal may still be announced, but the state
	/// stays terminal.
	pub fn handle_disconnect(&mut self, is_recoverable: bool, message: Option<String>) -> Option<DisconnectInfo> {
		let slot = usize::from(is_recoverable);
		if self.announced[slot] {
			return None;
		}
		self.announced[slot] = true;

		if !self.is_permanently_disconnected() {
			self.state = LifecycleState::Disconnected { is_recoverable };
		}

		let (code, message) = if is_recoverable {
			(
				codes::CLOSE_TRY_AGAIN_LATER,
				message.unwrap_or_else(messages::errors::disconnected),
			)
		} else {
			(
				codes::CLOSE_INTERNAL_ERROR,
				message.unwrap_or_else(messages::errors::permanently_disconnected),
			)
		};

		Some(DisconnectInfo {
			is_recoverable,
			code,
			message,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_fires_once() {
		let mut machine = StateMachine::new();
		assert_eq!(
			machine.handle_connect("0x1"),
			Some(ConnectInfo {
				chain_id: "0x1".to_string()
			})
		);
		assert!(machine.is_connected());
		assert_eq!(machine.handle_connect("0x1"), None);
		assert_eq!(machine.handle_connect("0x5"), None);
	}

	#[test]
	fn disconnect_fires_once_per_flag() {
		let mut machine = StateMachine::new();
		machine.handle_connect("0x1");

		let first = machine.handle_disconnect(true, None).unwrap();
		assert_eq!(first.code, codes::CLOSE_TRY_AGAIN_LATER);
		assert_eq!(first.message, messages::errors::disconnected());
		assert_eq!(machine.handle_disconnect(true, None), None);

		let terminal = machine.handle_disconnect(false, None).unwrap();
		assert!(!terminal.is_recoverable);
		assert_eq!(terminal.code, codes::CLOSE_INTERNAL_ERROR);
		assert_eq!(terminal.message, messages::errors::permanently_disconnected());
		assert_eq!(machine.handle_disconnect(false, Some("again".into())), None);
		assert!(machine.is_permanently_disconnected());
	}

	#[test]
	fn terminal_state_is_sticky() {
		let mut machine = StateMachine::new();
		machine.handle_disconnect(false, Some("frame gone".into())).unwrap();

		let recoverable = machine.handle_disconnect(true, None).unwrap();
		assert!(recoverable.is_recoverable);
		assert!(machine.is_permanently_disconnected());
	}

	#[test]
	fn no_reconnect_after_disconnect() {
		let mut machine = StateMachine::new();
		machine.handle_connect("0x1");
		machine.handle_disconnect(true, None);
		assert_eq!(machine.handle_connect("0x1"), None);
		assert_eq!(machine.state(), LifecycleState::Disconnected { is_recoverable: true });
	}
}
