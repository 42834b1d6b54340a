//! Snapshot of what the provider knows about the wallet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of the `wallet_getProviderState` handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
	#[serde(default)]
	pub accounts: Vec<String>,
	pub chain_id: String,
	#[serde(default)]
	pub is_unlocked: bool,
	#[serde(default, deserialize_with = "network_version")]
	pub network_version: Option<String>,
}

/// Accepts `"1"`, `1`, or `null`.
fn network_version<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::String(version)) => Some(version),
		Some(Value::Number(version)) => Some(version.to_string()),
		_ => None,
	})
}

/// Provider-side view of the wallet, updated by the handshake and by wallet notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderState {
	pub accounts: Vec<String>,
	pub chain_id: Option<String>,
	pub network_version: Option<String>,
	pub is_unlocked: bool,
	/// The handshake finished, successfully or not.
	pub initialized: bool,
	pub is_permanently_disconnected: bool,
}

impl ProviderState {
	pub fn selected_address(&self) -> Option<&str> {
		self.accounts.first().map(String::as_str)
	}

	pub(crate) fn apply_initial(&mut self, initial: &InitialState) {
		self.accounts = initial.accounts.clone();
		self.chain_id = Some(initial.chain_id.clone());
		self.network_version = initial.network_version.clone();
		self.is_unlocked = initial.is_unlocked;
	}

	/// Returns true if the account list actually changed.
	pub(crate) fn set_accounts(&mut self, accounts: Vec<String>) -> bool {
		if self.accounts == accounts {
			return false;
		}
		self.accounts = accounts;
		true
	}

	/// Returns true if either value actually changed.
	pub(crate) fn set_chain(&mut self, chain_id: String, network_version: Option<String>) -> bool {
		let chain_changed = self.chain_id.as_deref() != Some(chain_id.as_str());
		let network_changed = network_version.is_some() && self.network_version != network_version;
		if chain_changed {
			self.chain_id = Some(chain_id);
		}
		if network_changed {
			self.network_version = network_version;
		}
		chain_changed || network_changed
	}

	pub(crate) fn set_unlocked(&mut self, is_unlocked: bool) -> bool {
		let changed = self.is_unlocked != is_unlocked;
		self.is_unlocked = is_unlocked;
		changed
	}
}
