use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_URL: &str = "ws://127.0.0.1:9696";

#[derive(Parser, Debug)]
#[command(name = "inpage")]
#[command(about = "Talk to a wallet frame bridge through an in-page provider")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Provider config file (JSON, camelCase keys)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// WebSocket endpoint of the frame bridge
	#[arg(short, long, global = true, value_name = "URL", default_value = DEFAULT_URL)]
	pub url: String,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Send one JSON-RPC request and print its result
	Call {
		/// Method name, e.g. eth_chainId
		method: String,

		/// Params as a JSON array or object
		params: Option<String>,

		/// Skip the wallet_getProviderState handshake
		#[arg(long)]
		no_init: bool,
	},

	/// Print provider events as JSON lines until the connection drops
	Watch {
		/// Stop after this many events
		#[arg(short = 'n', long)]
		limit: Option<usize>,
	},

	/// Print the effective provider configuration
	Config,
}
