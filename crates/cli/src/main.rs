use clap::Parser;
use inpage_cli::{cli::Cli, commands, error::CliError, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(&err);
		std::process::exit(err.exit_code());
	}
}

fn handle_error(err: &CliError) {
	eprintln!("error: {err}");
	let mut source = std::error::Error::source(err);
	while let Some(cause) = source {
		eprintln!("  caused by: {cause}");
		source = cause.source();
	}

	// Machine-readable copy of the JSON-RPC error for scripts.
	if let Some(object) = err.error_object() {
		if let Ok(json) = serde_json::to_string(&serde_json::json!({ "error": object })) {
			println!("{json}");
		}
	}
}
