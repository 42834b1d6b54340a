use std::time::Instant;

use inpage_protocol::{Request, Response};

use super::{BoxFuture, Middleware, Next};
use crate::error::Result;

/// Records each request and its outcome. Never alters either.
pub struct RequestLogger;

impl Middleware for RequestLogger {
	fn name(&self) -> &'static str {
		"logging"
	}

	fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
		Box::pin(async move {
			let started = Instant::now();
			let method = request.method.clone();
			let id = request.id.as_ref().map(ToString::to_string).unwrap_or_default();
			tracing::debug!(%method, %id, params = ?request.params, "RPC request");

			let outcome = next.run(request).await;
			let elapsed_ms = started.elapsed().as_millis() as u64;

			match &outcome {
				Ok(response) => match &response.error {
					Some(error) => tracing::debug!(%method, %id, elapsed_ms, code = error.code, "RPC error response"),
					None => tracing::debug!(%method, %id, elapsed_ms, "RPC response"),
				},
				Err(error) => tracing::debug!(%method, %id, elapsed_ms, %error, "RPC failed"),
			}

			outcome
		})
	}
}
