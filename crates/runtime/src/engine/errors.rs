use inpage_protocol::{Request, Response};

use super::{BoxFuture, Middleware, Next};
use crate::error::{Error, Result, normalize_error_object};

/// Reshapes every downstream failure into the canonical `{ code, message, data }` triple.
///
/// Remote error responses keep their content (an empty message is filled in);
/// any `Err` becomes [`Error::Rpc`]. Nothing is swallowed: each failure is logged
/// and passed on.
pub struct ErrorNormalizer;

impl Middleware for ErrorNormalizer {
	fn name(&self) -> &'static str {
		"error-normalize"
	}

	fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
		Box::pin(async move {
			let method = request.method.clone();
			match next.run(request).await {
				Ok(mut response) => {
					if let Some(error) = response.error.take() {
						let error = normalize_error_object(error);
						tracing::warn!(%method, code = error.code, "RPC error: {}", error.message);
						response.error = Some(error);
					}
					Ok(response)
				}
				Err(error) => {
					let object = error.to_error_object();
					tracing::warn!(%method, code = object.code, %error, "RPC request failed");
					Err(Error::Rpc(object))
				}
			}
		})
	}
}
