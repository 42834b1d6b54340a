//! JSON-RPC request engine.
//!
//! A request travels through an ordered chain of [`Middleware`] and comes back
//! out the same way. The standard chain, built by [`RpcEngine::standard`], is:
//!
//! ```text
//! IdRemap → ErrorNormalizer → RequestLogger → [MethodHooks] → StreamBridge
//! ```
//!
//! Each stage may mutate the request, forward it with [`Next::run`], answer it
//! directly, or fail it. The terminal [`StreamBridge`] writes the request onto the
//! RPC sub-channel and resolves it when the matching response frame arrives.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use inpage_protocol::{Request, Response};

use crate::error::{Error, Result};

mod errors;
mod hooks;
mod id_remap;
mod logging;
mod stream;


pub use errors::ErrorNormalizer;
pub use hooks::{MethodHooks, MethodHooksBuilder};
pub use id_remap::IdRemap;
pub use logging::RequestLogger;
pub use stream::{PendingRequests, ResponseFuture, StreamBridge};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of the request chain.
pub trait Middleware: Send + Sync {
	/// Short label used in diagnostics.
	fn name(&self) -> &'static str;

	fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response>>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
	chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
	/// Passes `request` to the next stage.
	///
	/// Falling off the end of the chain is an internal error: some stage must answer.
	pub fn run(self, request: Request) -> BoxFuture<'a, Result<Response>> {
		match self.chain.split_first() {
			Some((head, rest)) => head.handle(request, Next { chain: rest }),
			None => Box::pin(async move {
				Err(Error::Internal(format!(
					"Request for '{}' was not handled by any middleware",
					request.method
				)))
			}),
		}
	}
}

/// Immutable middleware chain.
#[derive(Clone)]
pub struct RpcEngine {
	chain: Arc<[Arc<dyn Middleware>]>,
}

impl RpcEngine {
	pub fn builder() -> EngineBuilder {
		EngineBuilder::default()
	}

	/// The provider chain: id remapping, error normalization, optional logging,
	/// optional method hooks, then the stream bridge.
	pub fn standard(bridge: Arc<StreamBridge>, logging: bool, hooks: Option<MethodHooks>) -> Self {
		let mut builder = Self::builder().push(IdRemap::new()).push(ErrorNormalizer);
		if logging {
			builder = builder.push(RequestLogger);
		}
		if let Some(hooks) = hooks.filter(|hooks| !hooks.is_empty()) {
			builder = builder.push(hooks);
		}
		builder.push_arc(bridge).build()
	}

	/// Runs one request through the chain.
	pub async fn handle(&self, request: Request) -> Result<Response> {
		Next { chain: &self.chain }.run(request).await
	}

	/// Runs every request concurrently and returns one response per request, in input order.
	///
	/// Failures become error responses carrying the request's own id.
	pub async fn handle_batch(&self, requests: Vec<Request>) -> Vec<Response> {
		let calls = requests.into_iter().map(|request| {
			let id = request.id.clone();
			async move {
				match self.handle(request).await {
					Ok(response) => response,
					Err(error) => Response::failure(id, error.to_error_object()),
				}
			}
		});
		join_all(calls).await
	}

	pub fn middleware_names(&self) -> Vec<&'static str> {
		self.chain.iter().map(|stage| stage.name()).collect()
	}
}

#[derive(Default)]
pub struct EngineBuilder {
	chain: Vec<Arc<dyn Middleware>>,
}

impl EngineBuilder {
	pub fn push<M: Middleware + 'static>(self, middleware: M) -> Self {
		self.push_arc(Arc::new(middleware))
	}

	pub fn push_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.chain.push(middleware);
		self
	}

	pub fn build(self) -> RpcEngine {
		RpcEngine {
			chain: self.chain.into(),
		}
	}
}
