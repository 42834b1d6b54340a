//! Per-method request hooks.
//!
//! Some wallet methods need extra handling on the host side: attaching a popup
//! window id before the request leaves, or being answered by a host flow
//! (e.g. account requests routed to a login UI). Hooks are keyed by method name
//! and run as one stage of the chain.

use std::collections::HashMap;
use std::sync::Arc;

use inpage_protocol::{Request, Response};
use serde_json::Value;

use super::{BoxFuture, Middleware, Next};
use crate::error::Result;

pub type DecorateFn = Arc<dyn Fn(&mut Request) + Send + Sync>;
pub type InterceptFn = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone, Default)]
struct MethodEntry {
	decorators: Vec<DecorateFn>,
	interceptor: Option<InterceptFn>,
}

/// Method-keyed decorators and interceptors.
#[derive(Clone, Default)]
pub struct MethodHooks {
	methods: HashMap<String, MethodEntry>,
}

impl MethodHooks {
	pub fn builder() -> MethodHooksBuilder {
		MethodHooksBuilder::default()
	}

	pub fn is_empty(&self) -> bool {
		self.methods.is_empty()
	}
}

impl Middleware for MethodHooks {
	fn name(&self) -> &'static str {
		"method-hooks"
	}

	fn handle<'a>(&'a self, mut request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
		let Some(entry) = self.methods.get(&request.method) else {
			return next.run(request);
		};

		for decorate in &entry.decorators {
			decorate(&mut request);
		}

		match &entry.interceptor {
			Some(intercept) => {
				tracing::debug!(method = %request.method, "Request answered by host interceptor");
				let id = request.id.clone();
				let answer = intercept(request);
				Box::pin(async move { Ok(Response::success(id, answer.await?)) })
			}
			None => next.run(request),
		}
	}
}

#[derive(Default)]
pub struct MethodHooksBuilder {
	hooks: MethodHooks,
}

impl MethodHooksBuilder {
	/// Mutates requests for any of `methods` before they are forwarded.
	pub fn decorate<I, S, F>(mut self, methods: I, decorate: F) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
		F: Fn(&mut Request) + Send + Sync + 'static,
	{
		let decorate: DecorateFn = Arc::new(decorate);
		for method in methods {
			self.hooks
				.methods
				.entry(method.into())
				.or_default()
				.decorators
				.push(Arc::clone(&decorate));
		}
		self
	}

	/// Answers `method` locally instead of forwarding it. Replaces any earlier interceptor.
	pub fn intercept<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
	{
		let intercept: InterceptFn =
			Arc::new(move |request| -> BoxFuture<'static, Result<Value>> { Box::pin(handler(request)) });
		self.hooks.methods.entry(method.into()).or_default().interceptor = Some(intercept);
		self
	}

	pub fn build(self) -> MethodHooks {
		self.hooks
	}
}
