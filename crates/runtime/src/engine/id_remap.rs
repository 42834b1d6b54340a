use std::sync::atomic::{AtomicI64, Ordering};

use inpage_protocol::{Id, Request, Response};

use super::{BoxFuture, Middleware, Next};
use crate::error::Result;

/// Replaces the caller's id with one minted here and restores it on the response.
///
/// Ids increase monotonically for the lifetime of this instance and are never
/// reused, so a late response can never match a newer request.
pub struct IdRemap {
	next_id: AtomicI64,
}

impl IdRemap {
	pub fn new() -> Self {
		Self::starting_at(1)
	}

	pub fn starting_at(first: i64) -> Self {
		Self {
			next_id: AtomicI64::new(first),
		}
	}

	fn mint(&self) -> Id {
		Id::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
	}
}

impl Default for IdRemap {
	fn default() -> Self {
		Self::new()
	}
}

impl Middleware for IdRemap {
	fn name(&self) -> &'static str {
		"id-remap"
	}

	fn handle<'a>(&'a self, mut request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
		let original = request.id.take();
		let remapped = self.mint();
		tracing::trace!(original = ?original, remapped = %remapped, method = %request.method, "Remapped request id");
		request.id = Some(remapped);

		Box::pin(async move {
			let mut response = next.run(request).await?;
			response.id = original;
			Ok(response)
		})
	}
}
