//! Wire types for the in-page provider frame protocol.
//!
//! Everything the host page and the wallet frame exchange is described here:
//!
//! - [`Frame`]: the multiplexing envelope `{ channel, payload }`
//! - [`Request`] / [`Response`]: JSON-RPC messages carried as frame payloads
//! - [`ErrorObject`]: the canonical `{ code, message, data }` error triple
//! - [`codes`] and [`messages`]: fixed error codes and the provider's message text
//!
//! Types here are pure data. Correlation, routing and lifecycle live in `inpage-runtime`.

pub mod codes;
pub mod frame;
pub mod message;
pub mod messages;

pub use frame::Frame;
pub use message::{ErrorObject, Id, Message, Params, Request, Response, JSONRPC_VERSION};
