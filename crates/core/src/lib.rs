//! In-page JSON-RPC provider
//!
//! Lets a page talk to an isolated wallet frame over one message connection.
//! The page sees a single request/response API plus lifecycle events; underneath,
//! the connection is split into named channels and every request is correlated
//! with its response by a locally minted id.
//!
//! # Example
//!
//! ```ignore
//! use inpage::{Provider, ProviderEvent};
//! use inpage_runtime::WebSocketTransport;
//! use serde_json::json;
//!
//! let provider = Provider::connect(WebSocketTransport::connect("ws://127.0.0.1:9000").await?)?;
//! provider.initialize().await?;
//!
//! let chain_id = provider.request(json!({"method": "eth_chainId"})).await?;
//!
//! let mut events = provider.subscribe();
//! while let Some(event) = events.recv().await {
//!     if let ProviderEvent::Disconnect(info) = event {
//!         eprintln!("{}", info.message);
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod events;
pub mod provider;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Capabilities, ProviderConfig};
pub use events::{EventStream, EventWaiter, ProviderEvent};
pub use inpage_protocol::{ErrorObject, Id, Params, Request, Response, codes};
pub use inpage_runtime::{DisconnectInfo, Error, ErrorKind, LifecycleState, Result, TransportParts};
pub use provider::{Provider, ProviderBuilder, validate_request_args};
pub use state::{InitialState, ProviderState};
