//! In-page provider runtime - transports, multiplexing, and RPC correlation
//!
//! This crate provides the plumbing between a host page and an isolated wallet
//! frame:
//!
//! - **Transport**: duplex JSON message connections (pipe, in-memory port, WebSocket)
//! - **Multiplexer**: named sub-channels over one connection
//! - **Engine**: JSON-RPC middleware chain with id remapping and response correlation
//! - **State**: the connect/disconnect lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  inpage (core)   │  Provider facade, events
//! └────────┬─────────┘
//!          │ request(args)
//! ┌────────▼─────────┐
//! │  inpage-runtime  │  This crate
//! │  ┌────────────┐  │
//! │  │ Engine     │  │  id-remap → errors → logging → hooks → stream
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Mux        │  │  { channel, payload } routing
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Transport  │  │  Pipe / MessagePort / WebSocket
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod mux;
pub mod state;
pub mod transport;

pub use engine::{
	BoxFuture, EngineBuilder, ErrorNormalizer, IdRemap, MethodHooks, MethodHooksBuilder, Middleware, Next,
	PendingRequests, RequestLogger, ResponseFuture, RpcEngine, StreamBridge,
};
pub use error::{Error, ErrorKind, Result};
pub use mux::{Multiplexer, SubChannel, SubChannelReceiver, SubChannelSender};
pub use state::{ConnectInfo, DisconnectInfo, LifecycleState, StateMachine};
pub use transport::{
	ConnectionDescriptor, MessagePort, MessagePortReceiver, MessagePortSender, PipeTransport, PipeTransportReceiver,
	PipeTransportSender, Transport, TransportParts, TransportReceiver, WebSocketTransport,
	WebSocketTransportReceiver, WebSocketTransportSender,
};
