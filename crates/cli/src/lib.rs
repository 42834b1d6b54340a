//! `inpage` - command line front end for the in-page provider.
//!
//! Attaches a [`Provider`](inpage::Provider) to a frame bridge over WebSocket
//! and exposes one-shot calls and an event watcher.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
