//! WebSocket Session Management
//!
//! This module contains the logic for relaying chat sessions over WebSockets.
//! It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `relay`: The per-session state machine that drives the text and speech gateways.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.

pub mod protocol;
pub mod relay;
pub mod session;

pub use session::{root_handler, ws_handler};
