//! Chatvox API Library Crate
//!
//! This library contains all the logic for the Chatvox web service,
//! including configuration, the application state, HTTP handlers, WebSocket
//! logic, and routing. The binaries are thin wrappers around this library.

pub mod backoff;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
