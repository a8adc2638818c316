//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the session store and the relay.

use crate::config::Config;
use crate::ws::relay::Relay;
use chatvox_core::session::SessionStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub relay: Arc<Relay>,
    pub config: Arc<Config>,
}
