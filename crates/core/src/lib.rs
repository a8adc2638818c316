//! Chatvox Core
//!
//! Provider-agnostic building blocks for the voice chat relay: the per-connection
//! session model and store, and the two gateways to the external text
//! generation and speech synthesis providers.

pub mod llm_client;
pub mod session;
pub mod speech;
