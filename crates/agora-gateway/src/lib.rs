//! Local dev host serving the built-in agents over the streaming run protocol.
//!
//! Threads and their saved histories live in memory only.

pub mod events;
pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::GatewayState;
