//! Core message model, run protocol types, config, and errors for Agora.

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod types;
