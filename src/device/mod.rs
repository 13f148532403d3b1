//! The emulated device: configuration and session lifecycle.

mod config;
mod lifecycle;

pub use config::*;
pub use lifecycle::*;
