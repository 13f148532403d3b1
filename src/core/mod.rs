//! Core constants, error types and the collaborator boundaries.
//!
//! This module has no I/O of its own; it defines the abstractions the
//! session lifecycle is written against.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
