//! Shared leaf types for the clipnote workspace.
//!
//! This crate has no internal dependencies. Everything here is either a
//! plain type alias, a wire type exchanged between the dispatcher and its
//! worker processes, or a pure validation function.

pub mod error;
pub mod job;
pub mod types;
pub mod validation;

pub use error::CoreError;
