//! Common types and utilities for the XDP DDoS blacklist.
//!
//! This crate provides the pieces shared by the userspace library and the
//! command line front end: the table key/value types, the error taxonomy and
//! the process exit codes derived from it.

pub mod error;
pub mod types;

/// Reexport of common types
pub use error::{exit_code, Error};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
