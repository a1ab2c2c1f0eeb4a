//! Shared error definitions used across the warden crates.

pub mod error;

pub use error::{Error, FromMessage, Result, WardenError};
