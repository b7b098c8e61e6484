//! gmx core: transport-agnostic values, wire codec, endpoint naming and errors.
//!
//! This crate defines the wire-level contracts and error surface shared by the
//! agent (the in-process server) and the client tooling. It carries no
//! transport or runtime dependencies.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as `GmxError` so a host process never crashes
//! because a local client sent garbage.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod value;

pub use endpoint::{Endpoint, EndpointName};
pub use error::{ErrorKind, GmxError, Result};
pub use value::Value;
