//! Top-level facade crate for gmx.
//!
//! Re-exports the core types, the in-process agent and the client library so
//! users can depend on a single crate.

pub mod core {
    pub use gmx_core::*;
}

pub mod agent {
    pub use gmx_agent::*;
}

pub mod client {
    pub use gmx_client::*;
}

pub use gmx_agent::{counter, gauge, publish, start, Agent, Registry};
